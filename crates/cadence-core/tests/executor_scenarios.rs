//! End-to-end executor scenarios driven by the scripted solver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use cadence_core::{Executor, ExecutorError, ExecutorState};
use cadence_solver::{AtomId, Lbool, Rational, Solver, START};
use cadence_testkit::{Recorder, ScriptedSolver};

fn setup() -> (Arc<Mutex<ScriptedSolver>>, Executor<ScriptedSolver>, Recorder) {
    let slv = Arc::new(Mutex::new(ScriptedSolver::new()));
    let exec = Executor::new(slv.clone(), "scenario");
    let recorder = Recorder::new();
    exec.add_listener(recorder.listener());
    (slv, exec, recorder)
}

fn interval_plan(
    slv: &Arc<Mutex<ScriptedSolver>>,
    start: i64,
    end: i64,
    horizon: i64,
) -> AtomId {
    let mut s = slv.lock().expect("lock");
    let pred = s.interval_predicate();
    let atom = s.new_interval_atom(pred, start, end);
    s.set_horizon(horizon);
    atom
}

#[test]
fn test_interval_activity_runs_to_completion() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 5, 5);

    exec.init().unwrap();
    assert_eq!(exec.state(), ExecutorState::Idle);
    exec.start();
    assert_eq!(exec.state(), ExecutorState::Executing);
    assert!(exec.is_running());

    for _ in 0..3 {
        exec.tick().unwrap();
    }
    assert_eq!(exec.executing(), vec![atom]);
    assert_eq!(exec.current_time(), Rational::from(3));

    for _ in 0..3 {
        exec.tick().unwrap();
    }

    let events = recorder.events();
    assert_eq!(
        events,
        vec![
            "state idle",
            "state executing",
            "tick 1",
            "tick 2",
            "starting 0",
            "start 0",
            "tick 3",
            "tick 4",
            "ending 0",
            "end 0",
            "state finished",
            "finished",
            "tick 5",
        ]
    );
    assert_eq!(exec.state(), ExecutorState::Finished);
    assert!(!exec.is_running());
    assert!(exec.executing().is_empty());
    // The sixth tick was a no-op: the clock froze at the horizon.
    assert_eq!(exec.current_time(), Rational::from(5));
}

#[test]
fn test_deferred_start_moves_the_pulse() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 8, 8);
    recorder.defer_start_once(atom, Rational::from(2));

    exec.init().unwrap();
    exec.start();
    for _ in 0..3 {
        exec.tick().unwrap();
    }

    // The start did not fire at pulse 3 and the clock still advanced
    // by exactly one quantum per tick.
    assert!(recorder.events_with_prefix("start ").is_empty());
    assert_eq!(recorder.events_with_prefix("starting").len(), 1);
    assert_eq!(exec.current_time(), Rational::from(3));
    assert!(exec.executing().is_empty());

    // value + max(units_per_tick, requested) = 3 + 2 = 5
    let start_term = slv.lock().expect("lock").atom_param(atom, START).unwrap();
    let (lb, _, value) = slv.lock().expect("lock").arith_state(start_term).unwrap();
    assert_eq!(lb, cadence_solver::InfRational::from(5));
    assert_eq!(value, cadence_solver::InfRational::from(5));

    exec.tick().unwrap();
    exec.tick().unwrap();
    assert_eq!(recorder.events_with_prefix("start ").len(), 1);
    assert_eq!(exec.executing(), vec![atom]);

    let events = recorder.events();
    let started = events.iter().position(|e| e == "start 0").unwrap();
    let tick4 = events.iter().position(|e| e == "tick 4").unwrap();
    assert!(started > tick4, "start fired at the deferred pulse");
}

#[test]
fn test_reported_failure_replans_without_the_atom() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 5, 10);

    exec.init().unwrap();
    exec.start();
    for _ in 0..3 {
        exec.tick().unwrap();
    }
    assert_eq!(exec.executing(), vec![atom]);

    exec.failure(&HashSet::from([atom])).unwrap();

    assert_eq!(slv.lock().expect("lock").sigma_value(atom), Lbool::False);
    assert!(exec.executing().is_empty());
    assert_eq!(exec.state(), ExecutorState::Executing);

    // The re-solve shows up as an adapting round in the state stream.
    let states = recorder.events_with_prefix("state");
    assert!(states.contains(&"state adapting".to_string()));
    assert_eq!(states.last().unwrap(), "state executing");

    exec.tick().unwrap();
    assert_eq!(exec.current_time(), Rational::from(4));
}

#[test]
fn test_adapt_requeues_and_resolves_on_next_tick() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 5, 5);

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    exec.tick().unwrap();

    exec.adapt("new_requirement();").unwrap();
    assert_eq!(slv.lock().expect("lock").scripts(), ["new_requirement();"]);

    exec.tick().unwrap();
    let states = recorder.events_with_prefix("state");
    assert_eq!(
        states,
        vec![
            "state idle",
            "state executing",
            "state adapting",
            "state executing",
        ]
    );
    // The pulse at 3 was still processed after the re-solve.
    assert_eq!(recorder.events_with_prefix("start ").len(), 1);
    assert_eq!(exec.executing(), vec![atom]);
}

#[test]
fn test_adapt_to_unsat_problem_is_fatal() {
    let (slv, exec, _recorder) = setup();
    interval_plan(&slv, 3, 5, 5);

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();

    exec.adapt("impossible();").unwrap();
    slv.lock().expect("lock").script_unsat();

    assert!(matches!(exec.tick(), Err(ExecutorError::Unexecutable)));
    assert_eq!(exec.state(), ExecutorState::Failed);
    assert!(!exec.is_running());

    // Subsequent ticks are no-ops.
    exec.tick().unwrap();
    assert_eq!(exec.current_time(), Rational::from(1));
}

#[test]
fn test_punctual_activity_fires_both_transitions_in_one_pulse() {
    let (slv, exec, recorder) = setup();
    {
        let mut s = slv.lock().expect("lock");
        let pred = s.impulse_predicate();
        s.new_impulse_atom(pred, 7);
        s.set_horizon(7);
    }

    exec.init().unwrap();
    exec.start();
    for _ in 0..7 {
        exec.tick().unwrap();
    }

    let events = recorder.events();
    let tail = &events[events.len() - 7..];
    assert_eq!(
        tail,
        [
            "starting 0",
            "ending 0",
            "start 0",
            "end 0",
            "state finished",
            "finished",
            "tick 7",
        ]
    );
}

#[test]
fn test_finish_precedes_tick_callback_at_horizon() {
    let (slv, exec, recorder) = setup();
    slv.lock().expect("lock").set_horizon(10);

    exec.init().unwrap();
    exec.start();
    for _ in 0..12 {
        exec.tick().unwrap();
    }

    let events = recorder.events();
    let tail = &events[events.len() - 3..];
    assert_eq!(tail, ["state finished", "finished", "tick 10"]);
    assert_eq!(exec.current_time(), Rational::from(10));
}

#[test]
fn test_finished_is_left_only_through_adapt() {
    let (slv, exec, recorder) = setup();
    slv.lock().expect("lock").set_horizon(2);

    exec.init().unwrap();
    exec.start();
    for _ in 0..3 {
        exec.tick().unwrap();
    }
    assert_eq!(exec.state(), ExecutorState::Finished);

    // start() has no effect on a finished plan.
    exec.start();
    assert_eq!(exec.state(), ExecutorState::Finished);

    exec.adapt("more_work();").unwrap();
    exec.tick().unwrap();
    // Execution was stopped by the finish, so the new solution parks
    // the executor in idle until start() is called again.
    assert_eq!(exec.state(), ExecutorState::Idle);
    let states = recorder.events_with_prefix("state");
    assert_eq!(states.last().unwrap(), "state idle");

    exec.start();
    assert_eq!(exec.state(), ExecutorState::Executing);
}

#[test]
fn test_executing_survives_adapt_with_pinned_values() {
    let (slv, exec, _recorder) = setup();
    let atom = interval_plan(&slv, 1, 9, 9);

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    assert_eq!(exec.executing(), vec![atom]);

    let start_term = slv.lock().expect("lock").atom_param(atom, START).unwrap();
    let before = slv.lock().expect("lock").arith_state(start_term).unwrap();

    exec.adapt("extra();").unwrap();
    exec.tick().unwrap();

    // Still executing, with the committed start untouched.
    assert_eq!(exec.executing(), vec![atom]);
    assert_eq!(
        slv.lock().expect("lock").arith_state(start_term),
        Some(before)
    );
    assert_eq!(before.0, cadence_solver::InfRational::from(1));
    assert_eq!(before.1, cadence_solver::InfRational::from(1));
}

#[test]
fn test_cannot_delay_a_constant_coordinate() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 5, 5);
    slv.lock().expect("lock").make_start_constant(atom, 3);
    recorder.defer_start_once(atom, Rational::from(1));

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    exec.tick().unwrap();
    assert!(matches!(
        exec.tick(),
        Err(ExecutorError::ConstantCoordinate(a)) if a == atom
    ));
    assert_eq!(exec.state(), ExecutorState::Failed);
}

#[test]
fn test_unresolvable_deferral_conflict_is_fatal() {
    let (slv, exec, recorder) = setup();
    let atom = interval_plan(&slv, 3, 5, 5);
    recorder.defer_start_once(atom, Rational::from(2));

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    exec.tick().unwrap();
    {
        let mut s = slv.lock().expect("lock");
        s.reject_next_lower_bound();
        s.fail_next_backjump();
    }
    assert!(matches!(exec.tick(), Err(ExecutorError::Unexecutable)));
    assert_eq!(exec.state(), ExecutorState::Failed);
    assert!(!exec.is_running());
}

#[test]
fn test_unparsable_adaptation_leaves_state_alone() {
    let (slv, exec, _recorder) = setup();
    interval_plan(&slv, 3, 5, 5);

    exec.init().unwrap();
    exec.start();
    slv.lock().expect("lock").fail_next_read();

    assert!(matches!(
        exec.adapt("not riddle"),
        Err(ExecutorError::Solver(_))
    ));
    assert_eq!(exec.state(), ExecutorState::Executing);
    // Nothing queued: the next tick proceeds normally.
    exec.tick().unwrap();
    assert_eq!(exec.current_time(), Rational::from(1));
}

#[test]
fn test_pause_stops_the_clock_and_start_resumes() {
    let (slv, exec, _recorder) = setup();
    interval_plan(&slv, 3, 5, 5);

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    exec.pause();
    assert_eq!(exec.state(), ExecutorState::Idle);
    assert!(!exec.is_running());

    exec.tick().unwrap();
    exec.tick().unwrap();
    assert_eq!(exec.current_time(), Rational::from(1));

    exec.start();
    exec.tick().unwrap();
    assert_eq!(exec.current_time(), Rational::from(2));
}
