//! Contract-level checks: guard clauses, seeded bounds, replay, and
//! pulse-index rebuilds.

use std::sync::{Arc, Mutex};

use cadence_core::{relevant_predicates, Executor, PulseIndex};
use cadence_solver::{InfRational, Lbool, Rational, Solver, END, START};
use cadence_testkit::ScriptedSolver;

#[test]
fn test_discovered_atom_gets_guard_clause_and_seeded_bound() {
    let slv = Arc::new(Mutex::new(ScriptedSolver::new()));
    let exec = Executor::new(slv.clone(), "protocol");

    let (atom, sigma) = {
        let mut s = slv.lock().expect("lock");
        let pred = s.interval_predicate();
        let atom = s.new_interval_atom(pred, 3, 5);
        s.set_horizon(5);
        (atom, s.atom_sigma(atom))
    };

    // ¬σ ∨ ¬ξ ∨ σξ was posted the moment the atom was discovered.
    {
        let s = slv.lock().expect("lock");
        let guard_clause = s
            .clauses()
            .iter()
            .find(|c| c.len() == 3 && c[0] == !sigma)
            .cloned();
        assert!(guard_clause.is_some(), "guard clause missing");
        let clause = guard_clause.unwrap();
        assert!(!clause[1].is_positive());
        assert!(clause[2].is_positive());
    }

    // Solving replays the seeded bound: the atom cannot start before
    // the clock that has already run.
    exec.init().unwrap();
    let start_term = slv.lock().expect("lock").atom_param(atom, START).unwrap();
    let (lb, ub, _) = slv.lock().expect("lock").arith_state(start_term).unwrap();
    assert_eq!(lb, InfRational::ZERO);
    assert_eq!(ub, InfRational::positive_infinity());
}

#[test]
fn test_started_atom_has_pinned_parameters() {
    let slv = Arc::new(Mutex::new(ScriptedSolver::new()));
    let exec = Executor::new(slv.clone(), "protocol");

    let (atom, level_term, mode_term) = {
        let mut s = slv.lock().expect("lock");
        let pred = s.interval_predicate();
        let atom = s.new_interval_atom(pred, 1, 4);
        let level = s.add_arith_param(atom, "level", 7);
        let mode = s.add_enum_param(atom, "mode", vec![10, 11]);
        s.add_bool_param(atom, "armed");
        s.set_horizon(4);
        (atom, level, mode)
    };

    exec.init().unwrap();
    exec.start();
    exec.tick().unwrap();
    assert_eq!(exec.executing(), vec![atom]);

    // The non-coordinate arithmetic parameter is frozen at its
    // committed value; start is pinned as well.
    let (lb, ub, value) = slv.lock().expect("lock").arith_state(level_term).unwrap();
    assert_eq!(lb, InfRational::from(7));
    assert_eq!(ub, InfRational::from(7));
    assert_eq!(value, InfRational::from(7));
    let start_term = slv.lock().expect("lock").atom_param(atom, START).unwrap();
    let (lb, ub, _) = slv.lock().expect("lock").arith_state(start_term).unwrap();
    assert_eq!(lb, InfRational::from(1));
    assert_eq!(ub, InfRational::from(1));

    // The enum parameter collapsed to a singleton before the start.
    assert_eq!(slv.lock().expect("lock").enum_value(mode_term).len(), 1);

    // Ending pins the end coordinate too.
    for _ in 0..3 {
        exec.tick().unwrap();
    }
    assert!(exec.executing().is_empty());
    let end_term = slv.lock().expect("lock").atom_param(atom, END).unwrap();
    let (lb, ub, _) = slv.lock().expect("lock").arith_state(end_term).unwrap();
    assert_eq!(lb, InfRational::from(4));
    assert_eq!(ub, InfRational::from(4));
}

#[test]
fn test_rebuild_drops_past_and_absent_atoms() {
    let mut s = ScriptedSolver::new();
    let pred = s.interval_predicate();
    let future = s.new_interval_atom(pred, 3, 5);
    let past = s.new_interval_atom(pred, 0, 1);
    let overlapping = s.new_interval_atom(pred, 1, 4);
    s.solve();

    let relevant = relevant_predicates(&s);
    let mut index = PulseIndex::default();
    index.rebuild(&s, &relevant, &Rational::from(2), &Default::default());

    assert!(index.is_consistent());
    // Pulses 3 and 5 for the future atom, 4 for the overlap's end; the
    // fully past atom contributes nothing, and an interval already
    // under way keeps only its end event.
    assert_eq!(index.pulse_count(), 3);
    let (t, starting, ending) = index.due(&InfRational::from(3)).unwrap();
    assert_eq!(t, InfRational::from(3));
    assert_eq!(starting, vec![future]);
    assert!(ending.is_empty());
    index.remove(&t);
    let (t, starting, ending) = index.due(&InfRational::from(4)).unwrap();
    assert_eq!(t, InfRational::from(4));
    assert!(starting.is_empty());
    assert_eq!(ending, vec![overlapping]);
    let _ = past;
}

#[test]
fn test_rebuild_skips_inactive_atoms() {
    let mut s = ScriptedSolver::new();
    let pred = s.interval_predicate();
    let atom = s.new_interval_atom(pred, 3, 5);
    // Never solved: σ is still undefined, so the atom is not active.
    assert_eq!(s.sigma_value(atom), Lbool::Undef);

    let relevant = relevant_predicates(&s);
    let mut index = PulseIndex::default();
    index.rebuild(&s, &relevant, &Rational::ZERO, &Default::default());
    assert!(index.is_empty());
}

#[test]
fn test_rebuild_never_restarts_an_executing_atom() {
    let mut s = ScriptedSolver::new();
    let pred = s.interval_predicate();
    let atom = s.new_interval_atom(pred, 2, 6);
    s.solve();

    let relevant = relevant_predicates(&s);
    let executing = std::collections::BTreeSet::from([atom]);
    let mut index = PulseIndex::default();
    index.rebuild(&s, &relevant, &Rational::from(2), &executing);

    // Only the end event survives for an atom already under way.
    assert_eq!(index.pulse_count(), 1);
    let (t, starting, ending) = index.due(&InfRational::from(6)).unwrap();
    assert_eq!(t, InfRational::from(6));
    assert!(starting.is_empty());
    assert_eq!(ending, vec![atom]);
}

#[test]
fn test_relevant_predicates_walks_the_type_hierarchy() {
    let mut s = ScriptedSolver::new();
    let top = s.interval_predicate();
    let nested = s.nested_interval_predicate();

    let relevant = relevant_predicates(&s);
    assert!(relevant.contains(&top));
    assert!(relevant.contains(&nested));
}

#[test]
fn test_punctual_atom_occupies_both_maps_at_one_pulse() {
    let mut s = ScriptedSolver::new();
    let pred = s.impulse_predicate();
    let atom = s.new_impulse_atom(pred, 7);
    s.solve();

    let relevant = relevant_predicates(&s);
    let mut index = PulseIndex::default();
    index.rebuild(&s, &relevant, &Rational::ZERO, &Default::default());

    assert_eq!(index.pulse_count(), 1);
    let (t, starting, ending) = index.due(&InfRational::from(7)).unwrap();
    assert_eq!(t, InfRational::from(7));
    assert_eq!(starting, vec![atom]);
    assert_eq!(ending, vec![atom]);
}
