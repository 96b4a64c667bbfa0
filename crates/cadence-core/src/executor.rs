//! The tick engine and the executor controller.
//!
//! [`Executor`] is the public facade: it owns the clock, routes adapt
//! and failure requests, and serializes the whole control surface
//! behind the solver lock. The cloneable [`ExecutorHandle`] is what the
//! solver talks back to: it is registered as a theory (to replay
//! execution bounds under their guard literals) and as a listener on
//! the solver's problem and search events.
//!
//! Lock discipline: the solver lock is taken first and held for the
//! whole public call; the core lock is taken in short scopes and is
//! never held across a dispatching solver call (`propagate`, `solve`,
//! `take_decision`, `read_*`). A poisoned lock means a panic unwound
//! through executor state: fallible paths surface it as
//! [`ExecutorError::Poisoned`], queries report the executor as failed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use cadence_solver::{
    AtomId, CoreListenerRef, Flaw, InfRational, Lbool, Lit, PredId, Rational, Solver,
    SolverListenerRef, TermKind, TheoryRef, AT, DURATION, END, START,
};

use crate::adaptation::{AdaptationStore, BoundSnapshot};
use crate::error::ExecutorError;
use crate::listener::{DeferralSink, ExecutorListenerRef, ListenerId};
use crate::pulse::{relevant_predicates, PulseIndex};
use crate::state::ExecutorState;
use crate::theory::replay_snapshot;

/// Which side of an activity a deferral applies to.
#[derive(Clone, Copy)]
enum Phase {
    Start,
    End,
}

pub(crate) struct ExecutorCore {
    store: AdaptationStore,
    index: PulseIndex,
    relevant: HashSet<PredId>,
    executing: BTreeSet<AtomId>,
    dont_start: HashMap<AtomId, Rational>,
    dont_end: HashMap<AtomId, Rational>,
    current_time: Rational,
    units_per_tick: Rational,
    state: ExecutorState,
    pending_requirements: bool,
    listeners: Vec<(ListenerId, ExecutorListenerRef)>,
    next_listener: u64,
    running: Arc<AtomicBool>,
}

impl ExecutorCore {
    fn listeners_snapshot(&self) -> Vec<ExecutorListenerRef> {
        self.listeners.iter().map(|(_, l)| l.clone()).collect()
    }
}

/// Move the state machine and notify observers. A no-op when already in
/// the target state.
fn transition(core: &Arc<Mutex<ExecutorCore>>, to: ExecutorState) {
    let listeners = {
        let Ok(mut core) = core.lock() else { return };
        if core.state == to {
            return;
        }
        tracing::info!(from = %core.state, to = %to, "executor state changed");
        core.state = to;
        core.listeners_snapshot()
    };
    for l in &listeners {
        if let Ok(mut listener) = l.lock() {
            listener.executor_state_changed(to);
        }
    }
    if to == ExecutorState::Finished {
        for l in &listeners {
            if let Ok(mut listener) = l.lock() {
                listener.finished();
            }
        }
    }
}

/// The solver-facing side of the executor. Registered with the solver
/// as a theory and as a problem/search listener; every callback locks
/// the shared core briefly and only calls non-dispatching solver
/// methods while it does.
#[derive(Clone)]
pub(crate) struct ExecutorHandle {
    core: Arc<Mutex<ExecutorCore>>,
}

impl ExecutorHandle {
    fn plan_dead(&self) {
        tracing::error!("liveness literal forced false, plan unsalvageable");
        if let Ok(core) = self.core.lock() {
            core.running.store(false, Ordering::Release);
        }
        transition(&self.core, ExecutorState::Failed);
    }
}

impl cadence_solver::Theory for ExecutorHandle {
    fn propagate(&mut self, slv: &mut dyn Solver, p: Lit) -> bool {
        let Ok(core) = self.core.lock() else {
            return true;
        };
        if p == core.store.xi() {
            // The executor went live: replay every record whose guard
            // is already committed.
            for (_, record) in core.store.iter() {
                if slv.value(record.sigma_xi) != Lbool::True {
                    continue;
                }
                for (term, snapshot) in &record.bounds {
                    if !replay_snapshot(slv, *term, snapshot, record.sigma_xi) {
                        return false;
                    }
                }
            }
        } else if slv.value(Lit::positive(p.var())) == Lbool::True {
            // A guard was committed: replay that record alone.
            if let Some(atom) = core.store.atom_for_guard(p.var()) {
                if let Some(record) = core.store.record(atom) {
                    for (term, snapshot) in &record.bounds {
                        if !replay_snapshot(slv, *term, snapshot, p) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

impl cadence_solver::CoreListener for ExecutorHandle {
    fn read(&mut self, slv: &mut dyn Solver) {
        let relevant = relevant_predicates(slv);
        if let Ok(mut core) = self.core.lock() {
            core.relevant = relevant;
        }
    }

    fn started_solving(&mut self, _slv: &mut dyn Solver) {
        let adapting = self
            .core
            .lock()
            .map(|core| core.state != ExecutorState::Reasoning)
            .unwrap_or(false);
        if adapting {
            transition(&self.core, ExecutorState::Adapting);
        }
    }

    fn solution_found(&mut self, slv: &mut dyn Solver) {
        let Ok(xi) = self.core.lock().map(|core| core.store.xi()) else {
            return;
        };
        match slv.value(xi) {
            Lbool::False => return self.plan_dead(),
            Lbool::Undef => {
                // Pin the executor live for the life of the plan.
                slv.take_decision(xi);
            }
            Lbool::True => {}
        }
        match slv.value(xi) {
            Lbool::False => return self.plan_dead(),
            Lbool::Undef => {
                // The decision did not stick; try solving again and let
                // the nested round finish the bookkeeping.
                slv.solve();
                return;
            }
            Lbool::True => {}
        }

        let running = {
            let Ok(mut core) = self.core.lock() else { return };
            let core = &mut *core;
            // Activities removed by the new solution are no longer
            // executing.
            core.executing
                .retain(|a| slv.value(slv.atom_sigma(*a)) == Lbool::True);
            core.index
                .rebuild(slv, &core.relevant, &core.current_time, &core.executing);
            core.running.load(Ordering::Acquire)
        };
        let to = if running {
            ExecutorState::Executing
        } else {
            ExecutorState::Idle
        };
        transition(&self.core, to);
    }

    fn inconsistent_problem(&mut self, _slv: &mut dyn Solver) {
        if let Ok(mut core) = self.core.lock() {
            core.index.clear();
            core.running.store(false, Ordering::Release);
        }
        transition(&self.core, ExecutorState::Failed);
    }
}

impl cadence_solver::SolverListener for ExecutorHandle {
    fn flaw_created(&mut self, slv: &mut dyn Solver, flaw: &Flaw) {
        if let Flaw::Atom(atom) = flaw {
            if let Ok(mut core) = self.core.lock() {
                let now = core.current_time;
                core.store.observe(slv, *atom, now);
            }
        }
    }
}

/// The plan executor: drives a solved timeline forward one time quantum
/// per tick, mediates observer deferrals, freezes committed values, and
/// re-invokes the solver when requirements change or activities fail.
pub struct Executor<S> {
    slv: Arc<Mutex<S>>,
    core: Arc<Mutex<ExecutorCore>>,
    running: Arc<AtomicBool>,
    id: Uuid,
    name: String,
}

impl<S: Solver> Executor<S> {
    /// Attach an executor to a solver, advancing one plan unit per
    /// tick.
    pub fn new(slv: Arc<Mutex<S>>, name: impl Into<String>) -> Self {
        Self::with_units(slv, name, Rational::ONE)
    }

    /// Attach an executor advancing `units_per_tick` plan units per
    /// tick. The quantum is immutable afterwards.
    pub fn with_units(
        slv: Arc<Mutex<S>>,
        name: impl Into<String>,
        units_per_tick: Rational,
    ) -> Self {
        debug_assert!(units_per_tick.is_positive(), "tick quantum must be positive");
        let running = Arc::new(AtomicBool::new(false));
        let core;
        {
            let mut s = slv.lock().unwrap_or_else(PoisonError::into_inner);
            let xi = Lit::positive(s.new_var());
            core = Arc::new(Mutex::new(ExecutorCore {
                store: AdaptationStore::new(xi),
                index: PulseIndex::default(),
                relevant: HashSet::new(),
                executing: BTreeSet::new(),
                dont_start: HashMap::new(),
                dont_end: HashMap::new(),
                current_time: Rational::ZERO,
                units_per_tick,
                state: ExecutorState::Reasoning,
                pending_requirements: false,
                listeners: Vec::new(),
                next_listener: 0,
                running: running.clone(),
            }));
            let handle = ExecutorHandle { core: core.clone() };
            let theory_ref: TheoryRef = Arc::new(Mutex::new(handle.clone()));
            let theory = s.add_theory(theory_ref);
            s.bind(xi.var(), theory);
            if let Ok(mut c) = core.lock() {
                c.store.set_theory(theory);
                c.relevant = relevant_predicates(&*s);
            }
            let core_ref: CoreListenerRef = Arc::new(Mutex::new(handle.clone()));
            s.add_core_listener(core_ref);
            let search_ref: SolverListenerRef = Arc::new(Mutex::new(handle));
            s.add_solver_listener(search_ref);
        }
        Executor {
            slv,
            core,
            running,
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Solve the freshly read problem: `Reasoning → Idle` on success,
    /// `Reasoning → Failed` otherwise.
    pub fn init(&self) -> Result<(), ExecutorError> {
        let mut slv = self.lock_solver()?;
        tracing::info!(name = %self.name, "solving the initial problem");
        if !slv.solve() {
            return Err(self.fatal());
        }
        self.ensure_live()
    }

    /// Begin execution: subsequent ticks drive the plan forward. Only
    /// meaningful from `Idle`.
    pub fn start(&self) {
        let Ok(_serial) = self.slv.lock() else { return };
        let idle = self
            .core
            .lock()
            .map(|core| core.state == ExecutorState::Idle)
            .unwrap_or(false);
        if !idle {
            return;
        }
        self.running.store(true, Ordering::Release);
        transition(&self.core, ExecutorState::Executing);
    }

    /// Stop driving the plan; an in-progress tick is not aborted. Only
    /// meaningful from `Executing`.
    pub fn pause(&self) {
        let Ok(_serial) = self.slv.lock() else { return };
        let executing = self
            .core
            .lock()
            .map(|core| core.state == ExecutorState::Executing)
            .unwrap_or(false);
        if !executing {
            return;
        }
        self.running.store(false, Ordering::Release);
        transition(&self.core, ExecutorState::Idle);
    }

    /// Advance the plan by one time quantum.
    ///
    /// Pending requirements are solved first; while running, the clock
    /// advances and every pulse at or before the new time is processed:
    /// observers are notified, deferrals are applied (re-solving and
    /// restarting the drain), and committed values are frozen into the
    /// adaptation records.
    pub fn tick(&self) -> Result<(), ExecutorError> {
        let mut slv = self.lock_solver()?;
        self.tick_inner(&mut *slv)
    }

    fn tick_inner(&self, slv: &mut S) -> Result<(), ExecutorError> {
        if self.lock_core()?.state == ExecutorState::Failed {
            return Ok(());
        }
        if self.lock_core()?.pending_requirements {
            tracing::info!("re-solving with pending requirements");
            if !slv.solve() {
                return Err(self.fatal());
            }
            self.ensure_live()?;
            self.lock_core()?.pending_requirements = false;
        }
        if !self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        let now = {
            let mut core = self.lock_core()?;
            let units = core.units_per_tick;
            core.current_time += units;
            core.current_time
        };
        tracing::debug!(time = %now, "tick");
        let now_inf = InfRational::from(now);

        // Drain pulses due at the current time. Deferrals re-solve and
        // restart the drain, so this runs to a fixpoint.
        loop {
            let due = self.lock_core()?.index.due(&now_inf);
            let Some((pulse, starting, ending)) = due else {
                break;
            };

            let listeners = self.lock_core()?.listeners_snapshot();
            let mut sink = DeferralSink::default();
            if !starting.is_empty() {
                for l in &listeners {
                    if let Ok(mut listener) = l.lock() {
                        listener.starting(&mut sink, &starting);
                    }
                }
            }
            if !ending.is_empty() {
                for l in &listeners {
                    if let Ok(mut listener) = l.lock() {
                        listener.ending(&mut sink, &ending);
                    }
                }
            }
            {
                let (start, end) = sink.into_parts();
                let mut core = self.lock_core()?;
                core.dont_start.extend(start);
                core.dont_end.extend(end);
            }

            let mut delayed = self
                .apply_delays(slv, &starting, Phase::Start)
                .map_err(|e| self.fail_with(e))?;
            delayed |= self
                .apply_delays(slv, &ending, Phase::End)
                .map_err(|e| self.fail_with(e))?;
            if delayed {
                if !slv.propagate() || !slv.solve() {
                    return Err(self.fatal());
                }
                self.ensure_live()?;
                continue;
            }

            self.commit_starts(slv, &starting)
                .map_err(|e| self.fail_with(e))?;
            self.commit_ends(slv, &ending)
                .map_err(|e| self.fail_with(e))?;
            self.lock_core()?.index.remove(&pulse);
        }

        let at_horizon = match slv.horizon() {
            Some(h) => slv.arith_value(h) <= now_inf,
            None => false,
        };
        let finish = at_horizon && {
            let core = self.lock_core()?;
            core.dont_end.is_empty() && core.state != ExecutorState::Finished
        };
        if finish {
            tracing::info!(time = %now, "horizon reached");
            self.running.store(false, Ordering::Release);
            transition(&self.core, ExecutorState::Finished);
        }

        let listeners = self.lock_core()?.listeners_snapshot();
        for l in &listeners {
            if let Ok(mut listener) = l.lock() {
                listener.tick(&now);
            }
        }
        Ok(())
    }

    /// Consume the deferral entries of the atoms at the current pulse,
    /// pushing their time coordinates into the future.
    fn apply_delays(
        &self,
        slv: &mut S,
        atoms: &[AtomId],
        phase: Phase,
    ) -> Result<bool, ExecutorError> {
        let mut delayed = false;
        let mut core = self.lock_core()?;
        let core = &mut *core;
        for atom in atoms {
            let table = match phase {
                Phase::Start => &mut core.dont_start,
                Phase::End => &mut core.dont_end,
            };
            let Some(requested) = table.remove(atom) else {
                continue;
            };
            let name = if slv.is_impulse_atom(*atom) {
                AT
            } else {
                match phase {
                    Phase::Start => START,
                    Phase::End => END,
                }
            };
            let term = slv
                .atom_param(*atom, name)
                .ok_or(ExecutorError::MissingCoordinate(*atom, name))?;
            if slv.is_constant(term) {
                return Err(ExecutorError::ConstantCoordinate(*atom));
            }
            let step = if core.units_per_tick > requested {
                core.units_per_tick
            } else {
                requested
            };
            let lb = slv.arith_value(term) + step;
            let (_, ub) = slv.arith_bounds(term);
            let record = core
                .store
                .record_mut(*atom)
                .ok_or(ExecutorError::MissingAdaptation(*atom))?;
            record.raise_lb(term, lb, ub);
            let reason = record.sigma_xi;
            tracing::debug!(atom = %atom, lb = %lb, "activity deferred");
            if let Some(lin) = slv.term_lin(term) {
                let var = slv.arith_var(&lin);
                if !slv.set_lb(var, lb, reason) {
                    tracing::warn!(atom = %atom, "deferral bound rejected, backjumping");
                    if !slv.analyze_and_backjump() {
                        return Err(ExecutorError::Unexecutable);
                    }
                }
            }
            delayed = true;
        }
        Ok(delayed)
    }

    /// Freeze the committed parameter values of the starting atoms,
    /// move them into the executing set, and notify observers.
    fn commit_starts(&self, slv: &mut S, atoms: &[AtomId]) -> Result<(), ExecutorError> {
        if atoms.is_empty() {
            return Ok(());
        }
        {
            let mut core = self.lock_core()?;
            let core = &mut *core;
            for atom in atoms {
                let record = core
                    .store
                    .record_mut(*atom)
                    .ok_or(ExecutorError::MissingAdaptation(*atom))?;
                let reason = record.sigma_xi;
                for (name, term) in slv.atom_params(*atom) {
                    // The firing instant and the end-side coordinates
                    // stay free until the activity ends.
                    if name == AT || name == DURATION || name == END {
                        continue;
                    }
                    match slv.term_kind(term) {
                        TermKind::Bool(lit) => {
                            let val = slv.value(lit);
                            debug_assert!(val != Lbool::Undef, "unassigned parameter at start");
                            record.bounds.insert(term, BoundSnapshot::Bool(val));
                        }
                        TermKind::Arith => {
                            if slv.is_constant(term) {
                                continue;
                            }
                            let val = slv.arith_value(term);
                            record.pin(term, val);
                            if let Some(lin) = slv.term_lin(term) {
                                let var = slv.arith_var(&lin);
                                if !slv.set_eq(var, val, reason) {
                                    tracing::warn!(atom = %atom, "freeze rejected, backjumping");
                                    if !slv.analyze_and_backjump() {
                                        return Err(ExecutorError::Unexecutable);
                                    }
                                }
                            }
                        }
                        TermKind::Enum => {
                            let domain = slv.enum_value(term);
                            debug_assert_eq!(domain.len(), 1, "unresolved enum at start");
                            if let Some(val) = domain.first() {
                                record.bounds.insert(term, BoundSnapshot::Enum(*val));
                            }
                        }
                    }
                }
                core.executing.insert(*atom);
            }
        }
        tracing::debug!(count = atoms.len(), "activities started");
        let listeners = self.lock_core()?.listeners_snapshot();
        for l in &listeners {
            if let Ok(mut listener) = l.lock() {
                listener.start(atoms);
            }
        }
        Ok(())
    }

    /// Freeze the firing/end coordinate of the ending atoms, drop them
    /// from the executing set, and notify observers.
    fn commit_ends(&self, slv: &mut S, atoms: &[AtomId]) -> Result<(), ExecutorError> {
        if atoms.is_empty() {
            return Ok(());
        }
        {
            let mut core = self.lock_core()?;
            let core = &mut *core;
            for atom in atoms {
                let name = if slv.is_impulse_atom(*atom) {
                    AT
                } else if slv.is_interval_atom(*atom) {
                    END
                } else {
                    continue;
                };
                let Some(term) = slv.atom_param(*atom, name) else {
                    continue;
                };
                if !slv.is_constant(term) {
                    let val = slv.arith_value(term);
                    let record = core
                        .store
                        .record_mut(*atom)
                        .ok_or(ExecutorError::MissingAdaptation(*atom))?;
                    record.pin(term, val);
                    let reason = record.sigma_xi;
                    if let Some(lin) = slv.term_lin(term) {
                        let var = slv.arith_var(&lin);
                        if !slv.set_eq(var, val, reason) {
                            tracing::warn!(atom = %atom, "freeze rejected, backjumping");
                            if !slv.analyze_and_backjump() {
                                return Err(ExecutorError::Unexecutable);
                            }
                        }
                    }
                }
                core.executing.remove(atom);
            }
        }
        tracing::debug!(count = atoms.len(), "activities ended");
        let listeners = self.lock_core()?.listeners_snapshot();
        for l in &listeners {
            if let Ok(mut listener) = l.lock() {
                listener.end(atoms);
            }
        }
        Ok(())
    }

    /// Queue new requirements from a script; the SAT core is popped to
    /// root level first, discarding all speculative search. Re-solving
    /// happens on the next tick.
    pub fn adapt(&self, script: &str) -> Result<(), ExecutorError> {
        let mut slv = self.lock_solver()?;
        while !slv.root_level() {
            slv.pop();
        }
        slv.read_script(script)?;
        self.lock_core()?.pending_requirements = true;
        tracing::info!("requirements queued for the next tick");
        Ok(())
    }

    /// Queue new requirements from files.
    pub fn adapt_files(&self, files: &[PathBuf]) -> Result<(), ExecutorError> {
        let mut slv = self.lock_solver()?;
        while !slv.root_level() {
            slv.pop();
        }
        slv.read_files(files)?;
        self.lock_core()?.pending_requirements = true;
        tracing::info!(count = files.len(), "requirement files queued for the next tick");
        Ok(())
    }

    /// Report that the given activities did not execute as planned: the
    /// solver must find a plan that does not depend on them having
    /// succeeded.
    pub fn failure(&self, atoms: &HashSet<AtomId>) -> Result<(), ExecutorError> {
        let mut slv = self.lock_solver()?;
        tracing::warn!(count = atoms.len(), "activities reported as failed");
        let conflict: Vec<Lit> = atoms.iter().map(|a| !slv.atom_sigma(*a)).collect();
        slv.post_conflict(conflict);
        if !slv.analyze_and_backjump() || !slv.solve() {
            return Err(self.fatal());
        }
        self.ensure_live()
    }

    /// Defer starting the given atoms; meant to be called between the
    /// `starting` notification and the end of the same tick.
    pub fn dont_start_yet(&self, atoms: HashMap<AtomId, Rational>) {
        if let Ok(mut core) = self.core.lock() {
            core.dont_start.extend(atoms);
        }
    }

    /// Defer ending the given atoms.
    pub fn dont_end_yet(&self, atoms: HashMap<AtomId, Rational>) {
        if let Ok(mut core) = self.core.lock() {
            core.dont_end.extend(atoms);
        }
    }

    /// Register an observer; the returned id unregisters it. A dead id
    /// is returned when the executor state is poisoned.
    pub fn add_listener(&self, listener: ExecutorListenerRef) -> ListenerId {
        match self.core.lock() {
            Ok(mut core) => {
                let id = ListenerId(core.next_listener);
                core.next_listener += 1;
                core.listeners.push((id, listener));
                id
            }
            Err(_) => ListenerId(u64::MAX),
        }
    }

    pub fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut core) = self.core.lock() {
            core.listeners.retain(|(lid, _)| *lid != id);
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ExecutorState {
        self.core
            .lock()
            .map(|core| core.state)
            .unwrap_or(ExecutorState::Failed)
    }

    pub fn current_time(&self) -> Rational {
        self.core
            .lock()
            .map(|core| core.current_time)
            .unwrap_or_default()
    }

    pub fn units_per_tick(&self) -> Rational {
        self.core
            .lock()
            .map(|core| core.units_per_tick)
            .unwrap_or(Rational::ONE)
    }

    /// The atoms whose start has fired and whose end has not.
    pub fn executing(&self) -> Vec<AtomId> {
        self.core
            .lock()
            .map(|core| core.executing.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The solver this executor drives.
    pub fn solver(&self) -> Arc<Mutex<S>> {
        self.slv.clone()
    }

    fn lock_core(&self) -> Result<MutexGuard<'_, ExecutorCore>, ExecutorError> {
        self.core.lock().map_err(|_| ExecutorError::Poisoned)
    }

    fn lock_solver(&self) -> Result<MutexGuard<'_, S>, ExecutorError> {
        self.slv.lock().map_err(|_| ExecutorError::Poisoned)
    }

    fn fatal(&self) -> ExecutorError {
        self.fail_with(ExecutorError::Unexecutable)
    }

    fn fail_with(&self, err: ExecutorError) -> ExecutorError {
        tracing::error!(error = %err, "execution failure");
        self.running.store(false, Ordering::Release);
        transition(&self.core, ExecutorState::Failed);
        err
    }

    fn ensure_live(&self) -> Result<(), ExecutorError> {
        if self.lock_core()?.state == ExecutorState::Failed {
            Err(ExecutorError::Unexecutable)
        } else {
            Ok(())
        }
    }
}

impl<S> std::fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
