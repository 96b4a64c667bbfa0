//! The solver contract.
//!
//! The executor consumes a constraint solver through the [`Solver`]
//! facade and plugs into it through the [`Theory`] propagation protocol
//! and the [`CoreListener`]/[`SolverListener`] callback surfaces. All
//! callbacks receive the solver as an explicit `&mut dyn Solver`
//! argument, so no registered handle ever stores a solver reference.
//!
//! Dispatch contract: only [`Solver::propagate`], [`Solver::solve`],
//! [`Solver::take_decision`], [`Solver::read_script`], and
//! [`Solver::read_files`] may invoke registered theories or listeners.
//! Every other method is non-dispatching and is safe to call from
//! inside a callback.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::SolverError;
use crate::linear::{ArithVar, LinExpr};
use crate::lit::{Lbool, Lit, Var};
use crate::model::{AtomId, EnumVal, Flaw, PredId, TermId, TermKind, TheoryId, TypeId};
use crate::rational::InfRational;

pub type TheoryRef = Arc<Mutex<dyn Theory>>;
pub type CoreListenerRef = Arc<Mutex<dyn CoreListener>>;
pub type SolverListenerRef = Arc<Mutex<dyn SolverListener>>;

/// A theory module participating in the solver's propagation loop.
pub trait Theory: Send {
    /// Called when a literal watched by this theory is fixed. Returning
    /// `false` signals a conflict; the theory must have placed its
    /// explanation in the solver's conflict buffer first.
    fn propagate(&mut self, slv: &mut dyn Solver, p: Lit) -> bool;

    /// Final consistency check before a solution is accepted.
    fn check(&mut self, _slv: &mut dyn Solver) -> bool {
        true
    }

    /// A new decision level was pushed.
    fn push(&mut self) {}

    /// A decision level was popped.
    fn pop(&mut self) {}
}

/// Listener on the solver's problem-level events.
pub trait CoreListener: Send {
    /// New requirements were read into the problem.
    fn read(&mut self, _slv: &mut dyn Solver) {}

    /// A solving round is about to begin.
    fn started_solving(&mut self, _slv: &mut dyn Solver) {}

    /// The solver reached a solution.
    fn solution_found(&mut self, _slv: &mut dyn Solver) {}

    /// The problem was proven inconsistent.
    fn inconsistent_problem(&mut self, _slv: &mut dyn Solver) {}
}

/// Listener on the solver's search events.
pub trait SolverListener: Send {
    /// A flaw was created during search.
    fn flaw_created(&mut self, _slv: &mut dyn Solver, _flaw: &Flaw) {}
}

/// Flattened facade over the solver: the SAT core, the arithmetic and
/// enum theories, the problem-level API, and the model registry.
pub trait Solver: Send {
    // --- SAT core ---

    fn new_var(&mut self) -> Var;

    /// Post a clause. Returns `false` if the clause makes the problem
    /// trivially inconsistent at root level.
    fn new_clause(&mut self, clause: Vec<Lit>) -> bool;

    fn value(&self, p: Lit) -> Lbool;

    /// Run propagation to fixpoint, dispatching watched-literal events
    /// to the registered theories. Returns `false` on conflict.
    fn propagate(&mut self) -> bool;

    /// Pop one decision level.
    fn pop(&mut self);

    fn root_level(&self) -> bool;

    /// Take a search decision on the given literal and propagate it.
    fn take_decision(&mut self, p: Lit) -> bool;

    /// Watch a variable on behalf of a theory: the theory's
    /// [`Theory::propagate`] fires whenever the variable is fixed.
    fn bind(&mut self, v: Var, th: TheoryId);

    /// Record a lazy implication clause at the current level.
    fn record(&mut self, clause: Vec<Lit>);

    /// Place a conflict explanation in the shared conflict buffer.
    fn post_conflict(&mut self, conflict: Vec<Lit>);

    /// Analyze the pending conflict and backjump. Returns `false` when
    /// the conflict cannot be resolved.
    fn analyze_and_backjump(&mut self) -> bool;

    // --- registration ---

    fn add_theory(&mut self, th: TheoryRef) -> TheoryId;

    fn add_core_listener(&mut self, l: CoreListenerRef);

    fn add_solver_listener(&mut self, l: SolverListenerRef);

    // --- arithmetic theory ---

    /// Materialize a theory variable for a linear expression.
    fn arith_var(&mut self, lin: &LinExpr) -> ArithVar;

    fn set_lb(&mut self, v: ArithVar, lb: InfRational, reason: Lit) -> bool;

    fn set_ub(&mut self, v: ArithVar, ub: InfRational, reason: Lit) -> bool;

    /// Pin a theory variable to an exact value.
    fn set_eq(&mut self, v: ArithVar, val: InfRational, reason: Lit) -> bool;

    // --- enum theory ---

    /// The current domain of a set-valued term.
    fn enum_value(&self, t: TermId) -> Vec<EnumVal>;

    /// The literal asserting that a set-valued term allows a value.
    fn allows(&mut self, t: TermId, val: EnumVal) -> Lit;

    // --- problem facade ---

    fn read_script(&mut self, script: &str) -> Result<(), SolverError>;

    fn read_files(&mut self, files: &[PathBuf]) -> Result<(), SolverError>;

    fn solve(&mut self) -> bool;

    fn arith_value(&self, t: TermId) -> InfRational;

    /// Inclusive bounds of an arithmetic term in the current state.
    fn arith_bounds(&self, t: TermId) -> (InfRational, InfRational);

    /// The expression bounding the plan's end, when the problem
    /// declares one.
    fn horizon(&self) -> Option<TermId>;

    // --- model registry ---

    /// Top-level predicates.
    fn predicates(&self) -> Vec<PredId>;

    /// Top-level composite types.
    fn types(&self) -> Vec<TypeId>;

    fn subtypes(&self, t: TypeId) -> Vec<TypeId>;

    fn type_predicates(&self, t: TypeId) -> Vec<PredId>;

    fn instances(&self, p: PredId) -> Vec<AtomId>;

    fn is_impulse(&self, p: PredId) -> bool;

    fn is_interval(&self, p: PredId) -> bool;

    fn is_impulse_atom(&self, a: AtomId) -> bool;

    fn is_interval_atom(&self, a: AtomId) -> bool;

    /// The presence literal of an atom.
    fn atom_sigma(&self, a: AtomId) -> Lit;

    fn atom_param(&self, a: AtomId, name: &str) -> Option<TermId>;

    fn atom_params(&self, a: AtomId) -> Vec<(String, TermId)>;

    fn term_kind(&self, t: TermId) -> TermKind;

    /// The linear expression backing an arithmetic term.
    fn term_lin(&self, t: TermId) -> Option<LinExpr>;

    fn is_constant(&self, t: TermId) -> bool;
}
