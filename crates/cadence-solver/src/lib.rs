//! # Cadence Solver Contract
//!
//! The interface between the cadence plan executor and the constraint
//! solver it drives. This crate defines:
//!
//! - the shared value types: literals, truth values, rationals and
//!   inf-rationals, linear expressions, and opaque model handles;
//! - the [`Solver`] facade the executor consumes;
//! - the [`Theory`] protocol and the listener surfaces the executor
//!   implements.
//!
//! No solver lives here: real deployments plug in an external solver,
//! and the test suites use the scripted one from `cadence-testkit`.

pub mod error;
pub mod linear;
pub mod lit;
pub mod model;
pub mod rational;
pub mod solver;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::SolverError;
    pub use crate::linear::{ArithVar, LinExpr};
    pub use crate::lit::{Lbool, Lit, Var};
    pub use crate::model::{
        AtomId, EnumVal, Flaw, PredId, TermId, TermKind, TheoryId, TypeId, AT, DURATION, END,
        START,
    };
    pub use crate::rational::{InfRational, Rational};
    pub use crate::solver::{
        CoreListener, CoreListenerRef, Solver, SolverListener, SolverListenerRef, Theory,
        TheoryRef,
    };
}

pub use error::SolverError;
pub use linear::{ArithVar, LinExpr};
pub use lit::{Lbool, Lit, Var};
pub use model::{
    AtomId, EnumVal, Flaw, PredId, TermId, TermKind, TheoryId, TypeId, AT, DURATION, END, START,
};
pub use rational::{InfRational, Rational};
pub use solver::{
    CoreListener, CoreListenerRef, Solver, SolverListener, SolverListenerRef, Theory, TheoryRef,
};
