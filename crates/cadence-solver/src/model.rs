//! Opaque handles into the solver's model.
//!
//! Atoms, terms, predicates, and types are owned by the solver; the
//! executor only ever holds these ids and asks the solver about them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lit::Lit;

/// Name of the firing instant of a punctual atom.
pub const AT: &str = "at";
/// Name of the start coordinate of an interval atom.
pub const START: &str = "start";
/// Name of the end coordinate of an interval atom.
pub const END: &str = "end";
/// Name of the duration coordinate of an interval atom.
pub const DURATION: &str = "duration";

/// A plan atom (a punctual or interval activity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub u64);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed term of the model: a parameter of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermId(pub u64);

/// A predicate of the planning problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredId(pub u32);

/// A composite type of the planning problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// A value of a set-valued (enumerated) variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumVal(pub u64);

/// Handle of a theory registered with the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TheoryId(pub u32);

/// The tag a term's domain carries; the executor branches on this when
/// snapshotting and replaying bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    /// A propositional term, backed by the given SAT literal.
    Bool(Lit),
    /// A numeric term, backed by a linear expression.
    Arith,
    /// A set-valued term.
    Enum,
}

/// Payload of a flaw-created signal. The executor reacts to atom flaws
/// only; everything else the search produces is opaque to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flaw {
    Atom(AtomId),
    Other,
}
