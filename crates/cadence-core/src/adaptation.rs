//! Per-atom execution commitments.
//!
//! For every atom the search discovers, the store owns one adaptation
//! record: a fresh guard literal σξ and the bound snapshots committed at
//! execution time. The guard clause `¬σ ∨ ¬ξ ∨ σξ` makes the snapshots
//! binding exactly while the atom is present and the executor is live;
//! if the solver ever backjumps past either, the guard frees and the
//! bounds relax on their own.

use std::collections::HashMap;

use cadence_solver::{
    AtomId, EnumVal, InfRational, Lbool, Lit, Rational, Solver, TermId, TheoryId, Var, AT, START,
};

/// A frozen value or interval, replayed by the theory propagator
/// whenever the owning record's guard becomes true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundSnapshot {
    /// A committed truth value.
    Bool(Lbool),
    /// An inclusive numeric interval.
    Arith { lb: InfRational, ub: InfRational },
    /// A singleton pinned from a set-valued variable.
    Enum(EnumVal),
}

/// The execution commitments of a single atom.
#[derive(Debug, Clone)]
pub struct AtomAdaptation {
    /// Guard under which the snapshots are enforced.
    pub sigma_xi: Lit,
    /// Snapshots keyed by the constrained term.
    pub bounds: HashMap<TermId, BoundSnapshot>,
}

impl AtomAdaptation {
    fn new(sigma_xi: Lit) -> Self {
        AtomAdaptation {
            sigma_xi,
            bounds: HashMap::new(),
        }
    }

    /// Raise the lower bound of a term's snapshot, creating the
    /// snapshot with the given upper bound when none exists yet.
    pub fn raise_lb(&mut self, term: TermId, lb: InfRational, ub_if_new: InfRational) {
        match self.bounds.get_mut(&term) {
            Some(BoundSnapshot::Arith { lb: cur, .. }) => *cur = lb,
            _ => {
                self.bounds.insert(
                    term,
                    BoundSnapshot::Arith {
                        lb,
                        ub: ub_if_new,
                    },
                );
            }
        }
    }

    /// Pin a term's snapshot to an exact value.
    pub fn pin(&mut self, term: TermId, val: InfRational) {
        self.bounds
            .insert(term, BoundSnapshot::Arith { lb: val, ub: val });
    }
}

/// The adaptation store: one record per discovered atom, indexed both
/// by atom and by guard variable.
#[derive(Debug)]
pub struct AdaptationStore {
    xi: Lit,
    theory: Option<TheoryId>,
    records: HashMap<AtomId, AtomAdaptation>,
    guards: HashMap<Var, AtomId>,
}

impl AdaptationStore {
    pub fn new(xi: Lit) -> Self {
        AdaptationStore {
            xi,
            theory: None,
            records: HashMap::new(),
            guards: HashMap::new(),
        }
    }

    /// The executor liveness literal.
    pub fn xi(&self) -> Lit {
        self.xi
    }

    pub fn set_theory(&mut self, theory: TheoryId) {
        self.theory = Some(theory);
    }

    /// Create the adaptation record for a newly discovered atom: a
    /// fresh watched guard, the guard clause, and the seeded bound on
    /// the atom's time coordinate. The clock that has already run is a
    /// floor no activity can start below.
    pub fn observe(&mut self, slv: &mut dyn Solver, atom: AtomId, now: Rational) {
        if self.records.contains_key(&atom) {
            return;
        }
        let guard = slv.new_var();
        if let Some(theory) = self.theory {
            slv.bind(guard, theory);
        }
        let sigma_xi = Lit::positive(guard);
        let sigma = slv.atom_sigma(atom);
        let posted = slv.new_clause(vec![!sigma, !self.xi, sigma_xi]);
        debug_assert!(posted, "guard clause rejected at root");

        let mut record = AtomAdaptation::new(sigma_xi);
        let coord = if slv.is_impulse_atom(atom) {
            Some(AT)
        } else if slv.is_interval_atom(atom) {
            Some(START)
        } else {
            None
        };
        if let Some(name) = coord {
            if let Some(term) = slv.atom_param(atom, name) {
                record.bounds.insert(
                    term,
                    BoundSnapshot::Arith {
                        lb: InfRational::from(now),
                        ub: InfRational::positive_infinity(),
                    },
                );
            }
        }
        self.guards.insert(guard, atom);
        self.records.insert(atom, record);
        tracing::debug!(atom = %atom, guard = %sigma_xi, "adaptation record created");
    }

    pub fn record(&self, atom: AtomId) -> Option<&AtomAdaptation> {
        self.records.get(&atom)
    }

    pub fn record_mut(&mut self, atom: AtomId) -> Option<&mut AtomAdaptation> {
        self.records.get_mut(&atom)
    }

    /// The atom guarded by the given variable, if any.
    pub fn atom_for_guard(&self, guard: Var) -> Option<AtomId> {
        self.guards.get(&guard).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AtomId, &AtomAdaptation)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
