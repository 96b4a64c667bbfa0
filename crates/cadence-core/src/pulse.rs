//! The pulse index: which atoms start or end at which future time.
//!
//! The index is derived from the solver's current solution and is
//! discarded and rebuilt on every solution or inconsistency signal.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use cadence_solver::{AtomId, InfRational, Lbool, PredId, Rational, Solver, AT, END, START};

/// Atoms excluded from start events during a rebuild (those already
/// executing must never re-enter the start map).
pub type ExecutingSet = BTreeSet<AtomId>;

/// Sorted maps of start/end events plus the set of pulses carrying at
/// least one event.
#[derive(Debug, Default)]
pub struct PulseIndex {
    starting: BTreeMap<InfRational, BTreeSet<AtomId>>,
    ending: BTreeMap<InfRational, BTreeSet<AtomId>>,
    pulses: BTreeSet<InfRational>,
}

impl PulseIndex {
    pub fn clear(&mut self) {
        self.starting.clear();
        self.ending.clear();
        self.pulses.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.len()
    }

    pub fn insert_start(&mut self, t: InfRational, atom: AtomId) {
        self.starting.entry(t).or_default().insert(atom);
        self.pulses.insert(t);
    }

    pub fn insert_end(&mut self, t: InfRational, atom: AtomId) {
        self.ending.entry(t).or_default().insert(atom);
        self.pulses.insert(t);
    }

    /// The earliest pulse not later than `now`, with its start and end
    /// events in atom order.
    pub fn due(&self, now: &InfRational) -> Option<(InfRational, Vec<AtomId>, Vec<AtomId>)> {
        let t = *self.pulses.iter().next().filter(|t| *t <= now)?;
        let starting = self
            .starting
            .get(&t)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let ending = self
            .ending
            .get(&t)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        Some((t, starting, ending))
    }

    pub fn remove(&mut self, t: &InfRational) {
        self.starting.remove(t);
        self.ending.remove(t);
        self.pulses.remove(t);
    }

    /// The pulse set matches the union of the non-empty start and end
    /// map keys.
    pub fn is_consistent(&self) -> bool {
        let keys: BTreeSet<_> = self
            .starting
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(t, _)| *t)
            .chain(
                self.ending
                    .iter()
                    .filter(|(_, s)| !s.is_empty())
                    .map(|(t, _)| *t),
            )
            .collect();
        keys == self.pulses
    }

    /// Rescan the active atoms of the relevant predicates and rebuild
    /// the index. Atoms entirely in the past are dropped; an interval
    /// that started before `now` (or is already executing) keeps only
    /// its end event.
    pub fn rebuild(
        &mut self,
        slv: &dyn Solver,
        relevant: &HashSet<PredId>,
        now: &Rational,
        executing: &ExecutingSet,
    ) {
        tracing::debug!(predicates = relevant.len(), "rebuilding pulse index");
        self.clear();
        let now = InfRational::from(*now);
        for pred in relevant {
            for atom in slv.instances(*pred) {
                if slv.value(slv.atom_sigma(atom)) != Lbool::True {
                    continue;
                }
                if slv.is_impulse_atom(atom) {
                    let Some(at) = slv.atom_param(atom, AT) else {
                        continue;
                    };
                    let at = slv.arith_value(at);
                    if at < now {
                        continue;
                    }
                    if !executing.contains(&atom) {
                        self.insert_start(at, atom);
                    }
                    self.insert_end(at, atom);
                } else if slv.is_interval_atom(atom) {
                    let (Some(start), Some(end)) =
                        (slv.atom_param(atom, START), slv.atom_param(atom, END))
                    else {
                        continue;
                    };
                    let end = slv.arith_value(end);
                    if end < now {
                        continue;
                    }
                    let start = slv.arith_value(start);
                    if start >= now && !executing.contains(&atom) {
                        self.insert_start(start, atom);
                    }
                    self.insert_end(end, atom);
                }
            }
        }
    }
}

/// The transitive set, over the solver's type hierarchy, of predicates
/// whose atoms are punctual or interval.
pub fn relevant_predicates(slv: &dyn Solver) -> HashSet<PredId> {
    let mut relevant: HashSet<PredId> = slv
        .predicates()
        .into_iter()
        .filter(|p| slv.is_impulse(*p) || slv.is_interval(*p))
        .collect();
    let mut queue: Vec<_> = slv.types();
    while let Some(tp) = queue.pop() {
        queue.extend(slv.subtypes(tp));
        for pred in slv.type_predicates(tp) {
            if slv.is_impulse(pred) || slv.is_interval(pred) {
                relevant.insert(pred);
            }
        }
    }
    relevant
}
