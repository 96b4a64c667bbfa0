//! The observer contract.
//!
//! Observers register on the executor by handle and receive lifecycle,
//! tick, and activity notifications. During `starting`/`ending` they
//! may defer activities through the [`DeferralSink`] passed to the
//! callback; observers never hold a reference back into the executor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cadence_solver::{AtomId, Rational};

use crate::state::ExecutorState;

pub type ExecutorListenerRef = Arc<Mutex<dyn ExecutorListener>>;

/// Handle of a registered observer, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Observer callbacks. All methods default to no-ops so observers
/// implement only what they care about.
///
/// Callbacks are invoked with the executor's lock held: an observer
/// must not call back into executor methods on the same instance.
pub trait ExecutorListener: Send {
    /// The executor changed lifecycle state.
    fn executor_state_changed(&mut self, _state: ExecutorState) {}

    /// A tick completed; `time` is the new current time in plan units.
    fn tick(&mut self, _time: &Rational) {}

    /// The given atoms are about to start. The observer may defer any
    /// of them through the sink.
    fn starting(&mut self, _deferrals: &mut DeferralSink, _atoms: &[AtomId]) {}

    /// The given atoms started; their parameters are now frozen.
    fn start(&mut self, _atoms: &[AtomId]) {}

    /// The given atoms are about to end. The observer may defer any of
    /// them through the sink.
    fn ending(&mut self, _deferrals: &mut DeferralSink, _atoms: &[AtomId]) {}

    /// The given atoms ended.
    fn end(&mut self, _atoms: &[AtomId]) {}

    /// The plan ran to its horizon.
    fn finished(&mut self) {}
}

/// Collects the deferrals requested during a `starting`/`ending`
/// callback; drained by the tick engine right after the callbacks
/// return.
#[derive(Debug, Default)]
pub struct DeferralSink {
    start: HashMap<AtomId, Rational>,
    end: HashMap<AtomId, Rational>,
}

impl DeferralSink {
    /// Ask the executor not to start the given atoms yet, each with an
    /// extra delay in plan units.
    pub fn dont_start_yet(&mut self, atoms: HashMap<AtomId, Rational>) {
        self.start.extend(atoms);
    }

    /// Ask the executor not to end the given atoms yet.
    pub fn dont_end_yet(&mut self, atoms: HashMap<AtomId, Rational>) {
        self.end.extend(atoms);
    }

    pub(crate) fn into_parts(
        self,
    ) -> (HashMap<AtomId, Rational>, HashMap<AtomId, Rational>) {
        (self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_deferral_is_idempotent() {
        let mut sink = DeferralSink::default();
        let atoms: HashMap<_, _> = [(AtomId(1), Rational::from(2))].into();
        sink.dont_start_yet(atoms.clone());
        sink.dont_start_yet(atoms);
        let (start, end) = sink.into_parts();
        assert_eq!(start.len(), 1);
        assert_eq!(start.get(&AtomId(1)), Some(&Rational::from(2)));
        assert!(end.is_empty());
    }
}
