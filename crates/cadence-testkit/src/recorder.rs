//! A recording observer.
//!
//! `Recorder` captures the observer callback sequence as plain strings
//! and can be programmed to defer an activity the first time it shows
//! up in a `starting`/`ending` notification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cadence_core::{DeferralSink, ExecutorListener, ExecutorListenerRef, ExecutorState};
use cadence_solver::{AtomId, Rational};

#[derive(Default)]
struct RecorderState {
    events: Vec<String>,
    defer_start: HashMap<AtomId, Rational>,
    defer_end: HashMap<AtomId, Rational>,
}

/// Test handle over a shared recording observer.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registrable observer sharing this recorder's state.
    pub fn listener(&self) -> ExecutorListenerRef {
        Arc::new(Mutex::new(RecorderListener {
            state: self.state.clone(),
        }))
    }

    /// Defer the atom's start by `delay` plan units the next time it
    /// appears in a `starting` notification.
    pub fn defer_start_once(&self, atom: AtomId, delay: Rational) {
        if let Ok(mut state) = self.state.lock() {
            state.defer_start.insert(atom, delay);
        }
    }

    /// Defer the atom's end the next time it appears in an `ending`
    /// notification.
    pub fn defer_end_once(&self, atom: AtomId, delay: Rational) {
        if let Ok(mut state) = self.state.lock() {
            state.defer_end.insert(atom, delay);
        }
    }

    /// Every recorded event, in callback order.
    pub fn events(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.events.clone())
            .unwrap_or_default()
    }

    /// The recorded events whose label starts with `prefix`.
    pub fn events_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .map(|state| {
                state
                    .events
                    .iter()
                    .filter(|e| e.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct RecorderListener {
    state: Arc<Mutex<RecorderState>>,
}

fn fmt_atoms(atoms: &[AtomId]) -> String {
    atoms
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl ExecutorListener for RecorderListener {
    fn executor_state_changed(&mut self, state: ExecutorState) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push(format!("state {state}"));
        }
    }

    fn tick(&mut self, time: &Rational) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push(format!("tick {time}"));
        }
    }

    fn starting(&mut self, deferrals: &mut DeferralSink, atoms: &[AtomId]) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.events.push(format!("starting {}", fmt_atoms(atoms)));
        let due: HashMap<_, _> = atoms
            .iter()
            .filter_map(|a| state.defer_start.remove(a).map(|d| (*a, d)))
            .collect();
        if !due.is_empty() {
            deferrals.dont_start_yet(due);
        }
    }

    fn start(&mut self, atoms: &[AtomId]) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push(format!("start {}", fmt_atoms(atoms)));
        }
    }

    fn ending(&mut self, deferrals: &mut DeferralSink, atoms: &[AtomId]) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.events.push(format!("ending {}", fmt_atoms(atoms)));
        let due: HashMap<_, _> = atoms
            .iter()
            .filter_map(|a| state.defer_end.remove(a).map(|d| (*a, d)))
            .collect();
        if !due.is_empty() {
            deferrals.dont_end_yet(due);
        }
    }

    fn end(&mut self, atoms: &[AtomId]) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push(format!("end {}", fmt_atoms(atoms)));
        }
    }

    fn finished(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push("finished".to_string());
        }
    }
}
