//! The multi-executor registry.
//!
//! Owns named solver+executor pairs and fans all their notifications
//! out on one shared broadcast channel, each message tagged with its
//! executor's id.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use cadence_api::{ExecutorMessage, MessageRelay};
use cadence_core::{Executor, ExecutorError, ListenerId};
use cadence_solver::{Rational, Solver};

/// A registered solver+executor pair.
pub struct ExecutorEntry<S> {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub executor: Arc<Executor<S>>,
    relay: ListenerId,
}

impl<S: Solver> ExecutorEntry<S> {
    pub fn id(&self) -> Uuid {
        self.executor.id()
    }
}

pub struct ExecutorRegistry<S> {
    entries: Vec<ExecutorEntry<S>>,
    units_per_tick: Rational,
    tx: broadcast::Sender<ExecutorMessage>,
}

impl<S: Solver> ExecutorRegistry<S> {
    /// Create a registry whose executors advance `units_per_tick` plan
    /// units per tick and share one message channel of the given
    /// capacity.
    pub fn new(units_per_tick: Rational, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ExecutorRegistry {
            entries: Vec::new(),
            units_per_tick,
            tx,
        }
    }

    /// Subscribe to the notifications of every registered executor.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorMessage> {
        self.tx.subscribe()
    }

    /// Attach an executor to the given solver and announce it.
    pub fn create(&mut self, name: impl Into<String>, solver: S) -> &ExecutorEntry<S> {
        let name = name.into();
        let solver = Arc::new(Mutex::new(solver));
        let executor = Arc::new(Executor::with_units(
            solver,
            name.clone(),
            self.units_per_tick,
        ));
        let relay = executor.add_listener(Arc::new(Mutex::new(MessageRelay::with_sender(
            executor.id(),
            self.tx.clone(),
        ))));
        tracing::info!(name = %name, id = %executor.id(), "executor created");
        let _ = self.tx.send(ExecutorMessage::NewSolver {
            solver_id: executor.id(),
            name: name.clone(),
            state: executor.state(),
        });
        self.entries.push(ExecutorEntry {
            name,
            created_at: Utc::now(),
            executor,
            relay,
        });
        let last = self.entries.len() - 1;
        &self.entries[last]
    }

    /// Detach and drop an executor. Returns `false` when the id is
    /// unknown.
    pub fn destroy(&mut self, id: Uuid) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id() == id) else {
            return false;
        };
        let entry = self.entries.remove(pos);
        entry.executor.remove_listener(entry.relay);
        tracing::info!(name = %entry.name, id = %id, "executor destroyed");
        let _ = self
            .tx
            .send(ExecutorMessage::DeletedSolver { solver_id: id });
        true
    }

    pub fn get(&self, id: Uuid) -> Option<&ExecutorEntry<S>> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutorEntry<S>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tick every registered executor, stopping at the first fatal
    /// failure.
    pub fn tick_all(&self) -> Result<(), ExecutorError> {
        for entry in &self.entries {
            entry.executor.tick()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::ExecutorState;
    use cadence_testkit::ScriptedSolver;

    #[test]
    fn test_registry_announces_lifecycle_and_relays_events() {
        let mut registry = ExecutorRegistry::new(Rational::ONE, 64);
        let mut rx = registry.subscribe();

        let mut solver = ScriptedSolver::new();
        solver.set_horizon(1);
        let id = registry.create("alpha", solver).id();
        assert_eq!(registry.len(), 1);

        match rx.try_recv().unwrap() {
            ExecutorMessage::NewSolver {
                solver_id,
                name,
                state,
            } => {
                assert_eq!(solver_id, id);
                assert_eq!(name, "alpha");
                assert_eq!(state, ExecutorState::Reasoning);
            }
            other => panic!("expected new_solver, got {other:?}"),
        }

        registry.get(id).unwrap().executor.init().unwrap();
        match rx.try_recv().unwrap() {
            ExecutorMessage::ExecutorStateChanged { solver_id, state } => {
                assert_eq!(solver_id, id);
                assert_eq!(state, ExecutorState::Idle);
            }
            other => panic!("expected executor_state_changed, got {other:?}"),
        }

        assert!(registry.destroy(id));
        assert!(registry.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            ExecutorMessage::DeletedSolver { solver_id: id }
        );
        assert!(!registry.destroy(id));
    }

    #[test]
    fn test_tick_all_drives_every_executor() {
        let mut registry = ExecutorRegistry::new(Rational::ONE, 16);
        for name in ["alpha", "beta"] {
            let mut solver = ScriptedSolver::new();
            solver.set_horizon(10);
            let entry = registry.create(name, solver);
            entry.executor.init().unwrap();
            entry.executor.start();
        }

        registry.tick_all().unwrap();
        for entry in registry.iter() {
            assert_eq!(entry.executor.current_time(), Rational::ONE);
        }
    }
}
