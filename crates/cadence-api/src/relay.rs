//! MessageRelay - realtime notification fan-out.
//!
//! MessageRelay turns observer callbacks into [`ExecutorMessage`]
//! values and pushes them to live subscribers over a broadcast channel.
//! Publishing with no subscribers is not an error; the executor's own
//! state remains the source of truth.

use tokio::sync::broadcast;
use uuid::Uuid;

use cadence_core::{DeferralSink, Executor, ExecutorListener, ExecutorState};
use cadence_solver::{AtomId, Rational, Solver};

use crate::messages::ExecutorMessage;

/// Observer publishing wire messages on a broadcast channel.
pub struct MessageRelay {
    solver_id: Uuid,
    tx: broadcast::Sender<ExecutorMessage>,
}

impl MessageRelay {
    /// Create a relay with its own channel of the given capacity.
    pub fn new(solver_id: Uuid, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        MessageRelay { solver_id, tx }
    }

    /// Create a relay publishing on an existing channel, so several
    /// executors can share one stream.
    pub fn with_sender(solver_id: Uuid, tx: broadcast::Sender<ExecutorMessage>) -> Self {
        MessageRelay { solver_id, tx }
    }

    pub fn solver_id(&self) -> Uuid {
        self.solver_id
    }

    /// Subscribe to the relayed messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorMessage> {
        self.tx.subscribe()
    }

    fn publish(&self, message: ExecutorMessage) {
        // No receiver is fine; subscribers come and go.
        let _ = self.tx.send(message);
    }
}

impl ExecutorListener for MessageRelay {
    fn executor_state_changed(&mut self, state: ExecutorState) {
        self.publish(ExecutorMessage::ExecutorStateChanged {
            solver_id: self.solver_id,
            state,
        });
    }

    fn tick(&mut self, time: &Rational) {
        self.publish(ExecutorMessage::Tick {
            solver_id: self.solver_id,
            time: *time,
        });
    }

    fn starting(&mut self, _deferrals: &mut DeferralSink, atoms: &[AtomId]) {
        self.publish(ExecutorMessage::Starting {
            solver_id: self.solver_id,
            starting: atoms.to_vec(),
        });
    }

    fn start(&mut self, atoms: &[AtomId]) {
        self.publish(ExecutorMessage::Start {
            solver_id: self.solver_id,
            start: atoms.to_vec(),
        });
    }

    fn ending(&mut self, _deferrals: &mut DeferralSink, atoms: &[AtomId]) {
        self.publish(ExecutorMessage::Ending {
            solver_id: self.solver_id,
            ending: atoms.to_vec(),
        });
    }

    fn end(&mut self, atoms: &[AtomId]) {
        self.publish(ExecutorMessage::End {
            solver_id: self.solver_id,
            end: atoms.to_vec(),
        });
    }
}

/// Snapshot an executor's public state as a `solver_state` message.
pub fn solver_state_message<S: Solver>(exec: &Executor<S>) -> ExecutorMessage {
    ExecutorMessage::SolverState {
        solver_id: exec.id(),
        time: exec.current_time(),
        timelines: None,
        executing_atoms: Some(exec.executing()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_delivers_to_subscriber() {
        let mut relay = MessageRelay::new(Uuid::nil(), 16);
        let mut rx = relay.subscribe();

        relay.executor_state_changed(ExecutorState::Idle);
        relay.tick(&Rational::from(4));

        assert_eq!(
            rx.try_recv().unwrap(),
            ExecutorMessage::ExecutorStateChanged {
                solver_id: Uuid::nil(),
                state: ExecutorState::Idle,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ExecutorMessage::Tick {
                solver_id: Uuid::nil(),
                time: Rational::from(4),
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let mut relay = MessageRelay::new(Uuid::nil(), 4);
        relay.start(&[AtomId(1)]);
    }

    #[test]
    fn test_shared_channel_tags_by_solver() {
        let (tx, mut rx) = broadcast::channel(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut relay_a = MessageRelay::with_sender(a, tx.clone());
        let mut relay_b = MessageRelay::with_sender(b, tx);

        relay_a.end(&[AtomId(1)]);
        relay_b.end(&[AtomId(2)]);

        assert_eq!(rx.try_recv().unwrap().solver_id(), a);
        assert_eq!(rx.try_recv().unwrap().solver_id(), b);
    }
}
