//! # Cadence API
//!
//! The wire format for executor notifications and the broadcast relay
//! that publishes them: attach a [`MessageRelay`] to an executor and
//! every observer callback becomes a tagged [`ExecutorMessage`] on the
//! channel.

mod messages;
mod relay;

pub use messages::ExecutorMessage;
pub use relay::{solver_state_message, MessageRelay};
