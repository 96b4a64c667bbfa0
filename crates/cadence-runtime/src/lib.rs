//! # Cadence Runtime
//!
//! The pieces around the executor core that a deployment needs: the
//! periodic pacing driver, the multi-executor registry with shared
//! notification fan-out, and configuration loading.

pub mod config;
pub mod registry;
pub mod timer;

pub use config::{load_config, ConfigError, RuntimeConfig};
pub use registry::{ExecutorEntry, ExecutorRegistry};
pub use timer::TickTimer;
