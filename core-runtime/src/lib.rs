//! Core Runtime
//!
//! Shared infrastructure for the core crates: the broadcast event bus,
//! explicit host-supplied configuration, and logging setup.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, OAuthSettings, UploadSettings};
pub use error::RuntimeError;
pub use events::{AuthEvent, CoreEvent, EventBus, EventEnvelope, UploadEvent};
pub use logging::{init_logging, LoggingConfig};
