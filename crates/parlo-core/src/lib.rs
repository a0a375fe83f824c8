//! Shared core for Parlo: signaling protocol, session state machine, errors.
//!
//! This crate holds everything the client needs that does no I/O, so the
//! negotiation logic stays testable without sockets or audio devices.

#![forbid(unsafe_code)]

pub mod error;
pub mod session;
pub mod signal;

pub use error::{Error, Result};
pub use session::{Session, SessionAction, SessionEvent, SessionState};
pub use signal::SignalMessage;

/// Initialize tracing with sensible defaults.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
