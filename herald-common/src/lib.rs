pub mod config;
pub mod logging;

pub use tracing;

/// Signals broadcast to long-running work, such as a delivery waiting out
/// its backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
