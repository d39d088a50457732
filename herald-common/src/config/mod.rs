//! Configuration types shared across the herald crates.
//!
//! - [`timeouts`]: per-phase timeouts for the outbound SMTP client

pub mod timeouts;

pub use timeouts::ClientTimeouts;
