//! Send one email over SMTP, retrying while the server reports itself
//! temporarily unavailable.
//!
//! [`Herald`] is read from a RON file (see [`config`]) and drives the whole
//! send through [`Herald::run`].

pub mod config;
pub mod controller;

pub use config::{ConfigError, Herald};
pub use controller::{Sent, message_id};
