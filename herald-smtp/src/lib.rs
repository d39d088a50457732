//! Outbound SMTP for herald: a small async client and the message composer.

pub mod client;
