//! Delivery policies.

pub mod retry;

pub use retry::{Backoff, RetryPolicy};
