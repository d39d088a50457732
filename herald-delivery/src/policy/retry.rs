//! Retry policy for delivery.
//!
//! Each delivery draws a single random seed from the configured range. The
//! wait after the `n`th failed attempt is `seed << n` milliseconds, capped at
//! `max_delay_ms`, then jittered by up to ±`jitter_factor` (and capped again).

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry configuration for a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts, the first one included.
    ///
    /// Default: 5 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Lower bound (inclusive) of the backoff seed, in milliseconds.
    ///
    /// Default: 10
    #[serde(default = "defaults::seed_min_ms")]
    pub seed_min_ms: u64,

    /// Upper bound (exclusive) of the backoff seed, in milliseconds.
    ///
    /// Default: 150
    #[serde(default = "defaults::seed_max_ms")]
    pub seed_max_ms: u64,

    /// Maximum wait between two attempts, in milliseconds.
    ///
    /// Default: 30000 (30 seconds)
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor for randomizing each wait, within ±`jitter_factor`.
    ///
    /// Values outside `0.0..=1.0` disable jitter.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            seed_min_ms: defaults::seed_min_ms(),
            seed_max_ms: defaults::seed_max_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy allowing `max_attempts` attempts, with default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Check if another attempt may be made after `attempt_count` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Get the number of remaining attempts.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }

    /// Draw the seed for one delivery and return its backoff schedule.
    ///
    /// An empty seed range yields `seed_min_ms`.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        let seed_ms = if self.seed_min_ms < self.seed_max_ms {
            rand::rng().random_range(self.seed_min_ms..self.seed_max_ms)
        } else {
            self.seed_min_ms
        };

        self.backoff_with_seed(seed_ms)
    }

    /// The backoff schedule for a known seed.
    #[must_use]
    pub fn backoff_with_seed(&self, seed_ms: u64) -> Backoff {
        let jitter_factor = if (0.0..=1.0).contains(&self.jitter_factor) {
            self.jitter_factor
        } else {
            0.0
        };

        Backoff {
            seed_ms,
            max_delay_ms: self.max_delay_ms,
            jitter_factor,
        }
    }
}

/// The waits between the attempts of one delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    seed_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
}

impl Backoff {
    /// The seed drawn for this delivery.
    #[must_use]
    pub const fn seed_ms(&self) -> u64 {
        self.seed_ms
    }

    /// The un-jittered wait after attempt `attempt` (1-indexed) failed.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        // 2^64 would overflow, use the cap directly
        let delay = if attempt >= 64 {
            self.max_delay_ms
        } else {
            self.seed_ms
                .saturating_mul(1u64 << attempt)
                .min(self.max_delay_ms)
        };

        Duration::from_millis(delay)
    }

    /// The wait after attempt `attempt` (1-indexed) failed, with jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);

        if self.jitter_factor <= 0.0 {
            return delay;
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered = {
            let delay_ms = delay.as_millis() as f64;
            let jitter_range = delay_ms * self.jitter_factor;
            let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
            (delay_ms + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn seed_min_ms() -> u64 {
        10
    }

    pub const fn seed_max_ms() -> u64 {
        150
    }

    pub const fn max_delay_ms() -> u64 {
        30_000 // 30 seconds
    }

    pub const fn jitter_factor() -> f64 {
        0.1 // ±10%
    }
}
