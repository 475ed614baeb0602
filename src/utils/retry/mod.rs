//! Retry utilities with exponential backoff, cap, and jitter.
//!
//! Wraps external-call dispatch (`executor::process_t`/`process_c`) so a
//! transient failure from the callee doesn't immediately fail the vertex.

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay for first retry (before jitter).
    pub base_delay: Duration,
    /// Maximum delay cap (before jitter).
    pub max_delay: Duration,
    /// Maximum number of retry attempts (0 = no retries, just initial attempt).
    pub max_retries: u32,
    /// Jitter factor: delay is multiplied by random value in [1-jitter, 1+jitter].
    /// Set to 0.0 for no jitter.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(2),
            max_retries: 10,
            jitter: 0.25, // ±25% jitter
        }
    }
}

impl RetryConfig {
    /// Retry policy for external-call dispatch from the executor.
    ///
    /// Sensible defaults for a flaky downstream HTTP service:
    /// - Base delay: 10ms
    /// - Max delay: 2s
    /// - Max retries: 10
    /// - Jitter: ±25%
    pub fn for_external_calls() -> Self {
        Self::default()
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: delay = base * 2^attempt, capped at max_delay.
    /// Jitter is applied using a simple hash-based approach to avoid thundering herd.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential_ms = base_ms.saturating_mul(1u64 << attempt.min(20));

        let capped_ms = exponential_ms.min(self.max_delay.as_millis() as u64);

        let jittered_ms = if self.jitter > 0.0 {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0) as u64;
            let hash = now.wrapping_mul(31).wrapping_add(attempt as u64 * 17);
            let jitter_pct = ((hash % 1000) as f64 / 1000.0) * 2.0 - 1.0; // -1.0 to 1.0
            let jitter_factor = 1.0 + (jitter_pct * self.jitter);
            (capped_ms as f64 * jitter_factor) as u64
        } else {
            capped_ms
        };

        Duration::from_millis(jittered_ms)
    }

    /// Check if another retry attempt should be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Build a `backon` exponential backoff iterator matching this config,
    /// for use with `backon::Retryable::retry`.
    pub fn backoff(&self) -> backon::ExponentialBuilder {
        backon::ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
            .with_jitter()
    }
}
