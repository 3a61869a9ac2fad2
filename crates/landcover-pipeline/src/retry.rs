//! Bounded exponential backoff for retryable backend errors.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use landcover_common::LandcoverResult;

/// Retry settings for catalog and compute calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first call
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_delay_ms: u64,
    /// Maximum retry delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or has been retried `max_retries` times.
    ///
    /// The last error is returned unchanged so callers can still classify it.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> LandcoverResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LandcoverResult<T>>,
    {
        let mut retry_count = 0;
        let mut delay = self.initial_delay();

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    retry_count += 1;

                    if retry_count > self.max_retries {
                        warn!(
                            operation,
                            error = %e,
                            retries = self.max_retries,
                            "Giving up after retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation,
                        error = %e,
                        retry = retry_count,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Call failed, retrying"
                    );

                    tokio::time::sleep(delay).await;

                    // Exponential backoff
                    delay = std::cmp::min(delay * 2, self.max_delay());
                }
            }
        }
    }
}
