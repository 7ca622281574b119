use crate::config::RetrySettings;
use log::{error, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based), doubling from
    /// `initial_delay` and capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Runs `operation` until it succeeds or `config.max_retries` retries have
/// failed, sleeping with exponential backoff in between. The last error is
/// returned unchanged.
pub async fn retry_operation<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    warn!(target: "ledger", "{} recovered after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= config.max_retries {
            error!(target: "ledger", "{} gave up after {} retries: {}", operation_name, attempt, err);
            return Err(err);
        }
        attempt += 1;
        let delay = config.delay_for(attempt);
        warn!(
            target: "ledger",
            "{} failed ({}/{}): {}, next try in {:?}",
            operation_name, attempt, config.max_retries, err, delay
        );
        sleep(delay).await;
    }
}
