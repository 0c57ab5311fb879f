// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Retry and timeout helpers for collaborator calls.
///
/// The repository listing is the only call allowed to fail a run, so it is
/// retried with exponential backoff. Every other network call is bounded by
/// a timeout and degraded by its resolver when the budget expires.
use std::{future::Future, time::Duration};

use masterror::AppError;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::NetworkPolicy;

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone,)]
pub struct RetryConfig
{
    /// Maximum number of attempts (default: 3).
    pub max_attempts:     u32,
    /// Initial delay between retries in milliseconds (default: 1000).
    pub initial_delay_ms: u64,
    /// Multiplier for exponential backoff (default: 2.0).
    pub backoff_factor:   f64,
}

impl Default for RetryConfig
{
    fn default() -> Self
    {
        Self {
            max_attempts: 3, initial_delay_ms: 1000, backoff_factor: 2.0,
        }
    }
}

impl From<&NetworkPolicy,> for RetryConfig
{
    fn from(policy: &NetworkPolicy,) -> Self
    {
        Self {
            max_attempts:     policy.retry_attempts.max(1,),
            initial_delay_ms: policy.retry_delay_ms,
            backoff_factor:   2.0,
        }
    }
}

/// Executes an async operation with exponential backoff retry logic.
///
/// # Errors
///
/// Returns the last error encountered if all retry attempts fail.
pub async fn retry_with_backoff<F, Fut, T,>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, AppError,>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError,>,>,
{
    let mut attempt = 1;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        match f().await {
            Ok(result,) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result,);
            }
            Err(error,) => {
                if attempt >= config.max_attempts {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name, config.max_attempts, error
                    );
                    return Err(error,);
                }

                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {}ms...",
                    operation_name, attempt, config.max_attempts, error, delay_ms
                );

                sleep(Duration::from_millis(delay_ms,),).await;
                delay_ms = (delay_ms as f64 * config.backoff_factor) as u64;
                attempt += 1;
            }
        }
    }
}

/// Bounds a collaborator call by `limit`, reporting expiry as a service
/// error so callers can treat it like any other transient failure.
///
/// # Errors
///
/// Returns the operation's own error, or [`AppError`] when the deadline
/// passes first.
pub async fn within<Fut, T,>(limit: Duration, operation_name: &str, f: Fut,) -> Result<T, AppError,>
where
    Fut: Future<Output = Result<T, AppError,>,>,
{
    match timeout(limit, f,).await {
        Ok(result,) => result,
        Err(_,) => Err(AppError::service(format!(
            "{operation_name} timed out after {}ms",
            limit.as_millis()
        ),),),
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn retry_config_follows_network_policy()
    {
        let policy = NetworkPolicy {
            timeout_secs: 5, retry_attempts: 0, retry_delay_ms: 250,
        };
        let config = RetryConfig::from(&policy,);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.initial_delay_ms, 250);
    }

    #[tokio::test]
    async fn retry_succeeds_after_failures()
    {
        let config =
            RetryConfig {
                max_attempts: 3, initial_delay_ms: 10, backoff_factor: 2.0,
            };
        let counter = Arc::new(Mutex::new(0,),);
        let counter_clone = counter.clone();

        let result = retry_with_backoff(&config, "listing", move || {
            let counter = counter_clone.clone();
            async move {
                let mut count = counter.lock().unwrap();
                *count += 1;
                if *count < 3 { Err(AppError::service("temporary failure",),) } else { Ok(42,) }
            }
        },)
        .await
        .expect("should succeed after retries",);

        assert_eq!(result, 42);
        assert_eq!(*counter.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_max_attempts()
    {
        let config =
            RetryConfig {
                max_attempts: 2, initial_delay_ms: 10, backoff_factor: 2.0,
            };
        let counter = Arc::new(Mutex::new(0,),);
        let counter_clone = counter.clone();

        let result = retry_with_backoff(&config, "listing", move || {
            let counter = counter_clone.clone();
            async move {
                let mut count = counter.lock().unwrap();
                *count += 1;
                Err::<i32, _,>(AppError::service("persistent failure",),)
            }
        },)
        .await;

        assert!(result.is_err(), "should fail after max attempts",);
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn within_reports_expired_deadline()
    {
        let result = within(Duration::from_millis(10,), "slow lookup", async {
            sleep(Duration::from_millis(200,),).await;
            Ok::<_, AppError,>(1,)
        },)
        .await;

        let error = result.expect_err("expected timeout",);
        let message = format!("{error:?}",);
        assert!(message.contains("slow lookup timed out"));
    }

    #[tokio::test]
    async fn within_passes_through_fast_results()
    {
        let value = within(Duration::from_secs(1,), "fast lookup", async { Ok::<_, AppError,>(7,) },)
            .await
            .expect("expected value",);
        assert_eq!(value, 7);
    }
}
