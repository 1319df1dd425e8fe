//! Bounded retry combinator.
//!
//! Both retry loops in the crate (browser fetch attempts and chat-completion
//! calls) go through [`retry_bounded`]: an attempt cap, an exponential delay
//! schedule from the `backoff` crate, and a predicate that separates
//! retryable failures from terminal ones.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Back-to-back attempts with no delay between them.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// `initial_delay`, then doubling, capped at 30s.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_delay.max(self.initial_delay))
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Final result of a retried operation and how many attempts it took.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have been made. `op` receives the 1-based
/// attempt number. Attempts never overlap.
pub async fn retry_bounded<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut op: F,
) -> Retried<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut schedule = policy.schedule();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) => {
                if attempt >= max_attempts {
                    warn!("{}: giving up after {} attempt(s): {}", label, attempt, e);
                    return Retried {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                if !is_retryable(&e) {
                    debug!("{}: terminal error on attempt {}: {}", label, attempt, e);
                    return Retried {
                        result: Err(e),
                        attempts: attempt,
                    };
                }

                let delay = schedule.next_backoff().unwrap_or(policy.max_delay);
                warn!(
                    "🔁 {}: attempt {}/{} failed: {} (next in {:?})",
                    label, attempt, max_attempts, e, delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
