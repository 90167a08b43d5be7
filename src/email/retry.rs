use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times a whole operation is attempted and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum Failure<E> {
    Transient(E),
    Permanent(E),
}

/// Runs `attempt` until it succeeds, fails permanently or runs out of
/// attempts. The last error is returned.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
    E: Display,
{
    let mut tries = 1;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(Failure::Permanent(e)) => return Err(e),
            Err(Failure::Transient(e)) if tries >= policy.attempts => return Err(e),
            Err(Failure::Transient(e)) => {
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}.",
                    tries,
                    policy.attempts,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                tries += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_fixed_delay() {
        // arrange
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = tokio::time::Instant::now();

        // act
        let result: Result<u32, String> = retry(RetryPolicy::default(), || async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < 3 {
                Err(Failure::Transient(format!("busy {call}")))
            } else {
                Ok(call)
            }
        })
        .await;

        // assert
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_last_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), String> = retry(RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Failure::Transient("connection reset".to_string()))
        })
        .await;

        assert_eq!(result, Err("connection reset".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), String> = retry(RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Failure::Permanent("mailbox unavailable".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
