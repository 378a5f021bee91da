//! Async retry utilities with exponential backoff

use std::time::Duration;

/// Default maximum attempts for calls against merchant stores
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay in milliseconds for exponential backoff
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;

/// Retry an async operation with exponential backoff.
///
/// `is_transient` decides whether an error is worth retrying; permanent
/// errors (auth failures, 4xx responses) return immediately.
pub async fn retry_with_backoff<F, Fut, T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts || !is_transient(&e) {
                    return Err(e);
                }
                let delay = Duration::from_millis(base_delay_ms * 2_u64.pow(attempts - 1));
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_success_on_first_try() {
        let result = retry_with_backoff(3, 1, |_| true, || async { Ok::<_, &str>(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let attempts = RefCell::new(0);
        let result = retry_with_backoff(3, 1, |_| true, || {
            *attempts.borrow_mut() += 1;
            let n = *attempts.borrow();
            async move {
                if n < 2 { Err("transient error") } else { Ok(n) }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_failure_after_max_retries() {
        let attempts = RefCell::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 1, |_| true, || {
            *attempts.borrow_mut() += 1;
            async { Err("persistent error") }
        })
        .await;
        assert_eq!(result, Err("persistent error"));
        assert_eq!(*attempts.borrow(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let attempts = RefCell::new(0);
        let result: Result<(), _> = retry_with_backoff(3, 1, |e: &&str| *e != "fatal", || {
            *attempts.borrow_mut() += 1;
            async { Err("fatal") }
        })
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(*attempts.borrow(), 1);
    }
}
