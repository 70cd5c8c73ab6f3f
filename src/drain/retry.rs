use crate::drain::deadline::{Deadline, Elapsed};
use crate::drain::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Pause between attempts of a failed control plane call
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Call `call` until it succeeds, pausing `RETRY_BACKOFF` after each
/// transport error
///
/// Each attempt and each pause runs under `deadline`; the only way out
/// besides success is `Elapsed`.
pub async fn retry_until_deadline<T, F, Fut>(
    deadline: &Deadline,
    operation: &'static str,
    mut call: F,
) -> Result<T, Elapsed>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match deadline.run(call()).await? {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(operation, attempt, error = %e, "Control plane call failed, retrying");
                deadline.sleep(RETRY_BACKOFF).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let deadline = Deadline::after(Duration::from_secs(5));
        let start = Instant::now();

        let result = retry_until_deadline(&deadline, "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ApiError::Elb("throttled".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two failed attempts, two backoffs
        assert!(start.elapsed() >= RETRY_BACKOFF * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_deadline() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let deadline = Deadline::after(Duration::from_millis(350));
        let start = Instant::now();

        let result: Result<(), Elapsed> = retry_until_deadline(&deadline, "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Elb("unreachable".to_string()))
        })
        .await;

        assert_eq!(result, Err(Elapsed));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert!(start.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_makes_no_call() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let deadline = Deadline::after(Duration::ZERO);

        let result: Result<(), Elapsed> = retry_until_deadline(&deadline, "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result, Err(Elapsed));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
