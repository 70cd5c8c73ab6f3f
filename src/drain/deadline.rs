//! Deadline handle shared by every step of a drain workflow
//!
//! One `Deadline` is created per request and passed by reference through
//! every collaborator call and every pause, so all sub-operations observe
//! the same wall-clock ceiling. Built on the tokio clock, which lets tests
//! drive it with a paused runtime.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Cap for deadlines whose timeout overflows the clock (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The deadline passed before the guarded operation completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline elapsed")]
pub struct Elapsed;

/// Absolute point in time after which a workflow must give up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    ///
    /// A timeout too large for the clock is capped at `FAR_FUTURE`.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { at }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Run `fut` until it completes or the deadline passes
    ///
    /// On expiry the future is dropped, which cancels any request it was
    /// driving.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        if self.is_expired() {
            return Err(Elapsed);
        }
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| Elapsed)
    }

    /// Pause for `period`, waking early with `Elapsed` if the deadline falls
    /// inside the pause
    pub async fn sleep(&self, period: Duration) -> Result<(), Elapsed> {
        let wake = Instant::now() + period;
        if wake >= self.at {
            tokio::time::sleep_until(self.at).await;
            return Err(Elapsed);
        }
        tokio::time::sleep_until(wake).await;
        Ok(())
    }
}
