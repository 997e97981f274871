//! Bounded polling.
//!
//! Health checks block on a prerequisite state before moving to the next
//! step. A failing check is logged and counts as "not yet"; only the deadline
//! ends the wait with an error.

use crate::error::MonitorError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::warn;

/// Pause between evaluations when no interval is given
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll `condition` every [`DEFAULT_POLL_INTERVAL`] until it holds or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, condition: F) -> Result<(), MonitorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    wait_for_with_interval(timeout, DEFAULT_POLL_INTERVAL, condition).await
}

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
///
/// Evaluations never overlap. The condition is evaluated once more at the
/// deadline before giving up.
pub async fn wait_for_with_interval<F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut condition: F,
) -> Result<(), MonitorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => warn!("Condition check failed, retrying: {:#}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(MonitorError::Timeout(timeout));
        }
        sleep(interval.min(deadline - now)).await;
    }
}
