//! Single-shot age deadline for the batch being accumulated.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

// Roughly 30 years, the same horizon tokio uses for unbounded sleeps.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// One-shot alarm owned by the control loop
///
/// Firing is observed by awaiting [`DeadlineTimer::fired`] from the loop itself,
/// so nothing else ever runs in response to the alarm.
#[derive(Debug, Default)]
pub(crate) struct DeadlineTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl DeadlineTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule a firing `after` from now, replacing any pending one
    pub(crate) fn arm(&mut self, after: Duration) {
        let now = Instant::now();
        let at = now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE);
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(at),
            None => self.deadline = Some(Box::pin(sleep_until(at))),
        }
    }

    /// Cancel the pending firing, if any
    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Instant of the pending firing
    #[cfg(test)]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|sleep| sleep.deadline())
    }

    /// Resolve when the armed deadline passes, disarming the timer
    ///
    /// Never resolves while disarmed. Cancel safe.
    pub(crate) async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => pending::<()>().await,
        }
        self.deadline = None;
    }
}
