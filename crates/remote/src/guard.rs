use crate::error::{RemoteError, Result};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Per-call deadline plus a short "unavailable" window.
///
/// After a transport failure every call fails fast with
/// [`RemoteError::Unavailable`] until the window closes, so a dead service
/// stalls the caller once per window instead of once per field.
pub struct ServiceGuard {
    name: &'static str,
    deadline: Duration,
    backoff: Duration,
    open_until: Mutex<Option<Instant>>,
}

impl ServiceGuard {
    pub fn new(name: &'static str, deadline: Duration, backoff: Duration) -> Self {
        Self {
            name,
            deadline,
            backoff,
            open_until: Mutex::new(None),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Remaining time of the unavailability window, if it is open.
    pub fn retry_in(&self) -> Option<Duration> {
        let guard = self.open_until.lock().ok()?;
        let until = (*guard)?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    pub fn is_available(&self) -> bool {
        self.retry_in().is_none()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.open_until.lock() {
            *guard = None;
        }
    }

    fn trip(&self) {
        if self.backoff.is_zero() {
            return;
        }
        if let Ok(mut guard) = self.open_until.lock() {
            *guard = Some(Instant::now() + self.backoff);
        }
        log::warn!(
            "{} marked unavailable for {:?}",
            self.name,
            self.backoff
        );
    }

    /// Runs `call` under the deadline. Transport failures and timeouts open
    /// the window; a success closes it.
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(retry_in) = self.retry_in() {
            return Err(RemoteError::Unavailable { retry_in });
        }

        let outcome = match tokio::time::timeout(self.deadline, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemoteError::Timeout(self.deadline)),
        };

        match &outcome {
            Ok(_) => self.reset(),
            Err(err) if err.is_transport_failure() => {
                log::warn!("{} call failed: {err}", self.name);
                self.trip();
            }
            Err(err) => log::debug!("{} call rejected: {err}", self.name),
        }
        outcome
    }
}
