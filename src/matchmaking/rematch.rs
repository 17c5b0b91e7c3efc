//! Delayed re-entry into matching after a partner departs
//!
//! Each pending re-match is keyed by connection id and can be cancelled until
//! it fires. A fired task re-validates the participant through the callback it
//! was scheduled with, so a stale task is always harmless.

use crate::error::{MatchError, Result};
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

struct PendingRematch {
    token: u64,
    handle: AbortHandle,
}

pub struct RematchDriver {
    delay: Duration,
    pending: Arc<Mutex<HashMap<ConnectionId, PendingRematch>>>,
    next_token: AtomicU64,
}

impl RematchDriver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` for `connection_id` after the configured delay.
    ///
    /// Replaces any re-match already pending for the same id. With a zero
    /// delay the task runs immediately on the calling thread; any other
    /// delay needs a tokio runtime and fails without one.
    pub fn schedule<F>(&self, connection_id: ConnectionId, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel(&connection_id)?;

        if self.delay.is_zero() {
            task();
            return Ok(());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| MatchError::InternalError {
                message: format!(
                    "Cannot delay re-match for '{}' outside an async runtime",
                    connection_id
                ),
            })?;

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let delay = self.delay;
        let task_connection_id = connection_id.clone();

        // Hold the map lock across spawn so the task cannot look itself up
        // before its handle is stored.
        let mut guard = self
            .pending
            .lock()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire rematch lock".to_string(),
            })?;

        let join_handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let still_scheduled = match pending.lock() {
                Ok(mut pending) => match pending.get(&task_connection_id) {
                    Some(entry) if entry.token == token => {
                        pending.remove(&task_connection_id);
                        true
                    }
                    _ => false,
                },
                Err(_) => false,
            };

            if still_scheduled {
                task();
            } else {
                debug!(
                    "Skipping superseded re-match for '{}'",
                    task_connection_id
                );
            }
        });

        guard.insert(
            connection_id,
            PendingRematch {
                token,
                handle: join_handle.abort_handle(),
            },
        );

        Ok(())
    }

    /// Cancel the pending re-match for `connection_id`. Returns whether one existed.
    pub fn cancel(&self, connection_id: &str) -> Result<bool> {
        let removed = self
            .pending
            .lock()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire rematch lock".to_string(),
            })?
            .remove(connection_id);

        match removed {
            Some(entry) => {
                entry.handle.abort();
                debug!("Cancelled pending re-match for '{}'", connection_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancel every pending re-match
    pub fn cancel_all(&self) -> Result<usize> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire rematch lock".to_string(),
            })?;

        let count = pending.len();
        for (_, entry) in pending.drain() {
            entry.handle.abort();
        }
        Ok(count)
    }

    pub fn is_pending(&self, connection_id: &str) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains_key(connection_id))
            .unwrap_or(false)
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|pending| pending.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_scheduled_task_fires_after_delay() {
        let driver = RematchDriver::new(Duration::from_millis(20));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        driver
            .schedule("a".to_string(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(driver.is_pending("a"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!driver.is_pending("a"));
    }

    #[tokio::test]
    async fn test_cancelled_task_never_fires() {
        let driver = RematchDriver::new(Duration::from_millis(20));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        driver
            .schedule("a".to_string(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(driver.cancel("a").unwrap());
        assert!(!driver.cancel("a").unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(driver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_pending_task() {
        let driver = RematchDriver::new(Duration::from_millis(20));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = fired.clone();
            driver
                .schedule("a".to_string(), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        assert_eq!(driver.pending_count(), 1);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_delay_runs_inline() {
        let driver = RematchDriver::new(Duration::ZERO);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        driver
            .schedule("a".to_string(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(driver.pending_count(), 0);
    }

    #[test]
    fn test_delay_without_runtime_is_rejected() {
        let driver = RematchDriver::new(Duration::from_secs(5));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let result = driver.schedule("a".to_string(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(result.is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!driver.is_pending("a"));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let driver = RematchDriver::new(Duration::from_secs(5));
        driver.schedule("a".to_string(), || {}).unwrap();
        driver.schedule("b".to_string(), || {}).unwrap();

        assert_eq!(driver.cancel_all().unwrap(), 2);
        assert_eq!(driver.pending_count(), 0);
    }
}
