//! Per-origin connection limits.
//!
//! hyper-util's pool only bounds idle connections, so the in-flight cap and
//! the pending queue from [`ConnectionPoolSettings`] are enforced here.
//!
//! ```text
//! acquire()
//!     → free slot?              → Permit
//!     → pending queue full?     → PoolExhausted
//!     → wait ≤ pending timeout  → Permit or PoolExhausted
//! ```
//!
//! A permit covers one exchange until the response head arrives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ConnectionPoolSettings;
use crate::error::{TransportError, TransportErrorKind};

#[derive(Debug)]
pub struct ConnectionLimiter {
    slots: Arc<Semaphore>,
    max_connections: usize,
    pending: AtomicUsize,
    max_pending: usize,
    pending_timeout: Duration,
}

impl ConnectionLimiter {
    pub fn new(settings: &ConnectionPoolSettings) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(settings.max_connections_per_host)),
            max_connections: settings.max_connections_per_host,
            pending: AtomicUsize::new(0),
            max_pending: settings.max_pending_connections_per_host,
            pending_timeout: settings.pending_connection_timeout(),
        }
    }

    /// Exchanges currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Requests currently waiting for a slot.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Wait for a connection slot for `origin_id`.
    pub async fn acquire(&self, origin_id: &str) -> Result<OwnedSemaphorePermit, TransportError> {
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return Ok(permit);
        }

        let _waiting = self.try_enqueue().ok_or_else(|| {
            TransportError::new(
                origin_id,
                TransportErrorKind::PoolExhausted,
                format!("{} requests already waiting for a connection", self.max_pending),
            )
        })?;

        match tokio::time::timeout(self.pending_timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(TransportError::new(
                origin_id,
                TransportErrorKind::PoolExhausted,
                "connection pool closed",
            )),
            Err(_) => Err(TransportError::new(
                origin_id,
                TransportErrorKind::PoolExhausted,
                format!(
                    "no connection available within {}ms",
                    self.pending_timeout.as_millis()
                ),
            )),
        }
    }

    fn try_enqueue(&self) -> Option<PendingGuard<'_>> {
        let mut prev = self.pending.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_pending {
                return None;
            }
            match self
                .pending
                .compare_exchange_weak(prev, prev + 1, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(PendingGuard { pending: &self.pending })
    }
}

/// Leaves the pending queue on drop.
struct PendingGuard<'a> {
    pending: &'a AtomicUsize,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }
}
