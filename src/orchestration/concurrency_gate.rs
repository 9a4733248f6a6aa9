//! # Concurrency Gate
//!
//! Counting permit pool that caps simultaneous provider calls for one batch.
//! Permits are RAII guards: dropping a [`GatePermit`] returns it to the pool
//! on every exit path, panics included.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("concurrency gate is closed")]
pub struct GateClosed;

/// Permit held while talking to the provider
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// A gate with `capacity` permits; zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit. Never times out on its own.
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Wait for a permit unless `cancel` fires first.
    ///
    /// Returns `None` when cancelled or when the gate was closed.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<GatePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.acquire() => permit.ok(),
        }
    }

    /// Refuse further acquisitions; waiters are woken with [`GateClosed`]
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available_permits()
    }
}
