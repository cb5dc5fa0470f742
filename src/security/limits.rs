//! Bounded concurrency.
//!
//! # Responsibilities
//! - Cap the number of requests a route admits at the same time
//! - Make excess requests wait for a free slot instead of failing
//!
//! # Design Decisions
//! - Backed by a Tokio semaphore; waiting is async, not a thread block
//! - Slots are owned permits released on drop, so every exit path
//!   (including cancellation) gives the slot back
//! - No FIFO guarantee beyond what the semaphore provides

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::security::Rejection;

/// A counting gate with a fixed number of slots.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Largest capacity a gate supports.
    pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

    /// Capacities above [`Self::MAX_CAPACITY`] are clamped.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(Self::MAX_CAPACITY);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot is held until the permit is dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, Rejection> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Rejection::GateClosed)
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
