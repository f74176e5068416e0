//! Admission control for upstream calls.
//!
//! # Responsibilities
//! - Bound the number of concurrent upstream WMS calls
//! - Queue excess callers and admit them in arrival order
//! - Guarantee that a granted slot is released exactly once
//!
//! # Design Decisions
//! - Constructor-injected instance, not a process-wide global, so tests can
//!   run several controllers with small capacities side by side
//! - Backed by `tokio::sync::Semaphore`, which wakes waiters in FIFO order
//! - The ticket releases its slot on drop, covering success, retry, and
//!   panic paths with one mechanism

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded-concurrency gate in front of all upstream calls.
#[derive(Debug)]
pub struct AdmissionController {
    /// Semaphore holding the upstream call slots.
    slots: Arc<Semaphore>,
    /// Configured capacity.
    capacity: usize,
}

impl AdmissionController {
    /// Create a controller with `capacity` upstream call slots.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "admission capacity must be > 0");
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Claim one upstream call slot, suspending in FIFO order when all
    /// slots are taken.
    pub async fn admit(&self) -> AdmissionTicket {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore closed unexpectedly");
        AdmissionTicket { _permit: permit }
    }

    /// Configured maximum number of concurrent upstream calls.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tickets currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }
}

/// One caller's claim on upstream capacity.
///
/// Dropping the ticket returns the slot and wakes the next queued caller,
/// even when the holding task unwinds.
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
}
