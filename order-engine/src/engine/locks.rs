//! Per-order serialization.
//!
//! Mutations of one order run one at a time under that order's lock and are
//! persisted with a version check. Different orders never share a lock.

use crate::error::{OmsError, Result};
use log::{debug, warn};
use oms::{Order, OrderId, OrderRepository};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of one mutex per order id.
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
    prune_threshold: usize,
}

impl OrderLocks {
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            prune_threshold,
        }
    }

    /// Runs `f` while holding the lock of `order_id`.
    pub fn with_lock<R>(&self, order_id: OrderId, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(order_id);
        // The guarded value is a unit marker, a poisoned lock carries no broken state.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, order_id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.len() >= self.prune_threshold {
            let before = locks.len();
            // Only the registry holds an idle lock.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            debug!("Pruned {} idle order locks", before - locks.len());
        }
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Versioned read-modify-write of a single order.
pub struct VersionedWriter {
    orders: Arc<dyn OrderRepository>,
    locks: OrderLocks,
    max_attempts: u32,
}

impl VersionedWriter {
    pub fn new(orders: Arc<dyn OrderRepository>, locks: OrderLocks, max_attempts: u32) -> Self {
        Self {
            orders,
            locks,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Loads the current order and hands it to `attempt`, which mutates and
    /// persists it with `expected_version = order.version()`.
    ///
    /// A version conflict reloads and tries again; any other error is
    /// returned unchanged. The order lock is held for the whole call.
    pub fn run<T>(&self, order_id: OrderId, mut attempt: impl FnMut(Order) -> Result<T>) -> Result<T> {
        self.locks.with_lock(order_id, || {
            for n in 1..=self.max_attempts {
                let current = self
                    .orders
                    .get(order_id)?
                    .ok_or_else(|| OmsError::order_not_found(order_id))?;
                match attempt(current) {
                    Err(e) if e.is_version_conflict() => {
                        warn!(
                            "Version conflict on order {} (attempt {}/{}): {}",
                            order_id, n, self.max_attempts, e
                        );
                    }
                    other => return other,
                }
            }
            Err(OmsError::ConcurrentModification {
                order_id,
                attempts: self.max_attempts,
            })
        })
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }
}
