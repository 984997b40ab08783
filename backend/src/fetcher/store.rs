//! Latest-value store for published snapshots.
//!
//! Publication is an `Arc` swap behind a short write lock; readers clone the
//! `Arc` out and never observe a partially built snapshot. Versions are
//! process-local, strictly increasing per kind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use common::{AllPriceEntry, AllRateEntry, AuthDataSnapshot, Version, Versioned};

pub struct Published<T> {
    slot: RwLock<Option<Arc<Versioned<T>>>>,
    version: AtomicU64,
}

impl<T> Default for Published<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }
}

impl<T> Published<T> {
    /// Claim the next version number. Claimed before building the snapshot
    /// so concurrent publishers can never reuse a version.
    pub fn next_version(&self) -> Version {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn publish(&self, snapshot: Arc<Versioned<T>>) {
        *self.slot.write() = Some(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<Versioned<T>>> {
        self.slot.read().clone()
    }

    /// Seed from a persisted snapshot at startup; later publishes continue
    /// above the restored version.
    pub fn restore(&self, snapshot: Versioned<T>) {
        self.version.fetch_max(snapshot.version, Ordering::SeqCst);
        *self.slot.write() = Some(Arc::new(snapshot));
    }
}

#[derive(Default)]
pub struct SnapshotStore {
    pub price: Published<AllPriceEntry>,
    pub rate: Published<AllRateEntry>,
    pub auth: Published<AuthDataSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}
