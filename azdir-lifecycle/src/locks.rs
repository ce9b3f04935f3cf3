//! Named mutex registry.
//!
//! Serializes mutating operations touching the same parent object, e.g. two
//! members being added to one administrative unit at the same time. Each
//! [`LockKey`] maps to its own mutex, so operations on different keys never
//! wait on each other. Entries are created on first use and never evicted;
//! the key space is bounded by the parents touched in one run.

use crate::context::OperationContext;
use crate::error::{LifecycleError, LifecycleResult};
use azdir_types::LockKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of named locks, shared by every coordinator built from it.
#[derive(Debug, Default)]
pub struct NamedLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl NamedLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, key: &LockKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Blocks until `key` is free and returns a guard holding it.
    pub async fn acquire(&self, key: &LockKey) -> NamedLockGuard {
        let mutex = self.entry(key).await;
        let guard = mutex.lock_owned().await;
        debug!("Acquired lock {}", key);
        NamedLockGuard {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up when the context's
    /// deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LockTimeout`] if the context is already
    /// expired or expires while waiting.
    pub async fn acquire_until(
        &self,
        key: &LockKey,
        ctx: &OperationContext,
    ) -> LifecycleResult<NamedLockGuard> {
        if ctx.is_expired() {
            return Err(LifecycleError::LockTimeout { key: key.clone() });
        }
        ctx.run(self.acquire(key))
            .await
            .ok_or_else(|| LifecycleError::LockTimeout { key: key.clone() })
    }

    /// Number of keys seen so far.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no key has been locked yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

/// Holds a named lock; dropping it releases the lock.
#[derive(Debug)]
pub struct NamedLockGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    /// The key held by this guard.
    #[must_use]
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Releases the lock.
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        debug!("Released lock {}", self.key);
    }
}
