// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-owner mutual exclusion.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared per-owner locks.
///
/// Every read-modify-write of an owner's profile, challenge instances or
/// badge awards runs while holding that owner's lock. Different owners
/// never contend.
#[derive(Clone, Default)]
pub struct OwnerLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner_id`'s records.
    pub async fn acquire(&self, owner_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_owner_serialized() {
        let locks = OwnerLocks::new();
        let guard = locks.acquire("alice").await;

        let contended =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("alice")).await;
        assert!(contended.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("alice")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_owners_independent() {
        let locks = OwnerLocks::new();
        let _alice = locks.acquire("alice").await;

        let bob = tokio::time::timeout(Duration::from_millis(50), locks.acquire("bob")).await;
        assert!(bob.is_ok());
    }
}
