// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tollgate_core::UserId;

/// Exclusive hold on one account; dropping it unlocks the account.
pub type AccountGuard = OwnedMutexGuard<()>;

/// Registry of one async mutex per account.
///
/// Different accounts never contend. Entries live as long as the registry,
/// which matches accounts never being deleted.
#[derive(Default)]
pub struct AccountLocks {
    inner: DashMap<UserId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the account's lock. Released when the guard drops.
    pub async fn acquire(&self, user_id: &UserId) -> AccountGuard {
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = self
            .inner
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Number of accounts that have been locked at least once.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire(&UserId::from("a")).await;

        let l2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = l2.acquire(&UserId::from("a")).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire(&UserId::from("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&UserId::from("b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
