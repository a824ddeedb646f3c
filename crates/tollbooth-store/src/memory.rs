//! In-memory storage backend.
//!
//! The default backend. It keeps the same key encoding and ordering
//! behavior as the RocksDB backend so the two are interchangeable, and it
//! backs every test suite in the workspace.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tollbooth_core::{Account, BillingProfile, UsageRecord, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::Store;

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<Vec<u8>, Account>,
    // Ledger keyed by `user || 0x00 || ulid`, so range scans mirror RocksDB.
    usage: BTreeMap<Vec<u8>, UsageRecord>,
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn put_account(&self, account: &Account) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .accounts
            .insert(keys::account_key(&account.user_id), account.clone());
        Ok(())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let inner = self.read()?;
        Ok(inner.accounts.get(&keys::account_key(user_id)).cloned())
    }

    fn set_billing_profile(&self, user_id: &UserId, profile: BillingProfile) -> Result<Account> {
        let mut inner = self.write()?;
        let account = inner
            .accounts
            .get_mut(&keys::account_key(user_id))
            .ok_or(StoreError::NotFound)?;

        account.billing = Some(profile);
        account.updated_at = chrono::Utc::now();
        Ok(account.clone())
    }

    fn append_usage(&self, user_id: &UserId, tokens: u64, model: &str) -> Result<UsageRecord> {
        let record = UsageRecord::new(user_id.clone(), tokens, model);
        let key = keys::usage_key(user_id, &record.id);

        let mut inner = self.write()?;
        inner.usage.insert(key, record.clone());
        Ok(record)
    }

    fn list_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>> {
        let prefix = keys::usage_prefix(user_id);
        let upper = keys::usage_upper_bound(user_id);

        let inner = self.read()?;
        Ok(inner
            .usage
            .range(prefix..upper)
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn total_tokens(&self, user_id: &UserId) -> Result<u64> {
        let prefix = keys::usage_prefix(user_id);
        let upper = keys::usage_upper_bound(user_id);

        let inner = self.read()?;
        Ok(inner
            .usage
            .range(prefix..upper)
            .map(|(_, record)| record.tokens)
            .sum())
    }
}
