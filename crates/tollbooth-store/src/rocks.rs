//! RocksDB storage backend.
//!
//! Accounts and ledger records are stored as CBOR values in separate column
//! families. Ledger reads walk the user's key range in reverse, which yields
//! newest-first order because the keys embed time-ordered ULIDs.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options,
};

use tollbooth_core::{Account, BillingProfile, UsageRecord, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed implementation of [`Store`].
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Iterate a user's ledger newest-first, invoking `visit` per record
    /// until it returns `false`.
    fn scan_usage_rev(
        &self,
        user_id: &UserId,
        mut visit: impl FnMut(UsageRecord) -> bool,
    ) -> Result<()> {
        let cf = self.cf(cf::USAGE)?;
        let prefix = keys::usage_prefix(user_id);
        let upper = keys::usage_upper_bound(user_id);

        // Seeking at the exclusive upper bound in reverse lands on the last
        // key strictly below it.
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if !visit(Self::deserialize(&value)?) {
                break;
            }
        }

        Ok(())
    }
}

impl Store for RocksStore {
    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.user_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn set_billing_profile(&self, user_id: &UserId, profile: BillingProfile) -> Result<Account> {
        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;

        // The whole profile is one value inside one account write, so a
        // reader can never observe a partial identifier set.
        account.billing = Some(profile);
        account.updated_at = chrono::Utc::now();

        self.put_account(&account)?;
        Ok(account)
    }

    fn append_usage(&self, user_id: &UserId, tokens: u64, model: &str) -> Result<UsageRecord> {
        let record = UsageRecord::new(user_id.clone(), tokens, model);

        let cf = self.cf(cf::USAGE)?;
        let key = keys::usage_key(user_id, &record.id);
        let value = Self::serialize(&record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(record)
    }

    fn list_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>> {
        let mut records = Vec::new();
        if limit == 0 {
            return Ok(records);
        }

        self.scan_usage_rev(user_id, |record| {
            records.push(record);
            records.len() < limit
        })?;

        Ok(records)
    }

    fn total_tokens(&self, user_id: &UserId) -> Result<u64> {
        let mut total = 0u64;
        self.scan_usage_rev(user_id, |record| {
            total += record.tokens;
            true
        })?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let store = RocksStore::open(dir.path()).expect("open store");
        (store, dir)
    }

    fn user(raw: &str) -> UserId {
        raw.parse().unwrap()
    }

    #[test]
    fn account_roundtrip() {
        let (store, _dir) = open_store();
        let uid = user("u_rocks1");

        store.put_account(&Account::new(uid.clone())).unwrap();
        let fetched = store.get_account(&uid).unwrap().unwrap();
        assert_eq!(fetched.user_id, uid);
    }

    #[test]
    fn billing_profile_write_is_all_or_nothing() {
        let (store, _dir) = open_store();
        let uid = user("u_rocks2");
        store.put_account(&Account::new(uid.clone())).unwrap();

        store
            .set_billing_profile(
                &uid,
                BillingProfile {
                    customer_id: "cus_1".into(),
                    subscription_id: "sub_1".into(),
                    subscription_item_id: "si_1".into(),
                },
            )
            .unwrap();

        let billing = store.get_account(&uid).unwrap().unwrap().billing.unwrap();
        assert_eq!(billing.subscription_item_id, "si_1");
    }

    #[test]
    fn ledger_reads_newest_first() {
        let (store, _dir) = open_store();
        let uid = user("u_rocks3");

        for tokens in [1, 2, 3] {
            store.append_usage(&uid, tokens, "gpt-4o-mini").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let records = store.list_usage(&uid, 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tokens, 3);
        assert_eq!(records[1].tokens, 2);

        assert_eq!(store.total_tokens(&uid).unwrap(), 6);
    }

    #[test]
    fn ledger_isolation_between_users() {
        let (store, _dir) = open_store();
        let a = user("u_rocks4");
        let b = user("u_rocks4b");

        store.append_usage(&a, 5, "m").unwrap();
        store.append_usage(&b, 7, "m").unwrap();

        assert_eq!(store.total_tokens(&a).unwrap(), 5);
        assert_eq!(store.total_tokens(&b).unwrap(), 7);
    }
}
