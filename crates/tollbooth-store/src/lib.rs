//! Storage layer for tollbooth.
//!
//! This crate persists accounts and the append-only usage ledger. Two
//! backends implement the [`Store`] trait:
//!
//! - [`MemoryStore`] - the default backend, also used by the test suites
//! - `RocksStore` - persistent backend behind the `rocksdb-backend` feature
//!
//! Both share the key encoding in [`keys`]: usage ledger keys embed a
//! time-ordered ULID, so a bounded reverse scan of a user's prefix yields
//! records newest first.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use tollbooth_core::{Account, BillingProfile, UsageRecord, UserId};

/// The storage trait defining account and ledger operations.
///
/// Implementations must tolerate concurrent appends to the same user's
/// ledger without coordination; no cross-record atomicity is promised to
/// readers.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Atomically set all three Stripe identifiers on an account.
    ///
    /// The profile is written as one value, so the account can never be
    /// observed with a partial set of billing identifiers. Returns the
    /// updated account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account does not exist.
    fn set_billing_profile(&self, user_id: &UserId, profile: BillingProfile) -> Result<Account>;

    // =========================================================================
    // Usage Ledger Operations
    // =========================================================================

    /// Append one immutable usage record with a fresh ID and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; callers must treat a failed
    /// append as fatal to the surrounding request, since nothing may be
    /// billed for tokens that were not durably recorded.
    fn append_usage(&self, user_id: &UserId, tokens: u64, model: &str) -> Result<UsageRecord>;

    /// List a user's usage records, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>>;

    /// Sum all recorded tokens for a user.
    ///
    /// This is a full scan of the user's ledger, O(n) in record count, and
    /// belongs to reconciliation and audit paths, not the request hot path.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn total_tokens(&self, user_id: &UserId) -> Result<u64>;
}
