//! Key encoding shared by the storage backends.
//!
//! Account keys are the raw user id bytes. Ledger keys are
//! `user_id || 0x00 || ulid (16 bytes)`; the NUL separator is safe because
//! `UserId` validation rejects NUL, and ULIDs sort chronologically, so a
//! reverse scan of the prefix walks a user's records newest first.

use tollbooth_core::{UsageRecordId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a ledger key for one usage record.
#[must_use]
pub fn usage_key(user_id: &UserId, record_id: &UsageRecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_bytes().len() + 17);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key.extend_from_slice(&record_id.to_bytes());
    key
}

/// Prefix covering all ledger keys for a user.
#[must_use]
pub fn usage_prefix(user_id: &UserId) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.as_bytes().len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(0);
    prefix
}

/// Exclusive upper bound for a user's ledger keys.
///
/// The separator byte is 0x00, so bumping it to 0x01 bounds every possible
/// `usage_key` for the user while excluding other users.
#[must_use]
pub fn usage_upper_bound(user_id: &UserId) -> Vec<u8> {
    let mut bound = Vec::with_capacity(user_id.as_bytes().len() + 1);
    bound.extend_from_slice(user_id.as_bytes());
    bound.push(1);
    bound
}
