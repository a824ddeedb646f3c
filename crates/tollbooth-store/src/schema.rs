//! Column families for the RocksDB backend.

/// Column family names.
pub mod cf {
    /// Primary account records, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Usage ledger, keyed by `user_id || 0x00 || record_id` (ULID).
    pub const USAGE: &str = "usage";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::ACCOUNTS, cf::USAGE]
}
