//! Usage record types for tollbooth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{UsageRecordId, UserId};

/// One completed LLM invocation, as recorded in the usage ledger.
///
/// Records are immutable once written: the ledger is the audit trail that
/// billing reports are derived from, never the other way around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique, time-ordered record ID.
    pub id: UsageRecordId,

    /// The user who consumed the tokens.
    pub user_id: UserId,

    /// Provider-reported total token consumption for the call.
    pub tokens: u64,

    /// Model identifier reported by the provider (e.g. "gpt-4o-mini").
    pub model: String,

    /// When the record was written.
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Create a record with a fresh ID and the current timestamp.
    #[must_use]
    pub fn new(user_id: UserId, tokens: u64, model: impl Into<String>) -> Self {
        Self {
            id: UsageRecordId::generate(),
            user_id,
            tokens,
            model: model.into(),
            timestamp: Utc::now(),
        }
    }
}
