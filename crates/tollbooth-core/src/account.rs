//! Account types for tollbooth.
//!
//! An account links an identity-provider user to its Stripe billing handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A gateway account for a user.
///
/// The billing identifiers are grouped in [`BillingProfile`] so that either
/// all three are present or none are; a partially provisioned account is not
/// representable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The user ID (from the identity provider).
    pub user_id: UserId,

    /// Stripe billing handles, present once provisioning has completed.
    pub billing: Option<BillingProfile>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, unprovisioned account.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            billing: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether billing provisioning has completed.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.billing.is_some()
    }

    /// The subscription item usage is reported against, if provisioned.
    #[must_use]
    pub fn subscription_item_id(&self) -> Option<&str> {
        self.billing.as_ref().map(|b| b.subscription_item_id.as_str())
    }
}

/// The Stripe handles bound to an account.
///
/// Set atomically by the provisioning flow; last writer wins under concurrent
/// retries, which is acceptable because provisioning runs at most once per
/// user in normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingProfile {
    /// Stripe customer ID (`cus_...`).
    pub customer_id: String,

    /// Stripe subscription ID (`sub_...`).
    pub subscription_id: String,

    /// Stripe subscription item ID (`si_...`) that metered usage is reported to.
    pub subscription_item_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        "u_test_account".parse().unwrap()
    }

    #[test]
    fn new_account_is_unprovisioned() {
        let account = Account::new(user());
        assert!(!account.is_provisioned());
        assert!(account.subscription_item_id().is_none());
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn provisioned_account_exposes_subscription_item() {
        let mut account = Account::new(user());
        account.billing = Some(BillingProfile {
            customer_id: "cus_123".into(),
            subscription_id: "sub_456".into(),
            subscription_item_id: "si_789".into(),
        });

        assert!(account.is_provisioned());
        assert_eq!(account.subscription_item_id(), Some("si_789"));
    }

    #[test]
    fn billing_profile_serde_roundtrip() {
        let mut account = Account::new(user());
        account.billing = Some(BillingProfile {
            customer_id: "cus_123".into(),
            subscription_id: "sub_456".into(),
            subscription_item_id: "si_789".into(),
        });

        let json = serde_json::to_string(&account).unwrap();
        let parsed: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.billing, account.billing);
    }
}
