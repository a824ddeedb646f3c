//! Core types for tollbooth.
//!
//! This crate provides the foundational types used throughout the tollbooth
//! gateway:
//!
//! - **Identifiers**: `UserId`, `UsageRecordId`
//! - **Accounts**: `Account`, `BillingProfile`
//! - **Usage**: `UsageRecord`
//! - **Units**: `units_for`, `UNIT_SIZE`
//!
//! # Billing Unit
//!
//! **1 unit = 100,000 LLM tokens, rounded up per request.**
//!
//! - A completion that consumed 45,000 tokens bills 1 unit
//! - A completion that consumed 100,001 tokens bills 2 units
//! - A completion that consumed 0 tokens bills nothing at all
//!
//! `units_for` in [`units`] is the single source of truth for this exchange
//! rate; nothing else in the workspace re-derives it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod ids;
pub mod units;
pub mod usage;

pub use account::{Account, BillingProfile};
pub use ids::{IdError, UsageRecordId, UserId};
pub use units::{units_for, UNIT_SIZE};
pub use usage::UsageRecord;
