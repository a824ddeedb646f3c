//! HTTP handlers.

pub mod accounts;
pub mod completions;
pub mod health;
pub mod webhooks;
