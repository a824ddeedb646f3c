//! Token-to-unit conversion.
//!
//! The exchange rate lives here and nowhere else. Handlers, the pipeline,
//! and tests all call [`units_for`] rather than re-deriving the rate.

/// Tokens per billable unit.
pub const UNIT_SIZE: u64 = 100_000;

/// Convert a token count into billable units, rounding up per request.
///
/// Pure and total: `units_for(0) == 0`, and any positive count bills at
/// least one unit. Rounding is applied to each request independently; no
/// remainder carries over between requests.
#[must_use]
pub const fn units_for(tokens: u64) -> u64 {
    tokens.div_ceil(UNIT_SIZE)
}
