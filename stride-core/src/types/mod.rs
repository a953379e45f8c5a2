//! Domain Types
//!
//! Naming conventions:
//! - `_id` suffix: identifiers
//! - `total_` prefix: running totals owned by the ledger
//! - amounts are `i64` paisa

mod auth;
mod common;
mod ledger;
mod referral;

pub use auth::*;
pub use common::*;
pub use ledger::*;
pub use referral::*;
