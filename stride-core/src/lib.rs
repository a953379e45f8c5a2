//! Stride Core - Reward Accrual and Abuse-Resistance Domain
//!
//! Pure domain logic for converting untrusted activity reports into
//! virtual currency (paisa) and for guarding the authentication path
//! that protects the ledger. Nothing in this crate performs I/O; the
//! store and engine crates build on it.
//!
//! # Components
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | [`PhaseTable`] | 9-tier rate schedule and tier advancement |
//! | [`quote_accrual`] | Steps to coins with the tier multiplier, always floored |
//! | [`ActivityValidator`] | Rejects physically implausible samples |
//! | [`RateLimitRecord`] | Attempt window, block and permanent block state machine |
//! | [`MilestoneLadder`] / [`streak_bonus`] | Derived bonus rules |
//! | [`otp`] | Code hashing; plaintext codes are never stored |
//!
//! # Economic Invariants
//!
//! - Tiers never decrease; thresholds and rates strictly increase.
//! - `total_balance <= total_earned` for every wallet.
//! - The balance is always reconstructable from the transaction log.

pub mod activity;
pub mod clock;
pub mod constants;
pub mod error;
pub mod otp;
pub mod phase;
pub mod rate_limit;
pub mod rewards;
pub mod types;

pub use activity::{
    ActivitySample, ActivityValidator, GpsGrade, RejectionReason, Suspicion, ValidationReport,
    ValidatorLimits, Verdict,
};
pub use clock::{Clock, LocalCalendar, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use phase::{multiplier_for_tier, PhaseTable, PhaseTier, TierAdvance, MAX_TIER};
pub use rate_limit::{
    BlockReason, OperationType, RateLimitDecision, RateLimitPolicies, RateLimitPolicy,
    RateLimitRecord,
};
pub use rewards::{
    quote_accrual, streak_bonus, streak_description, AccrualQuote, Milestone, MilestoneLadder,
};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
