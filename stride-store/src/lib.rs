//! Stride Store - Persistence Boundary
//!
//! Storage traits for the reward engine plus an in-memory backend.
//!
//! Every backend must provide:
//! - per-user atomic commits guarded by an optimistic version
//!   ([`LedgerStore::commit`])
//! - unique constraints on bonus dedup keys and on the referee of a
//!   referral
//! - an atomic evaluate-and-increment for rate-limit attempts
//! - conditional (compare-and-set) consumption of OTP challenges
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use stride_store::{LedgerStore, MemoryStore};
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let snapshot = store.snapshot(&"user:1".into(), day).await.unwrap();
//!     assert_eq!(snapshot.wallet.total_balance, 0);
//! }
//! ```

pub mod auth;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod referral;

pub use auth::{IdentityDirectory, OtpStore, RateLimitStore};
pub use error::{StoreError, StoreResult};
pub use ledger::{CommitReceipt, LedgerCommit, LedgerSnapshot, LedgerStore};
pub use memory::MemoryStore;
pub use referral::ReferralStore;

/// Everything the engine needs from one backend
pub trait StrideStore:
    LedgerStore + RateLimitStore + OtpStore + ReferralStore + IdentityDirectory
{
}

impl<T> StrideStore for T where
    T: LedgerStore + RateLimitStore + OtpStore + ReferralStore + IdentityDirectory
{
}
