//! Stride Engine - Reward Operations Layer
//!
//! Coordinates the domain rules in `stride-core` with a `stride-store`
//! backend and exposes the operations clients call.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 StrideEngine                  │
//! │   ┌──────────┐  ┌──────────┐  ┌───────────┐   │
//! │   │AbuseGuard│─▶│OtpService│  │BonusEngine│   │
//! │   └──────────┘  └──────────┘  └─────┬─────┘   │
//! │        │         ┌──────────────┐   │         │
//! │        └────────▶│ RewardLedger │◀──┤         │
//! │                  └──────────────┘   │         │
//! │                         ▲  ┌────────┴───────┐ │
//! │                         └──│ ReferralEngine │ │
//! │                            └────────────────┘ │
//! └───────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!            stride-store (StrideStore)
//! ```
//!
//! # Modules
//!
//! - [`ledger`] - Step accrual, bonus credits, redemption, reconciliation
//! - [`bonus`] - Streak, milestone and engagement bonuses
//! - [`referral`] - Two-sided referral unlock
//! - [`guard`] - Rate limiting and blocks
//! - [`otp`] - One-time code issue and verification
//! - [`service`] - The [`StrideEngine`] facade
//! - [`config`] / [`telemetry`] / [`retry`] - Ambient settings
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stride_engine::{EngineConfig, StrideEngine};
//! use stride_store::MemoryStore;
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let engine = StrideEngine::new(EngineConfig::from_env(), store).unwrap();
//!     let user = engine.register_account("+91 98765 43210").await.unwrap();
//!     let outcome = engine.accrue_steps(&user, 1_000, "health_connect").await.unwrap();
//!     assert_eq!(outcome.coins_awarded, 40);
//! }
//! ```

pub mod bonus;
pub mod config;
pub mod dto;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod otp;
pub mod referral;
pub mod retry;
pub mod service;
pub mod telemetry;

pub use bonus::{BonusEngine, EngagementAward, MilestoneAward, StreakAward};
pub use config::{EngineConfig, LedgerConfig, OtpConfig, ReferralConfig, ValidatorConfig};
pub use dto::{AccrualResponse, ErrorResponse, OperationResponse, VerifyOtpResponse};
pub use error::{EngineError, EngineResult};
pub use guard::AbuseGuard;
pub use ledger::{AccrualOutcome, ActivityOutcome, BonusCredit, ReconciliationReport, RewardLedger};
pub use otp::{
    LogTransport, OtpIssued, OtpService, OtpTransport, RecordingTransport, VerifiedIdentity,
};
pub use referral::{referral_bonus_description, ReferralEngine, ReferralUnlock};
pub use retry::{RetryPolicy, RetryStrategy};
pub use service::{ActivitySubmission, StrideEngine, StrideEngineBuilder};
pub use telemetry::{init_logging, LogConfig, LogFormat, LogLevel};
