//! Engine Error Registry
//!
//! Error code format: STRIDE-{module}-{sequence}
//! - STRIDE-ACT: Activity validation
//! - STRIDE-GUARD: Rate limiting and blocks
//! - STRIDE-LEDGER: Ledger persistence
//! - STRIDE-AUTH: OTP and identity
//! - STRIDE-REF: Referrals
//! - STRIDE-SYS: Configuration, transport, backend

use chrono::{DateTime, Utc};
use stride_core::{CoreError, OperationType, RejectionReason};
use stride_store::StoreError;
use thiserror::Error;

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// [STRIDE-ACT-100] Sample dropped by the activity validator
    #[error("[STRIDE-ACT-100] Activity rejected: {reason}")]
    Validation { reason: RejectionReason },

    /// [STRIDE-GUARD-001] Temporarily blocked
    #[error("[STRIDE-GUARD-001] Too many {operation} attempts, retry after {retry_after}")]
    RateLimited {
        operation: OperationType,
        retry_after: DateTime<Utc>,
    },

    /// [STRIDE-GUARD-002] Blocked until support intervenes
    #[error("[STRIDE-GUARD-002] {operation} permanently blocked, contact support")]
    PermanentlyBlocked { operation: OperationType },

    /// [STRIDE-LEDGER-100] Lost the optimistic race too many times
    #[error("[STRIDE-LEDGER-100] Concurrent update conflict after {attempts} attempts")]
    PersistenceConflict { attempts: u32 },

    /// [STRIDE-LEDGER-101] Redemption larger than the balance
    #[error("[STRIDE-LEDGER-101] Insufficient balance: have {balance}, requested {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    /// [STRIDE-AUTH-100] Challenge expired, consumed or superseded
    #[error("[STRIDE-AUTH-100] OTP expired or already used, request a new code")]
    ChallengeExpiredOrConsumed,

    /// [STRIDE-AUTH-101] Code does not match
    #[error("[STRIDE-AUTH-101] Incorrect OTP code")]
    InvalidCode,

    /// [STRIDE-AUTH-102] No account for the mobile number
    #[error("[STRIDE-AUTH-102] No account registered for {mobile}")]
    AccountNotFound { mobile: String },

    /// [STRIDE-REF-001] Referral cannot be registered
    #[error("[STRIDE-REF-001] Invalid referral: {reason}")]
    InvalidReferral { reason: String },

    /// [STRIDE-SYS-001] Messaging transport failed
    #[error("[STRIDE-SYS-001] OTP delivery failed: {0}")]
    Transport(String),

    /// [STRIDE-SYS-002] Invalid configuration
    #[error("[STRIDE-SYS-002] Invalid configuration: {0}")]
    Config(String),

    /// Domain error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// [STRIDE-SYS-003] Backend error
    #[error("[STRIDE-SYS-003] Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Registry code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "STRIDE-ACT-100",
            Self::RateLimited { .. } => "STRIDE-GUARD-001",
            Self::PermanentlyBlocked { .. } => "STRIDE-GUARD-002",
            Self::PersistenceConflict { .. } => "STRIDE-LEDGER-100",
            Self::InsufficientBalance { .. } => "STRIDE-LEDGER-101",
            Self::ChallengeExpiredOrConsumed => "STRIDE-AUTH-100",
            Self::InvalidCode => "STRIDE-AUTH-101",
            Self::AccountNotFound { .. } => "STRIDE-AUTH-102",
            Self::InvalidReferral { .. } => "STRIDE-REF-001",
            Self::Transport(_) => "STRIDE-SYS-001",
            Self::Config(_) => "STRIDE-SYS-002",
            Self::Core(e) => e.code(),
            Self::Store(_) => "STRIDE-SYS-003",
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::PersistenceConflict { .. } | Self::Transport(_) => {
                true
            }
            Self::Store(e) => matches!(
                e,
                StoreError::Database(_) | StoreError::VersionConflict { .. }
            ),
            _ => false,
        }
    }

    /// Retry hint for rate-limited callers
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
