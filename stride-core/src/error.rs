//! Stride Core Error Registry
//!
//! Error code format: STRIDE-{module}-{sequence}
//! - STRIDE-PHASE: Phase table errors
//! - STRIDE-ACT: Activity sample errors
//! - STRIDE-LEDGER: Accrual arithmetic errors
//! - STRIDE-AUTH: Identity and OTP input errors
//! - STRIDE-INPUT: Unrecognised string tags

use thiserror::Error;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // ============================================================
    // Phase Errors (STRIDE-PHASE-*)
    // ============================================================
    /// [STRIDE-PHASE-001] Tier outside the table
    #[error("[STRIDE-PHASE-001] Tier {tier} is outside the phase table (1..={max})")]
    UnknownTier { tier: u8, max: u8 },

    /// [STRIDE-PHASE-002] Table is not strictly increasing
    #[error("[STRIDE-PHASE-002] Phase table invalid at tier {tier}: {reason}")]
    InvalidPhaseTable { tier: u8, reason: String },

    // ============================================================
    // Activity Errors (STRIDE-ACT-*)
    // ============================================================
    /// [STRIDE-ACT-001] Malformed activity sample
    #[error("[STRIDE-ACT-001] Malformed activity sample: {reason}")]
    MalformedSample { reason: String },

    // ============================================================
    // Ledger Errors (STRIDE-LEDGER-*)
    // ============================================================
    /// [STRIDE-LEDGER-001] Arithmetic overflow
    #[error("[STRIDE-LEDGER-001] Arithmetic overflow computing {what}")]
    Overflow { what: String },

    /// [STRIDE-LEDGER-002] Non-positive amount
    #[error("[STRIDE-LEDGER-002] Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: i64 },

    // ============================================================
    // Auth Errors (STRIDE-AUTH-*)
    // ============================================================
    /// [STRIDE-AUTH-001] Mobile number does not normalise
    #[error("[STRIDE-AUTH-001] Invalid mobile number: {reason}")]
    InvalidMobileNumber { reason: String },

    /// [STRIDE-AUTH-002] OTP code has the wrong shape
    #[error("[STRIDE-AUTH-002] OTP code must be {expected_len} digits")]
    MalformedCode { expected_len: usize },

    // ============================================================
    // Input Errors (STRIDE-INPUT-*)
    // ============================================================
    /// [STRIDE-INPUT-001] Tag names no known variant
    #[error("[STRIDE-INPUT-001] Unknown {kind}: {value}")]
    UnknownTag { kind: &'static str, value: String },
}

impl CoreError {
    /// Get the registry code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTier { .. } => "STRIDE-PHASE-001",
            Self::InvalidPhaseTable { .. } => "STRIDE-PHASE-002",
            Self::MalformedSample { .. } => "STRIDE-ACT-001",
            Self::Overflow { .. } => "STRIDE-LEDGER-001",
            Self::NonPositiveAmount { .. } => "STRIDE-LEDGER-002",
            Self::InvalidMobileNumber { .. } => "STRIDE-AUTH-001",
            Self::MalformedCode { .. } => "STRIDE-AUTH-002",
            Self::UnknownTag { .. } => "STRIDE-INPUT-001",
        }
    }

    pub fn overflow(what: impl Into<String>) -> Self {
        Self::Overflow { what: what.into() }
    }

    pub fn unknown_tag(kind: &'static str, value: &str) -> Self {
        Self::UnknownTag {
            kind,
            value: value.to_string(),
        }
    }

    pub fn malformed_sample(reason: impl Into<String>) -> Self {
        Self::MalformedSample {
            reason: reason.into(),
        }
    }
}
