//! Wire DTOs
//!
//! RPC-shaped envelopes for clients: every call answers
//! `{ success, data?, error? }`, and errors always carry a stable code
//! plus, when blocked, a concrete retry time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stride_core::UserId;

use crate::error::{EngineError, EngineResult};
use crate::ledger::AccrualOutcome;
use crate::otp::VerifiedIdentity;

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Registry code, e.g. STRIDE-GUARD-001
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            retry_after: err.retry_after(),
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl<T> OperationResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(err: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
        }
    }
}

impl<T> From<EngineResult<T>> for OperationResponse<T> {
    fn from(result: EngineResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}

/// `accrueSteps` answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualResponse {
    pub coins_awarded: i64,
    pub multiplier: Decimal,
    pub current_tier: u8,
    pub total_balance: i64,
}

impl From<&AccrualOutcome> for AccrualResponse {
    fn from(outcome: &AccrualOutcome) -> Self {
        Self {
            coins_awarded: outcome.coins_awarded,
            multiplier: outcome.multiplier,
            current_tier: outcome.tier_after,
            total_balance: outcome.wallet.total_balance,
        }
    }
}

/// `verifyOtp` answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub user_id: UserId,
}

impl From<&VerifiedIdentity> for VerifyOtpResponse {
    fn from(identity: &VerifiedIdentity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
        }
    }
}
