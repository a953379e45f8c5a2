//! Authentication-Side Repositories
//!
//! Rate-limit records, OTP challenges and the mobile-to-user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stride_core::{
    ChallengeId, LocalCalendar, MobileNumber, OperationType, OtpChallenge, RateLimitDecision,
    RateLimitPolicy, RateLimitRecord, UserId,
};

use crate::error::StoreResult;

/// Rate-limit record storage
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Evaluate and count an attempt as one atomic step
    async fn check_and_record(
        &self,
        subject_key: &str,
        operation: OperationType,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> StoreResult<RateLimitDecision>;

    /// Current record, if any
    async fn get(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> StoreResult<Option<RateLimitRecord>>;

    /// Clear the window after a success (keeps daily and block history)
    async fn reset_window(&self, subject_key: &str, operation: OperationType) -> StoreResult<()>;

    /// Drop the record entirely, lifting any block
    async fn clear(&self, subject_key: &str, operation: OperationType) -> StoreResult<bool>;
}

/// OTP challenge storage
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a new challenge and invalidate every unconsumed earlier one
    /// for the same mobile number. Returns how many were invalidated.
    async fn issue(&self, challenge: OtpChallenge) -> StoreResult<usize>;

    /// Newest challenge for a mobile number
    async fn latest_for_mobile(&self, mobile: &MobileNumber) -> StoreResult<Option<OtpChallenge>>;

    /// Conditionally mark a challenge used. Returns `false` if it was
    /// already used, superseded or expired at `now`.
    async fn consume(&self, challenge_id: ChallengeId, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Delete challenges that expired before `before`
    async fn purge_expired(&self, before: DateTime<Utc>) -> StoreResult<usize>;
}

/// Mobile number to user mapping owned by the identity provider
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn user_for_mobile(&self, mobile: &MobileNumber) -> StoreResult<Option<UserId>>;

    /// Register a number; returns the existing user if already known
    async fn register(&self, mobile: &MobileNumber) -> StoreResult<UserId>;
}
