//! Rate-Limit State Machine
//!
//! Per `(subject, operation)` record moving between
//! `Open -> Blocked -> Open` and, after repeated escalation,
//! `PermanentlyBlocked`. The transition function is pure; stores apply
//! it under their own row lock so increment-and-compare is atomic.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::LocalCalendar;
use crate::error::CoreError;

/// Guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    OtpGeneration,
    OtpVerification,
    Login,
    PasswordReset,
    StepSubmission,
}

impl OperationType {
    pub const ALL: [OperationType; 5] = [
        Self::OtpGeneration,
        Self::OtpVerification,
        Self::Login,
        Self::PasswordReset,
        Self::StepSubmission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OtpGeneration => "otp_generation",
            Self::OtpVerification => "otp_verification",
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
            Self::StepSubmission => "step_submission",
        }
    }
}

impl FromStr for OperationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::unknown_tag("operation", s))
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Attempts allowed per window
    pub max_attempts: u32,
    pub window_secs: i64,
    pub block_secs: i64,
    /// Allowed attempts per local calendar day
    pub daily_limit: Option<u32>,
    /// Number of blocks after which the subject is blocked for good
    pub permanent_after_blocks: Option<u32>,
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::seconds(self.block_secs)
    }

    fn generic(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            window_secs: 3_600,
            block_secs: 3_600,
            daily_limit: None,
            permanent_after_blocks: None,
        }
    }
}

/// Policy table keyed by operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicies {
    pub otp_generation: RateLimitPolicy,
    pub otp_verification: RateLimitPolicy,
    pub login: RateLimitPolicy,
    pub password_reset: RateLimitPolicy,
    pub step_submission: RateLimitPolicy,
}

impl RateLimitPolicies {
    pub fn for_operation(&self, op: OperationType) -> &RateLimitPolicy {
        match op {
            OperationType::OtpGeneration => &self.otp_generation,
            OperationType::OtpVerification => &self.otp_verification,
            OperationType::Login => &self.login,
            OperationType::PasswordReset => &self.password_reset,
            OperationType::StepSubmission => &self.step_submission,
        }
    }

    pub fn for_operation_mut(&mut self, op: OperationType) -> &mut RateLimitPolicy {
        match op {
            OperationType::OtpGeneration => &mut self.otp_generation,
            OperationType::OtpVerification => &mut self.otp_verification,
            OperationType::Login => &mut self.login,
            OperationType::PasswordReset => &mut self.password_reset,
            OperationType::StepSubmission => &mut self.step_submission,
        }
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            otp_generation: RateLimitPolicy {
                max_attempts: 3,
                window_secs: 15 * 60,
                block_secs: 3_600,
                daily_limit: Some(10),
                permanent_after_blocks: None,
            },
            otp_verification: RateLimitPolicy {
                permanent_after_blocks: Some(3),
                ..RateLimitPolicy::generic(5)
            },
            login: RateLimitPolicy::generic(5),
            password_reset: RateLimitPolicy::generic(3),
            step_submission: RateLimitPolicy::generic(100),
        }
    }
}

/// Stored limiter state for one subject and operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub subject_key: String,
    pub operation_type: OperationType,
    pub attempt_count: u32,
    pub window_start: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub permanent_block: bool,
    pub block_count: u32,
    pub daily_count: u32,
    pub daily_date: Option<NaiveDate>,
}

/// Outcome of a guarded attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Blocked { retry_after: DateTime<Utc>, reason: BlockReason },
    PermanentlyBlocked,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// Too many attempts in the rolling window
    WindowExceeded,
    /// Daily ceiling reached, resets at local midnight
    DailyLimit,
}

impl RateLimitRecord {
    pub fn new(subject_key: impl Into<String>, operation_type: OperationType) -> Self {
        Self {
            subject_key: subject_key.into(),
            operation_type,
            attempt_count: 0,
            window_start: None,
            blocked_until: None,
            permanent_block: false,
            block_count: 0,
            daily_count: 0,
            daily_date: None,
        }
    }

    /// Evaluate and record one attempt at `now`
    pub fn apply_attempt(
        &mut self,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> RateLimitDecision {
        if self.permanent_block {
            return RateLimitDecision::PermanentlyBlocked;
        }

        if let Some(until) = self.blocked_until {
            if now < until {
                return RateLimitDecision::Blocked {
                    retry_after: until,
                    reason: BlockReason::WindowExceeded,
                };
            }
            // Block served: start over with a fresh window
            self.blocked_until = None;
            self.attempt_count = 0;
            self.window_start = None;
        }

        let today = calendar.date_of(now);
        if self.daily_date != Some(today) {
            self.daily_date = Some(today);
            self.daily_count = 0;
        }
        if let Some(limit) = policy.daily_limit {
            if self.daily_count >= limit {
                return RateLimitDecision::Blocked {
                    retry_after: calendar.next_midnight(now),
                    reason: BlockReason::DailyLimit,
                };
            }
        }

        match self.window_start {
            Some(start) if now < start + policy.window() => {}
            _ => {
                self.window_start = Some(now);
                self.attempt_count = 0;
            }
        }

        if self.attempt_count >= policy.max_attempts {
            self.block_count = self.block_count.saturating_add(1);
            if let Some(limit) = policy.permanent_after_blocks {
                if self.block_count >= limit {
                    self.permanent_block = true;
                    self.blocked_until = None;
                    return RateLimitDecision::PermanentlyBlocked;
                }
            }
            let until = now + policy.block_duration();
            self.blocked_until = Some(until);
            return RateLimitDecision::Blocked {
                retry_after: until,
                reason: BlockReason::WindowExceeded,
            };
        }

        self.attempt_count += 1;
        self.daily_count = self.daily_count.saturating_add(1);
        RateLimitDecision::Allowed {
            remaining: policy.max_attempts - self.attempt_count,
        }
    }

    /// Clear window and block state, keeping daily counters
    pub fn reset_window(&mut self) {
        self.attempt_count = 0;
        self.window_start = None;
        self.blocked_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_otp_generation_blocks_fourth_attempt() {
        let policies = RateLimitPolicies::default();
        let policy = policies.for_operation(OperationType::OtpGeneration);
        let calendar = LocalCalendar::utc();
        let mut record = RateLimitRecord::new("9876543210", OperationType::OtpGeneration);
        let now = start();

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                record.apply_attempt(policy, now, &calendar),
                RateLimitDecision::Allowed { remaining: expected_remaining }
            );
        }

        let blocked = record.apply_attempt(policy, now + Duration::minutes(1), &calendar);
        let until = now + Duration::minutes(1) + Duration::hours(1);
        assert_eq!(
            blocked,
            RateLimitDecision::Blocked { retry_after: until, reason: BlockReason::WindowExceeded }
        );

        let just_before = until - Duration::milliseconds(1);
        assert!(!record.apply_attempt(policy, just_before, &calendar).is_allowed());

        let just_after = until + Duration::milliseconds(1);
        assert!(record.apply_attempt(policy, just_after, &calendar).is_allowed());
        assert_eq!(record.attempt_count, 1);
    }

    #[test]
    fn test_window_rolls_over() {
        let policy = RateLimitPolicies::default().otp_generation;
        let calendar = LocalCalendar::utc();
        let mut record = RateLimitRecord::new("s", OperationType::OtpGeneration);
        let now = start();
        for _ in 0..3 {
            assert!(record.apply_attempt(&policy, now, &calendar).is_allowed());
        }
        // 15 minutes later the window has reset
        let later = now + Duration::minutes(15);
        assert!(record.apply_attempt(&policy, later, &calendar).is_allowed());
        assert_eq!(record.block_count, 0);
    }

    #[test]
    fn test_daily_ceiling_resets_at_midnight() {
        let policy = RateLimitPolicies::default().otp_generation;
        let calendar = LocalCalendar::utc();
        let mut record = RateLimitRecord::new("s", OperationType::OtpGeneration);
        let mut now = start();

        // Three attempts per 15-minute window never trips the window block
        for _ in 0..10 {
            assert!(record.apply_attempt(&policy, now, &calendar).is_allowed());
            now += Duration::minutes(16);
        }
        let decision = record.apply_attempt(&policy, now, &calendar);
        let midnight = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert_eq!(
            decision,
            RateLimitDecision::Blocked { retry_after: midnight, reason: BlockReason::DailyLimit }
        );

        assert!(record.apply_attempt(&policy, midnight, &calendar).is_allowed());
    }

    #[test]
    fn test_escalates_to_permanent_block() {
        let policy = RateLimitPolicies::default().otp_verification;
        let calendar = LocalCalendar::utc();
        let mut record = RateLimitRecord::new("s", OperationType::OtpVerification);
        let mut now = start();

        for round in 1..=3 {
            for _ in 0..5 {
                assert!(record.apply_attempt(&policy, now, &calendar).is_allowed());
            }
            let decision = record.apply_attempt(&policy, now, &calendar);
            if round < 3 {
                assert!(matches!(decision, RateLimitDecision::Blocked { .. }));
                now += Duration::hours(1);
            } else {
                assert_eq!(decision, RateLimitDecision::PermanentlyBlocked);
            }
        }

        // Terminal, even long after
        let decision = record.apply_attempt(&policy, now + Duration::days(30), &calendar);
        assert_eq!(decision, RateLimitDecision::PermanentlyBlocked);
    }

    #[test]
    fn test_operation_round_trip_names() {
        for op in OperationType::ALL {
            assert_eq!(op.as_str().parse::<OperationType>(), Ok(op));
        }
        let err = "otp".parse::<OperationType>().unwrap_err();
        assert_eq!(err.code(), "STRIDE-INPUT-001");
    }
}
