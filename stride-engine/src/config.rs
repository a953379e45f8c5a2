//! Engine Configuration
//!
//! Supports loading from environment variables with the `STRIDE_` prefix.
//! Anything unset falls back to the production defaults.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stride_core::constants::{
    DEFAULT_LOCAL_OFFSET_SECS, OTP_CODE_LENGTH, OTP_EXPIRY_SECS, REFEREE_BONUS,
    REFERRAL_UNLOCK_STEPS, REFERRER_BONUS,
};
use stride_core::{LocalCalendar, OperationType, RateLimitPolicies, ValidatorLimits};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::retry::{RetryPolicy, RetryStrategy};

/// Longest window, block or expiry accepted from configuration
pub const MAX_DURATION_SECS: i64 = 366 * 86_400;

/// Activity validator thresholds
pub type ValidatorConfig = ValidatorLimits;

/// Ledger commit settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Offset of the calendar that daily records and daily ceilings use
    pub local_offset_secs: i32,
    /// Budget for optimistic version conflicts
    pub conflict_retry: RetryPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            local_offset_secs: DEFAULT_LOCAL_OFFSET_SECS,
            conflict_retry: RetryPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn calendar(&self) -> LocalCalendar {
        LocalCalendar::new(self.local_offset_secs)
    }
}

/// OTP challenge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpConfig {
    pub code_length: usize,
    pub expiry_secs: i64,
    /// Server-side secret mixed into every stored hash
    #[serde(skip_serializing, default)]
    pub pepper: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: OTP_CODE_LENGTH,
            expiry_secs: OTP_EXPIRY_SECS,
            pepper: "stride-local-pepper".to_string(),
        }
    }
}

/// Referral unlock settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Lifetime steps the referee needs before both sides are paid
    pub unlock_steps: u64,
    pub referrer_bonus: i64,
    pub referee_bonus: i64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            unlock_steps: REFERRAL_UNLOCK_STEPS,
            referrer_bonus: REFERRER_BONUS,
            referee_bonus: REFEREE_BONUS,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ledger: LedgerConfig,
    pub otp: OtpConfig,
    pub referral: ReferralConfig,
    pub validator: ValidatorConfig,
    pub rate_limits: RateLimitPolicies,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - STRIDE_LOCAL_OFFSET_SECS: calendar offset from UTC (default 19800, IST)
    /// - STRIDE_LEDGER_MAX_ATTEMPTS: commit attempts before giving up
    /// - STRIDE_LEDGER_BACKOFF_MS: initial conflict backoff
    /// - STRIDE_LEDGER_BACKOFF_MAX_MS: backoff ceiling
    /// - STRIDE_OTP_EXPIRY_SECS: challenge lifetime
    /// - STRIDE_OTP_PEPPER: hashing pepper
    /// - STRIDE_REFERRAL_UNLOCK_STEPS / STRIDE_REFERRER_BONUS / STRIDE_REFEREE_BONUS
    /// - STRIDE_MAX_SPEED_KMH / STRIDE_MAX_STEPS_PER_HOUR / STRIDE_MAX_STEPS_PER_DAY
    /// - STRIDE_RATE_<OPERATION>_MAX_ATTEMPTS / _WINDOW_SECS / _BLOCK_SECS,
    ///   e.g. STRIDE_RATE_OTP_GENERATION_MAX_ATTEMPTS
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(offset) = env_parse("STRIDE_LOCAL_OFFSET_SECS") {
            config.ledger.local_offset_secs = offset;
        }
        if let Some(attempts) = env_parse("STRIDE_LEDGER_MAX_ATTEMPTS") {
            config.ledger.conflict_retry.max_attempts = attempts;
        }
        let initial: Option<u64> = env_parse("STRIDE_LEDGER_BACKOFF_MS");
        let ceiling: Option<u64> = env_parse("STRIDE_LEDGER_BACKOFF_MAX_MS");
        if initial.is_some() || ceiling.is_some() {
            let initial = initial.unwrap_or(5);
            config.ledger.conflict_retry.strategy = RetryStrategy::Exponential {
                initial_delay_ms: initial,
                max_delay_ms: ceiling.unwrap_or(initial.saturating_mul(40)),
                multiplier: 2.0,
            };
        }

        if let Some(expiry) = env_parse("STRIDE_OTP_EXPIRY_SECS") {
            config.otp.expiry_secs = expiry;
        }
        if let Ok(pepper) = env::var("STRIDE_OTP_PEPPER") {
            config.otp.pepper = pepper;
        }

        if let Some(steps) = env_parse("STRIDE_REFERRAL_UNLOCK_STEPS") {
            config.referral.unlock_steps = steps;
        }
        if let Some(bonus) = env_parse("STRIDE_REFERRER_BONUS") {
            config.referral.referrer_bonus = bonus;
        }
        if let Some(bonus) = env_parse("STRIDE_REFEREE_BONUS") {
            config.referral.referee_bonus = bonus;
        }

        if let Some(speed) = env_parse("STRIDE_MAX_SPEED_KMH") {
            config.validator.max_speed_kmh = speed;
        }
        if let Some(steps) = env_parse("STRIDE_MAX_STEPS_PER_HOUR") {
            config.validator.max_steps_per_hour = steps;
        }
        if let Some(steps) = env_parse("STRIDE_MAX_STEPS_PER_DAY") {
            config.validator.max_steps_per_day = steps;
        }

        for op in OperationType::ALL {
            let prefix = format!("STRIDE_RATE_{}", op.as_str().to_uppercase());
            let policy = config.rate_limits.for_operation_mut(op);
            if let Some(n) = env_parse(&format!("{prefix}_MAX_ATTEMPTS")) {
                policy.max_attempts = n;
            }
            if let Some(secs) = env_parse(&format!("{prefix}_WINDOW_SECS")) {
                policy.window_secs = secs;
            }
            if let Some(secs) = env_parse(&format!("{prefix}_BLOCK_SECS")) {
                policy.block_secs = secs;
            }
        }

        config
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.ledger.conflict_retry.max_attempts == 0 {
            return Err(EngineError::Config("ledger retry budget must be at least 1".into()));
        }
        if self.ledger.local_offset_secs.unsigned_abs() >= 86_400 {
            return Err(EngineError::Config(format!(
                "local offset {}s is not a valid UTC offset",
                self.ledger.local_offset_secs
            )));
        }
        if self.otp.pepper.is_empty() {
            return Err(EngineError::Config("OTP pepper must not be empty".into()));
        }
        if self.otp.expiry_secs <= 0 || self.otp.expiry_secs > MAX_DURATION_SECS {
            return Err(EngineError::Config(format!(
                "OTP expiry must be between 1 and {MAX_DURATION_SECS} seconds"
            )));
        }
        if self.otp.code_length != OTP_CODE_LENGTH {
            return Err(EngineError::Config(format!(
                "OTP codes are {OTP_CODE_LENGTH} digits, got {}",
                self.otp.code_length
            )));
        }
        if self.referral.referrer_bonus <= 0 || self.referral.referee_bonus <= 0 {
            return Err(EngineError::Config("referral bonuses must be positive".into()));
        }
        if self.validator.max_speed_kmh.is_nan()
            || self.validator.max_speed_kmh <= 0.0
            || self.validator.max_steps_per_hour == 0
            || self.validator.max_steps_per_day == 0
        {
            return Err(EngineError::Config("validator limits must be positive".into()));
        }
        for op in OperationType::ALL {
            let policy = self.rate_limits.for_operation(op);
            if policy.max_attempts == 0 || policy.window_secs <= 0 || policy.block_secs <= 0 {
                return Err(EngineError::Config(format!(
                    "rate limit for {op} needs positive attempts, window and block"
                )));
            }
            if policy.window_secs > MAX_DURATION_SECS || policy.block_secs > MAX_DURATION_SECS {
                return Err(EngineError::Config(format!(
                    "rate limit for {op} exceeds {MAX_DURATION_SECS} seconds"
                )));
            }
        }
        Ok(())
    }
}
