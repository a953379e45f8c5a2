//! Engine Constants
//!
//! Centralized constants for the reward engine. Policy knobs that
//! operators may tune live in the engine configuration; the values here
//! are the defaults and the fixed economic rules.

// ============================================================================
// Accrual
// ============================================================================

/// Steps converted into one coin before the tier multiplier
pub const STEPS_PER_COIN: u64 = 25;

/// Multiplier bonus per tier above tier 1, in tenths (10%)
pub const TIER_BONUS_TENTHS: u32 = 1;

// ============================================================================
// Bonuses
// ============================================================================

/// Streak bonus fires every N consecutive days
pub const STREAK_PERIOD_DAYS: u32 = 7;

/// Payout per completed streak period
pub const STREAK_BONUS_PER_PERIOD: i64 = 100;

/// Lifetime-step milestone ladder: (name, threshold, bonus)
pub const MILESTONE_LADDER: [(&str, u64, i64); 4] = [
    ("100K Steps", 100_000, 500),
    ("250K Steps", 250_000, 1_500),
    ("500K Steps", 500_000, 3_000),
    ("1M Steps", 1_000_000, 7_500),
];

/// Lifetime steps the referee must reach to unlock the referral
pub const REFERRAL_UNLOCK_STEPS: u64 = 1_000;

/// Referrer side of the referral bonus
pub const REFERRER_BONUS: i64 = 200;

/// Referee side of the referral bonus
pub const REFEREE_BONUS: i64 = 100;

// ============================================================================
// Activity Plausibility
// ============================================================================

/// Walking/running speed ceiling in km/h
pub const MAX_SPEED_KMH: f64 = 12.0;

/// Steps allowed per hour
pub const MAX_STEPS_PER_HOUR: u64 = 8_000;

/// Steps allowed per calendar day
pub const MAX_STEPS_PER_DAY: u64 = 50_000;

/// GPS accuracy at or below this is graded excellent (meters)
pub const GPS_EXCELLENT_METERS: f64 = 10.0;

/// GPS accuracy at or below this is graded good (meters)
pub const GPS_GOOD_METERS: f64 = 50.0;

// ============================================================================
// OTP
// ============================================================================

/// Digits in an OTP code
pub const OTP_CODE_LENGTH: usize = 6;

/// OTP lifetime in seconds
pub const OTP_EXPIRY_SECS: i64 = 180;

/// Accepted mobile number length after normalisation
pub const MOBILE_MIN_DIGITS: usize = 10;
pub const MOBILE_MAX_DIGITS: usize = 15;

// ============================================================================
// Locale
// ============================================================================

/// Default user-local offset from UTC (IST, +05:30) in seconds
pub const DEFAULT_LOCAL_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;
