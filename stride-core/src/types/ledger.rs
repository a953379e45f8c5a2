//! Ledger Types
//!
//! Phase state, daily accrual records, wallet balance, the append-only
//! transaction log and the bonus dedup log.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{TransactionId, UserId};
use crate::error::CoreError;

// ============================================================
// Phase State
// ============================================================

/// Authoritative tier and lifetime steps for one user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhaseState {
    pub user_id: UserId,
    /// Current tier (1..=9), never decreases
    pub current_tier: u8,
    pub total_lifetime_steps: u64,
}

impl UserPhaseState {
    /// Initial state for a user with no accruals
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            current_tier: 1,
            total_lifetime_steps: 0,
        }
    }
}

// ============================================================
// Daily Accrual
// ============================================================

/// One row per (user, local date)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAccrualRecord {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub steps_accrued: u64,
    pub coins_accrued: i64,
}

/// Increment applied to the daily record of `date`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDelta {
    pub date: NaiveDate,
    pub steps: u64,
    pub coins: i64,
}

// ============================================================
// Wallet
// ============================================================

/// Cached projection of the transaction log
///
/// `version` increases on every committed change and is the optimistic
/// concurrency token for the user's rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub user_id: UserId,
    pub total_balance: i64,
    pub total_earned: i64,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletBalance {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            total_balance: 0,
            total_earned: 0,
            version: 0,
            updated_at: None,
        }
    }

    /// `total_balance <= total_earned` and balance never negative
    pub fn is_consistent(&self) -> bool {
        self.total_balance >= 0 && self.total_balance <= self.total_earned
    }
}

// ============================================================
// Sources
// ============================================================

/// Where a step count came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    HealthConnect,
    GoogleFit,
    AppleHealth,
    #[default]
    Pedometer,
    Gps,
    Manual,
}

impl StepSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HealthConnect => "health_connect",
            Self::GoogleFit => "google_fit",
            Self::AppleHealth => "apple_health",
            Self::Pedometer => "pedometer",
            Self::Gps => "gps",
            Self::Manual => "manual",
        }
    }

    /// Unknown tags get the default attribution
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Parses a client-supplied source tag
impl FromStr for StepSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "health_connect" | "healthconnect" => Ok(Self::HealthConnect),
            "google_fit" | "googlefit" => Ok(Self::GoogleFit),
            "apple_health" | "healthkit" => Ok(Self::AppleHealth),
            "pedometer" | "sensor" => Ok(Self::Pedometer),
            "gps" => Ok(Self::Gps),
            "manual" => Ok(Self::Manual),
            _ => Err(CoreError::unknown_tag("step source", s)),
        }
    }
}

impl std::fmt::Display for StepSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================
// Transactions
// ============================================================

/// Which side of a referral a bonus paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralRole {
    Referrer,
    Referee,
}

impl ReferralRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Referrer => "referrer",
            Self::Referee => "referee",
        }
    }
}

/// Typed payload of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Accrual {
        steps: u64,
        multiplier: Decimal,
        source: StepSource,
        tier: u8,
    },
    StreakBonus {
        streak_days: u32,
    },
    MilestoneBonus {
        milestone: String,
        threshold_steps: u64,
    },
    ReferralBonus {
        role: ReferralRole,
        counterparty: UserId,
    },
    SocialEngagement {
        action: String,
    },
    Redemption {
        reference: String,
    },
}

impl LedgerEvent {
    /// Transaction type tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accrual { .. } => "step_accrual",
            Self::StreakBonus { .. } => "streak_bonus",
            Self::MilestoneBonus { .. } => "milestone_bonus",
            Self::ReferralBonus { .. } => "referral_bonus",
            Self::SocialEngagement { .. } => "social_engagement",
            Self::Redemption { .. } => "redemption",
        }
    }

    /// Whether the event credits `total_earned`
    pub fn is_earning(&self) -> bool {
        !matches!(self, Self::Redemption { .. })
    }
}

/// Write-once ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    /// Signed amount in paisa; redemptions are negative
    pub amount: i64,
    pub description: String,
    pub event: LedgerEvent,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: UserId,
        amount: i64,
        description: impl Into<String>,
        event: LedgerEvent,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::generate(),
            user_id,
            amount,
            description: description.into(),
            event,
            created_at,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}

// ============================================================
// Bonus Log
// ============================================================

/// Bonus category used in dedup keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    StreakBonus,
    MilestoneBonus,
    ReferralBonus,
    SocialEngagement,
}

impl BonusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreakBonus => "streak_bonus",
            Self::MilestoneBonus => "milestone_bonus",
            Self::ReferralBonus => "referral_bonus",
            Self::SocialEngagement => "social_engagement",
        }
    }
}

/// Unique key: a bonus is awarded at most once per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BonusKey {
    pub user_id: UserId,
    pub bonus_type: BonusKind,
    pub description: String,
}

impl std::fmt::Display for BonusKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.user_id,
            self.bonus_type.as_str(),
            self.description
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusLogEntry {
    pub user_id: UserId,
    pub bonus_type: BonusKind,
    pub amount_paisa: i64,
    pub description: String,
    pub date_earned: DateTime<Utc>,
}

impl BonusLogEntry {
    pub fn key(&self) -> BonusKey {
        BonusKey {
            user_id: self.user_id.clone(),
            bonus_type: self.bonus_type,
            description: self.description.clone(),
        }
    }
}
