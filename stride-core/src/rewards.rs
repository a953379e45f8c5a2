//! Reward Arithmetic
//!
//! Pure calculations behind the ledger and bonus engines:
//! 1. Steps to base coins (25 steps = 1 coin, floored)
//! 2. Tier multiplier application (floored)
//! 3. Streak bonus for every completed 7-day period
//! 4. Lifetime-step milestone ladder

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{
    MILESTONE_LADDER, STEPS_PER_COIN, STREAK_BONUS_PER_PERIOD, STREAK_PERIOD_DAYS,
};
use crate::error::{CoreError, CoreResult};
use crate::phase::multiplier_for_tier;

/// Outcome of converting a step count at a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualQuote {
    pub steps: u64,
    pub tier: u8,
    pub base_coins: i64,
    pub multiplier: Decimal,
    pub final_coins: i64,
}

/// `floor(floor(steps / 25) * multiplier(tier))`
pub fn quote_accrual(steps: u64, tier: u8) -> CoreResult<AccrualQuote> {
    let multiplier = multiplier_for_tier(tier)?;
    let base = steps / STEPS_PER_COIN;
    let base_coins = i64::try_from(base).map_err(|_| CoreError::overflow("base coins"))?;

    let scaled = Decimal::from(base_coins)
        .checked_mul(multiplier)
        .ok_or_else(|| CoreError::overflow("multiplied coins"))?;
    let final_coins = scaled
        .floor()
        .to_i64()
        .ok_or_else(|| CoreError::overflow("final coins"))?;

    Ok(AccrualQuote {
        steps,
        tier,
        base_coins,
        multiplier,
        final_coins,
    })
}

/// Streak payout for a streak length, `None` unless it completes a period
pub fn streak_bonus(streak_days: u32) -> Option<i64> {
    if streak_days == 0 || streak_days % STREAK_PERIOD_DAYS != 0 {
        return None;
    }
    Some(STREAK_BONUS_PER_PERIOD * i64::from(streak_days / STREAK_PERIOD_DAYS))
}

/// Dedup description for a streak bonus
pub fn streak_description(streak_days: u32) -> String {
    format!("{}-day streak bonus", streak_days)
}

/// One rung of the milestone ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub threshold_steps: u64,
    pub bonus: i64,
}

/// Ascending lifetime-step milestones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneLadder {
    milestones: Vec<Milestone>,
}

impl MilestoneLadder {
    /// Build a ladder; rungs are sorted by threshold
    pub fn new(mut milestones: Vec<Milestone>) -> Self {
        milestones.sort_by_key(|m| m.threshold_steps);
        Self { milestones }
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Rungs met at a lifetime step count, ascending
    pub fn reached(&self, lifetime_steps: u64) -> impl Iterator<Item = &Milestone> {
        self.milestones
            .iter()
            .take_while(move |m| lifetime_steps >= m.threshold_steps)
    }

    /// Next rung not yet met
    pub fn next(&self, lifetime_steps: u64) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| lifetime_steps < m.threshold_steps)
    }
}

impl Default for MilestoneLadder {
    fn default() -> Self {
        Self::new(
            MILESTONE_LADDER
                .iter()
                .map(|(name, threshold, bonus)| Milestone {
                    name: (*name).to_string(),
                    threshold_steps: *threshold,
                    bonus: *bonus,
                })
                .collect(),
        )
    }
}
