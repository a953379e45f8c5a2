//! Streak & Milestone Engine
//!
//! Derives one-shot bonuses from ledger state. Every payout is keyed in
//! the bonus log, so re-running a check with unchanged inputs is a no-op.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stride_core::{streak_bonus, streak_description, LedgerEvent, MilestoneLadder, UserId};
use tracing::{info, instrument};

use crate::error::EngineResult;
use crate::ledger::{BonusCredit, RewardLedger};

/// A milestone paid out by this check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneAward {
    pub milestone_name: String,
    pub bonus_awarded: i64,
}

/// Result of a streak check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakAward {
    pub streak_days: u32,
    pub awarded: bool,
    pub amount: i64,
}

/// Result of a social engagement bonus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementAward {
    pub action: String,
    pub awarded: bool,
    pub amount: i64,
}

pub struct BonusEngine {
    ledger: Arc<RewardLedger>,
    ladder: MilestoneLadder,
}

impl BonusEngine {
    pub fn new(ledger: Arc<RewardLedger>, ladder: MilestoneLadder) -> Self {
        Self { ledger, ladder }
    }

    pub fn ladder(&self) -> &MilestoneLadder {
        &self.ladder
    }

    /// Pay every reached milestone not yet in the bonus log, lowest first
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_milestones(&self, user_id: &UserId) -> EngineResult<Vec<MilestoneAward>> {
        let lifetime = self.ledger.phase_state(user_id).await?.total_lifetime_steps;

        let mut awards = Vec::new();
        for milestone in self.ladder.reached(lifetime) {
            let credit = self
                .ledger
                .credit_bonus(
                    user_id,
                    milestone.bonus,
                    &milestone.name,
                    LedgerEvent::MilestoneBonus {
                        milestone: milestone.name.clone(),
                        threshold_steps: milestone.threshold_steps,
                    },
                )
                .await?;
            if credit.is_awarded() {
                info!(
                    user_id = %user_id,
                    milestone = %milestone.name,
                    amount = milestone.bonus,
                    "Milestone reached"
                );
                awards.push(MilestoneAward {
                    milestone_name: milestone.name.clone(),
                    bonus_awarded: milestone.bonus,
                });
            }
        }
        Ok(awards)
    }

    /// Pay the streak bonus when `streak_days` lands on a full week
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn award_streak_bonus(
        &self,
        user_id: &UserId,
        streak_days: u32,
    ) -> EngineResult<StreakAward> {
        let Some(amount) = streak_bonus(streak_days) else {
            return Ok(StreakAward {
                streak_days,
                awarded: false,
                amount: 0,
            });
        };

        let credit = self
            .ledger
            .credit_bonus(
                user_id,
                amount,
                &streak_description(streak_days),
                LedgerEvent::StreakBonus { streak_days },
            )
            .await?;

        Ok(StreakAward {
            streak_days,
            awarded: credit.is_awarded(),
            amount: credit.amount(),
        })
    }

    /// One-shot bonus per (user, action)
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn award_engagement(
        &self,
        user_id: &UserId,
        action: &str,
        amount: i64,
    ) -> EngineResult<EngagementAward> {
        let credit = self
            .ledger
            .credit_bonus(
                user_id,
                amount,
                action,
                LedgerEvent::SocialEngagement {
                    action: action.to_string(),
                },
            )
            .await?;

        Ok(EngagementAward {
            action: action.to_string(),
            awarded: matches!(credit, BonusCredit::Awarded { .. }),
            amount: credit.amount(),
        })
    }
}
