//! Referral Unlock Engine
//!
//! A referee has at most one referrer. Once the referee's lifetime steps
//! reach the unlock threshold both sides are paid and the relationship
//! moves pending -> completed exactly once.
//!
//! Both credits go through bonus dedup keys before the status
//! compare-and-set. If the process dies between the two, a later call
//! re-runs the credits as no-ops and then completes the transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stride_core::{Clock, LedgerEvent, ReferralRelationship, ReferralRole, UserId};
use stride_store::ReferralStore;
use tracing::{debug, info, instrument};

use crate::config::ReferralConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::RewardLedger;

/// Outcome of a referee activity update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralUnlock {
    /// True only for the call that completed the relationship
    pub unlocked: bool,
    pub referrer_id: Option<UserId>,
    pub referrer_bonus: i64,
    pub referee_bonus: i64,
}

impl ReferralUnlock {
    fn nothing(referrer_id: Option<UserId>) -> Self {
        Self {
            unlocked: false,
            referrer_id,
            referrer_bonus: 0,
            referee_bonus: 0,
        }
    }
}

/// Bonus log description for one side of a referral
pub fn referral_bonus_description(referee_id: &UserId, role: ReferralRole) -> String {
    format!("referral:{}:{}", referee_id, role.as_str())
}

pub struct ReferralEngine {
    store: Arc<dyn ReferralStore>,
    ledger: Arc<RewardLedger>,
    config: ReferralConfig,
    clock: Arc<dyn Clock>,
}

impl ReferralEngine {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        ledger: Arc<RewardLedger>,
        config: ReferralConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            clock,
        }
    }

    /// Record a pending referral; the first referrer for a referee wins
    #[instrument(skip(self), fields(referrer_id = %referrer_id, referee_id = %referee_id))]
    pub async fn register_referral(
        &self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> EngineResult<ReferralRelationship> {
        if referrer_id == referee_id {
            return Err(EngineError::InvalidReferral {
                reason: "users cannot refer themselves".to_string(),
            });
        }

        let relationship = ReferralRelationship::pending(
            referrer_id.clone(),
            referee_id.clone(),
            self.clock.now(),
        );
        match self.store.create(relationship.clone()).await {
            Ok(()) => {
                info!(referrer_id = %referrer_id, referee_id = %referee_id, "Referral registered");
                Ok(relationship)
            }
            Err(e) if e.is_duplicate() => Err(EngineError::InvalidReferral {
                reason: format!("{referee_id} already has a referrer"),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Pay both sides once the referee crosses the unlock threshold
    #[instrument(skip(self), fields(referee_id = %referee_id))]
    pub async fn on_referee_activity(
        &self,
        referee_id: &UserId,
        lifetime_steps: u64,
    ) -> EngineResult<ReferralUnlock> {
        let Some(relationship) = self.store.get_by_referee(referee_id).await? else {
            return Ok(ReferralUnlock::nothing(None));
        };
        let referrer_id = relationship.referrer_id.clone();

        if !relationship.is_pending() || lifetime_steps < self.config.unlock_steps {
            debug!(
                referee_id = %referee_id,
                lifetime_steps,
                pending = relationship.is_pending(),
                "Referral not unlocked"
            );
            return Ok(ReferralUnlock::nothing(Some(referrer_id)));
        }

        let referrer_credit = self
            .ledger
            .credit_bonus(
                &referrer_id,
                self.config.referrer_bonus,
                &referral_bonus_description(referee_id, ReferralRole::Referrer),
                LedgerEvent::ReferralBonus {
                    role: ReferralRole::Referrer,
                    counterparty: referee_id.clone(),
                },
            )
            .await?;
        let referee_credit = self
            .ledger
            .credit_bonus(
                referee_id,
                self.config.referee_bonus,
                &referral_bonus_description(referee_id, ReferralRole::Referee),
                LedgerEvent::ReferralBonus {
                    role: ReferralRole::Referee,
                    counterparty: referrer_id.clone(),
                },
            )
            .await?;

        match self
            .store
            .complete_if_pending(referee_id, self.clock.now())
            .await?
        {
            Some(_) => {
                info!(
                    referrer_id = %referrer_id,
                    referee_id = %referee_id,
                    referrer_bonus = self.config.referrer_bonus,
                    referee_bonus = self.config.referee_bonus,
                    "Referral completed"
                );
                Ok(ReferralUnlock {
                    unlocked: true,
                    referrer_id: Some(referrer_id),
                    referrer_bonus: self.config.referrer_bonus,
                    referee_bonus: self.config.referee_bonus,
                })
            }
            None => {
                // Another caller won the transition; our credits were dedup no-ops
                debug!(
                    referee_id = %referee_id,
                    referrer_paid = referrer_credit.is_awarded(),
                    referee_paid = referee_credit.is_awarded(),
                    "Referral already completed"
                );
                Ok(ReferralUnlock::nothing(Some(referrer_id)))
            }
        }
    }

    pub async fn referral_for(
        &self,
        referee_id: &UserId,
    ) -> EngineResult<Option<ReferralRelationship>> {
        Ok(self.store.get_by_referee(referee_id).await?)
    }

    pub async fn referrals_by(
        &self,
        referrer_id: &UserId,
    ) -> EngineResult<Vec<ReferralRelationship>> {
        Ok(self.store.list_by_referrer(referrer_id).await?)
    }
}
