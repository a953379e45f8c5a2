//! In-memory `ReferralStore`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stride_core::{ReferralRelationship, ReferralStatus, UserId};

use super::MemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::referral::ReferralStore;

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn create(&self, relationship: ReferralRelationship) -> StoreResult<()> {
        let mut referrals = self.referrals.write().await;
        if referrals.contains_key(&relationship.referee_id) {
            return Err(StoreError::duplicate(
                "referral",
                relationship.referee_id.as_str(),
            ));
        }
        referrals.insert(relationship.referee_id.clone(), relationship);
        Ok(())
    }

    async fn get_by_referee(
        &self,
        referee_id: &UserId,
    ) -> StoreResult<Option<ReferralRelationship>> {
        Ok(self.referrals.read().await.get(referee_id).cloned())
    }

    async fn complete_if_pending(
        &self,
        referee_id: &UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ReferralRelationship>> {
        let mut referrals = self.referrals.write().await;
        match referrals.get_mut(referee_id) {
            Some(rel) if rel.is_pending() => {
                rel.status = ReferralStatus::Completed;
                rel.completed_at = Some(now);
                Ok(Some(rel.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_by_referrer(
        &self,
        referrer_id: &UserId,
    ) -> StoreResult<Vec<ReferralRelationship>> {
        let referrals = self.referrals.read().await;
        let mut list: Vec<ReferralRelationship> = referrals
            .values()
            .filter(|r| &r.referrer_id == referrer_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.created_at);
        Ok(list)
    }
}
