//! Referral Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stride_core::{ReferralRelationship, UserId};

use crate::error::StoreResult;

#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Insert a relationship; `Duplicate` if the referee already has a referrer
    async fn create(&self, relationship: ReferralRelationship) -> StoreResult<()>;

    async fn get_by_referee(
        &self,
        referee_id: &UserId,
    ) -> StoreResult<Option<ReferralRelationship>>;

    /// Compare-and-set pending -> completed. Returns the completed
    /// relationship only to the caller that performed the transition.
    async fn complete_if_pending(
        &self,
        referee_id: &UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ReferralRelationship>>;

    async fn list_by_referrer(
        &self,
        referrer_id: &UserId,
    ) -> StoreResult<Vec<ReferralRelationship>>;
}
