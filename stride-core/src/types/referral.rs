//! Referral Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
}

/// Referrer/referee pair; at most one per referee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRelationship {
    pub referrer_id: UserId,
    pub referee_id: UserId,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReferralRelationship {
    pub fn pending(referrer_id: UserId, referee_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            referrer_id,
            referee_id,
            status: ReferralStatus::Pending,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReferralStatus::Pending
    }
}
