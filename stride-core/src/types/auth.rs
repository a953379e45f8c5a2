//! OTP Challenge Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{ChallengeId, MobileNumber, UserId};

/// Short-lived single-use hashed code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub challenge_id: ChallengeId,
    pub user_id: UserId,
    /// Hex-encoded hash; the plaintext code is never stored
    pub hashed_code: String,
    pub mobile_number: MobileNumber,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

/// Lifecycle state of a challenge at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Issued,
    Consumed,
    Expired,
}

impl OtpChallenge {
    /// `expires_at` is exclusive
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn state(&self, now: DateTime<Utc>) -> ChallengeState {
        if self.is_used {
            ChallengeState::Consumed
        } else if self.is_expired(now) {
            ChallengeState::Expired
        } else {
            ChallengeState::Issued
        }
    }

    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == ChallengeState::Issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(now: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            challenge_id: ChallengeId::generate(),
            user_id: UserId::new("u1"),
            hashed_code: "ab".into(),
            mobile_number: MobileNumber::parse("9876543210").unwrap(),
            created_at: now,
            expires_at: now + Duration::minutes(3),
            is_used: false,
        }
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        let mut c = challenge(now);
        assert_eq!(c.state(now), ChallengeState::Issued);
        assert_eq!(c.state(now + Duration::minutes(3)), ChallengeState::Expired);
        c.is_used = true;
        assert_eq!(c.state(now), ChallengeState::Consumed);
        assert!(!c.is_redeemable(now));
    }
}
