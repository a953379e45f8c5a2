//! In-memory rate-limit, OTP and identity stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stride_core::{
    ChallengeId, LocalCalendar, MobileNumber, OperationType, OtpChallenge, RateLimitDecision,
    RateLimitPolicy, RateLimitRecord, UserId,
};
use tracing::debug;

use super::MemoryStore;
use crate::auth::{IdentityDirectory, OtpStore, RateLimitStore};
use crate::error::StoreResult;

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check_and_record(
        &self,
        subject_key: &str,
        operation: OperationType,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> StoreResult<RateLimitDecision> {
        let cell = self.rate_limit_for(subject_key, operation).await;
        // Held across evaluate-and-increment so parallel attempts serialize
        let mut record = cell.lock().await;
        Ok(record.apply_attempt(policy, now, calendar))
    }

    async fn get(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> StoreResult<Option<RateLimitRecord>> {
        let key = (subject_key.to_string(), operation);
        let cell = self.rate_limits.read().await.get(&key).cloned();
        match cell {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn reset_window(&self, subject_key: &str, operation: OperationType) -> StoreResult<()> {
        let key = (subject_key.to_string(), operation);
        let cell = self.rate_limits.read().await.get(&key).cloned();
        if let Some(cell) = cell {
            cell.lock().await.reset_window();
        }
        Ok(())
    }

    async fn clear(&self, subject_key: &str, operation: OperationType) -> StoreResult<bool> {
        let key = (subject_key.to_string(), operation);
        Ok(self.rate_limits.write().await.remove(&key).is_some())
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn issue(&self, challenge: OtpChallenge) -> StoreResult<usize> {
        let mut tables = self.otp.write().await;
        let prior: Vec<ChallengeId> = tables
            .by_mobile
            .get(&challenge.mobile_number)
            .cloned()
            .unwrap_or_default();

        let mut invalidated = 0;
        for id in prior {
            if let Some(old) = tables.challenges.get_mut(&id) {
                if !old.is_used {
                    old.is_used = true;
                    invalidated += 1;
                }
            }
        }

        tables
            .by_mobile
            .entry(challenge.mobile_number.clone())
            .or_default()
            .push(challenge.challenge_id);
        tables.challenges.insert(challenge.challenge_id, challenge);
        Ok(invalidated)
    }

    async fn latest_for_mobile(&self, mobile: &MobileNumber) -> StoreResult<Option<OtpChallenge>> {
        let tables = self.otp.read().await;
        Ok(tables
            .by_mobile
            .get(mobile)
            .and_then(|ids| ids.last())
            .and_then(|id| tables.challenges.get(id))
            .cloned())
    }

    async fn consume(&self, challenge_id: ChallengeId, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.otp.write().await;
        match tables.challenges.get_mut(&challenge_id) {
            Some(challenge) if challenge.is_redeemable(now) => {
                challenge.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        let mut tables = self.otp.write().await;
        let expired: Vec<ChallengeId> = tables
            .challenges
            .values()
            .filter(|c| c.expires_at < before)
            .map(|c| c.challenge_id)
            .collect();

        for id in &expired {
            tables.challenges.remove(id);
        }
        for ids in tables.by_mobile.values_mut() {
            ids.retain(|id| !expired.contains(id));
        }
        tables.by_mobile.retain(|_, ids| !ids.is_empty());

        debug!(count = expired.len(), "Purged expired OTP challenges");
        Ok(expired.len())
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn user_for_mobile(&self, mobile: &MobileNumber) -> StoreResult<Option<UserId>> {
        Ok(self.identities.read().await.get(mobile).cloned())
    }

    async fn register(&self, mobile: &MobileNumber) -> StoreResult<UserId> {
        let mut identities = self.identities.write().await;
        Ok(identities
            .entry(mobile.clone())
            .or_insert_with(UserId::generate)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use stride_core::RateLimitPolicies;

    fn mobile() -> MobileNumber {
        MobileNumber::parse("9876543210").unwrap()
    }

    fn challenge(now: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            challenge_id: ChallengeId::generate(),
            user_id: UserId::new("user:1"),
            hashed_code: "hash".into(),
            mobile_number: mobile(),
            created_at: now,
            expires_at: now + Duration::minutes(3),
            is_used: false,
        }
    }

    #[tokio::test]
    async fn test_issue_supersedes_prior_challenges() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = challenge(now);
        assert_eq!(store.issue(first.clone()).await.unwrap(), 0);
        let second = challenge(now);
        assert_eq!(store.issue(second.clone()).await.unwrap(), 1);

        let latest = store.latest_for_mobile(&mobile()).await.unwrap().unwrap();
        assert_eq!(latest.challenge_id, second.challenge_id);
        assert!(!store.consume(first.challenge_id, now).await.unwrap());
        assert!(store.consume(second.challenge_id, now).await.unwrap());
        assert!(!store.consume(second.challenge_id, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_rejects_expired() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let c = challenge(now);
        store.issue(c.clone()).await.unwrap();
        assert!(!store.consume(c.challenge_id, now + Duration::minutes(3)).await.unwrap());
        assert_eq!(store.purge_expired(now + Duration::minutes(4)).await.unwrap(), 1);
        assert!(store.latest_for_mobile(&mobile()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.register(&mobile()).await.unwrap();
        let b = store.register(&mobile()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.user_for_mobile(&mobile()).await.unwrap(), Some(a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_attempts_are_counted_once_each() {
        let store = Arc::new(MemoryStore::new());
        let policy = RateLimitPolicies::default().otp_generation;
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .check_and_record(
                        "9876543210",
                        OperationType::OtpGeneration,
                        &policy,
                        now,
                        &LocalCalendar::utc(),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 3);
    }
}
