//! In-memory `LedgerStore`

use async_trait::async_trait;
use chrono::NaiveDate;
use stride_core::{BonusKey, BonusLogEntry, DailyAccrualRecord, Transaction, UserId};
use tracing::{debug, warn};

use super::{FaultInjector, MemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::ledger::{CommitReceipt, LedgerCommit, LedgerSnapshot, LedgerStore};

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn snapshot(&self, user_id: &UserId, day: NaiveDate) -> StoreResult<LedgerSnapshot> {
        match self.existing_ledger(user_id).await {
            Some(cell) => {
                let ledger = cell.lock().await;
                Ok(LedgerSnapshot {
                    phase: ledger.phase.clone(),
                    wallet: ledger.wallet.clone(),
                    daily: ledger.daily.get(&day).cloned(),
                })
            }
            None => Ok(LedgerSnapshot::empty(user_id)),
        }
    }

    async fn commit(&self, commit: LedgerCommit) -> StoreResult<CommitReceipt> {
        if FaultInjector::take(&self.faults.failures) {
            warn!(user_id = %commit.user_id, "Injected ledger commit failure");
            return Err(StoreError::Database("injected commit failure".to_string()));
        }
        if commit.transaction.user_id != commit.user_id {
            return Err(StoreError::constraint(format!(
                "transaction for {} committed under {}",
                commit.transaction.user_id, commit.user_id
            )));
        }

        let cell = self.ledger_for(&commit.user_id).await;
        let mut ledger = cell.lock().await;

        let actual = ledger.wallet.version;
        if FaultInjector::take(&self.faults.conflicts) || actual != commit.expected_version {
            debug!(
                user_id = %commit.user_id,
                expected = commit.expected_version,
                actual,
                "Ledger version conflict"
            );
            return Err(StoreError::VersionConflict {
                entity_type: "ledger".to_string(),
                id: commit.user_id.to_string(),
                expected: commit.expected_version,
                actual,
            });
        }

        if let Some(bonus) = &commit.bonus {
            let key = bonus.key();
            if ledger.bonus_keys.contains(&key) {
                return Err(StoreError::duplicate("bonus_log", key.to_string()));
            }
        }

        // Validate every change before touching any row
        let amount = commit.transaction.amount;
        let new_balance = ledger
            .wallet
            .total_balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::constraint("balance overflow"))?;
        if new_balance < 0 {
            return Err(StoreError::constraint(format!(
                "balance {} cannot cover {}",
                ledger.wallet.total_balance, amount
            )));
        }
        let new_earned = if commit.transaction.event.is_earning() && amount > 0 {
            ledger
                .wallet
                .total_earned
                .checked_add(amount)
                .ok_or_else(|| StoreError::constraint("earned total overflow"))?
        } else {
            ledger.wallet.total_earned
        };
        if let Some(phase) = &commit.phase {
            if phase.current_tier < ledger.phase.current_tier
                || phase.total_lifetime_steps < ledger.phase.total_lifetime_steps
            {
                return Err(StoreError::constraint("phase state cannot move backwards"));
            }
        }

        let daily = match commit.daily {
            Some(delta) => {
                let user_id = commit.user_id.clone();
                let record = ledger
                    .daily
                    .entry(delta.date)
                    .or_insert_with(|| DailyAccrualRecord {
                        user_id,
                        date: delta.date,
                        steps_accrued: 0,
                        coins_accrued: 0,
                    });
                record.steps_accrued = record.steps_accrued.saturating_add(delta.steps);
                record.coins_accrued = record.coins_accrued.saturating_add(delta.coins);
                Some(record.clone())
            }
            None => None,
        };

        if let Some(phase) = commit.phase {
            ledger.phase = phase;
        }

        let created_at = commit.transaction.created_at;
        ledger.wallet.total_balance = new_balance;
        ledger.wallet.total_earned = new_earned;
        ledger.wallet.version = actual + 1;
        ledger.wallet.updated_at = Some(created_at);
        ledger.transactions.push(commit.transaction);

        if let Some(bonus) = commit.bonus {
            ledger.bonus_keys.insert(bonus.key());
            ledger.bonus_log.push(bonus);
        }

        Ok(CommitReceipt {
            wallet: ledger.wallet.clone(),
            phase: ledger.phase.clone(),
            daily,
        })
    }

    async fn daily_record(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> StoreResult<Option<DailyAccrualRecord>> {
        match self.existing_ledger(user_id).await {
            Some(cell) => Ok(cell.lock().await.daily.get(&date).cloned()),
            None => Ok(None),
        }
    }

    async fn daily_records(&self, user_id: &UserId) -> StoreResult<Vec<DailyAccrualRecord>> {
        match self.existing_ledger(user_id).await {
            Some(cell) => Ok(cell.lock().await.daily.values().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn transactions(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>> {
        match self.existing_ledger(user_id).await {
            Some(cell) => Ok(cell.lock().await.transactions.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn bonus_log(&self, user_id: &UserId) -> StoreResult<Vec<BonusLogEntry>> {
        match self.existing_ledger(user_id).await {
            Some(cell) => Ok(cell.lock().await.bonus_log.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn has_bonus(&self, key: &BonusKey) -> StoreResult<bool> {
        match self.existing_ledger(&key.user_id).await {
            Some(cell) => Ok(cell.lock().await.bonus_keys.contains(key)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use stride_core::{BonusKind, DailyDelta, LedgerEvent, StepSource, UserPhaseState};

    fn user() -> UserId {
        UserId::new("user:1")
    }

    fn accrual(amount: i64) -> Transaction {
        Transaction::new(
            user(),
            amount,
            "steps",
            LedgerEvent::Accrual {
                steps: 100,
                multiplier: Decimal::ONE,
                source: StepSource::Pedometer,
                tier: 1,
            },
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn commit(version: u64, amount: i64) -> LedgerCommit {
        LedgerCommit {
            user_id: user(),
            expected_version: version,
            phase: None,
            daily: Some(DailyDelta {
                date: day(),
                steps: 100,
                coins: amount,
            }),
            transaction: accrual(amount),
            bonus: None,
        }
    }

    #[tokio::test]
    async fn test_commit_updates_all_rows() {
        let store = MemoryStore::new();
        let receipt = store.commit(commit(0, 4)).await.unwrap();
        assert_eq!(receipt.wallet.total_balance, 4);
        assert_eq!(receipt.wallet.total_earned, 4);
        assert_eq!(receipt.wallet.version, 1);
        assert_eq!(receipt.daily.unwrap().steps_accrued, 100);

        let receipt = store.commit(commit(1, 4)).await.unwrap();
        assert_eq!(receipt.daily.unwrap().coins_accrued, 8);
        assert_eq!(store.transactions(&user()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_carries_the_requested_day() {
        let store = MemoryStore::new();
        assert_eq!(store.snapshot(&user(), day()).await.unwrap().steps_today(), 0);

        store.commit(commit(0, 4)).await.unwrap();
        let snapshot = store.snapshot(&user(), day()).await.unwrap();
        assert_eq!(snapshot.steps_today(), 100);
        assert_eq!(snapshot.version(), 1);

        let next = day().succ_opt().unwrap();
        assert!(store.snapshot(&user(), next).await.unwrap().daily.is_none());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_without_effect() {
        let store = MemoryStore::new();
        store.commit(commit(0, 4)).await.unwrap();
        let err = store.commit(commit(0, 4)).await.unwrap_err();
        assert!(err.is_conflict());

        let snapshot = store.snapshot(&user(), day()).await.unwrap();
        assert_eq!(snapshot.wallet.total_balance, 4);
        assert_eq!(store.transactions(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_bonus_key_rejected() {
        let store = MemoryStore::new();
        let bonus = BonusLogEntry {
            user_id: user(),
            bonus_type: BonusKind::StreakBonus,
            amount_paisa: 100,
            description: "7-day streak bonus".into(),
            date_earned: Utc::now(),
        };
        let mut first = commit(0, 100);
        first.daily = None;
        first.bonus = Some(bonus.clone());
        store.commit(first).await.unwrap();

        let mut second = commit(1, 100);
        second.daily = None;
        second.bonus = Some(bonus.clone());
        let err = store.commit(second).await.unwrap_err();
        assert!(err.is_duplicate());
        assert!(store.has_bonus(&bonus.key()).await.unwrap());
        assert_eq!(store.snapshot(&user(), day()).await.unwrap().wallet.total_balance, 100);
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = MemoryStore::new();
        let mut redeem = commit(0, -5);
        redeem.daily = None;
        redeem.transaction.event = LedgerEvent::Redemption { reference: "r".into() };
        let err = store.commit(redeem).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
        assert_eq!(store.snapshot(&user(), day()).await.unwrap().version(), 0);
    }

    #[tokio::test]
    async fn test_phase_cannot_regress() {
        let store = MemoryStore::new();
        let mut advance = commit(0, 1);
        advance.phase = Some(UserPhaseState {
            user_id: user(),
            current_tier: 2,
            total_lifetime_steps: 60_000,
        });
        store.commit(advance).await.unwrap();

        let mut regress = commit(1, 1);
        regress.phase = Some(UserPhaseState::new(user()));
        assert!(store.commit(regress).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        assert!(matches!(
            store.commit(commit(0, 1)).await,
            Err(StoreError::Database(_))
        ));
        store.conflict_next_commits(1);
        assert!(store.commit(commit(0, 1)).await.unwrap_err().is_conflict());
        assert!(store.commit(commit(0, 1)).await.is_ok());
    }
}
