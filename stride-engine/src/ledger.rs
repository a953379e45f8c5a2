//! Reward Ledger
//!
//! Converts accepted steps into coins and applies every currency change
//! through one atomic per-user commit. Each operation reads a snapshot,
//! builds a [`LedgerCommit`] against its version and retries from a
//! fresh snapshot when another writer got there first.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stride_core::{
    quote_accrual, ActivitySample, ActivityValidator, BonusKind, BonusLogEntry, Clock, CoreError,
    DailyAccrualRecord, DailyDelta, LedgerEvent, LocalCalendar, PhaseTable, StepSource,
    Transaction, UserId, UserPhaseState, ValidationReport, WalletBalance,
};
use stride_store::{CommitReceipt, LedgerCommit, LedgerSnapshot, LedgerStore};
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::retry::RetryPolicy;

/// Result of one accrual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    pub coins_awarded: i64,
    pub multiplier: Decimal,
    pub base_coins: i64,
    pub source: StepSource,
    /// Tier the coins were priced at
    pub tier_before: u8,
    pub tier_after: u8,
    pub lifetime_steps: u64,
    pub wallet: WalletBalance,
    pub daily: Option<DailyAccrualRecord>,
}

impl AccrualOutcome {
    pub fn tier_advanced(&self) -> bool {
        self.tier_after > self.tier_before
    }
}

/// Accepted sample plus the accrual it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub accrual: AccrualOutcome,
    pub validation: ValidationReport,
}

/// Outcome of a deduplicated bonus credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BonusCredit {
    Awarded { amount: i64, wallet: WalletBalance },
    /// Dedup key already present; nothing changed
    AlreadyAwarded,
}

impl BonusCredit {
    pub fn is_awarded(&self) -> bool {
        matches!(self, Self::Awarded { .. })
    }

    pub fn amount(&self) -> i64 {
        match self {
            Self::Awarded { amount, .. } => *amount,
            Self::AlreadyAwarded => 0,
        }
    }
}

/// Cached wallet totals compared against the transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub user_id: UserId,
    pub transaction_count: usize,
    pub wallet_balance: i64,
    pub ledger_balance: i64,
    pub wallet_earned: i64,
    pub ledger_earned: i64,
    /// Sum of daily `coins_accrued` against accrual transactions
    pub daily_coins: i64,
    pub accrual_coins: i64,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.wallet_balance == self.ledger_balance
            && self.wallet_earned == self.ledger_earned
            && self.daily_coins == self.accrual_coins
            && self.wallet_balance <= self.wallet_earned
    }
}

/// Per-user currency ledger
pub struct RewardLedger {
    store: Arc<dyn LedgerStore>,
    phases: PhaseTable,
    validator: ActivityValidator,
    calendar: LocalCalendar,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl RewardLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        phases: PhaseTable,
        validator: ActivityValidator,
        calendar: LocalCalendar,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            phases,
            validator,
            calendar,
            clock,
            retry,
        }
    }

    pub fn phases(&self) -> &PhaseTable {
        &self.phases
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Convert steps to coins at the user's current tier
    ///
    /// The daily record, wallet, transaction and phase state change in
    /// one commit. A persistence failure leaves no trace and the caller
    /// must retry the whole call.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn accrue_steps(
        &self,
        user_id: &UserId,
        steps: u64,
        source: &str,
    ) -> EngineResult<AccrualOutcome> {
        let (outcome, ()) = self.accrue(user_id, steps, source, |_| Ok(())).await?;
        Ok(outcome)
    }

    /// Validate a raw sample, then accrue it if accepted
    ///
    /// Validation runs against the snapshot each commit attempt is built
    /// from, so concurrent submissions cannot push a day past its ceiling.
    /// Rejected samples have no currency effect.
    #[instrument(skip(self, sample), fields(user_id = %user_id, steps = sample.steps))]
    pub async fn submit_activity(
        &self,
        user_id: &UserId,
        sample: &ActivitySample,
        source: &str,
    ) -> EngineResult<ActivityOutcome> {
        let (accrual, validation) = self
            .accrue(user_id, sample.steps, source, |snapshot| {
                let report = self.validator.validate(sample, snapshot.steps_today());
                match report.rejection() {
                    Some(reason) => {
                        warn!(
                            user_id = %user_id,
                            reason = %reason,
                            suspicion = ?report.suspicion,
                            "Activity sample rejected"
                        );
                        Err(EngineError::Validation {
                            reason: reason.clone(),
                        })
                    }
                    None => Ok(report),
                }
            })
            .await?;
        Ok(ActivityOutcome {
            accrual,
            validation,
        })
    }

    /// Accrue `steps` once `check` accepts the snapshot being built on
    async fn accrue<V, C>(
        &self,
        user_id: &UserId,
        steps: u64,
        source: &str,
        mut check: C,
    ) -> EngineResult<(AccrualOutcome, V)>
    where
        C: FnMut(&LedgerSnapshot) -> EngineResult<V> + Send,
        V: Send,
    {
        let source = match source.parse::<StepSource>() {
            Ok(source) => source,
            Err(_) => {
                debug!(source, "Unknown step source, attributing to pedometer");
                StepSource::default()
            }
        };

        let (receipt, (quote, tier_before, checked)) = self
            .commit_with_retry(user_id, "accrue_steps", |snapshot, now| {
                let checked = check(snapshot)?;
                let tier = snapshot.phase.current_tier;
                let quote = quote_accrual(steps, tier)?;
                let lifetime = snapshot
                    .phase
                    .total_lifetime_steps
                    .checked_add(steps)
                    .ok_or_else(|| CoreError::overflow("lifetime steps"))?;
                let advance = self.phases.advance(tier, lifetime);

                let transaction = Transaction::new(
                    user_id.clone(),
                    quote.final_coins,
                    format!("Earned {} coins for {} steps", quote.final_coins, steps),
                    LedgerEvent::Accrual {
                        steps,
                        multiplier: quote.multiplier,
                        source,
                        tier,
                    },
                    now,
                );
                let commit = LedgerCommit {
                    user_id: user_id.clone(),
                    expected_version: snapshot.version(),
                    phase: Some(UserPhaseState {
                        user_id: user_id.clone(),
                        current_tier: advance.to,
                        total_lifetime_steps: lifetime,
                    }),
                    daily: Some(DailyDelta {
                        date: self.calendar.date_of(now),
                        steps,
                        coins: quote.final_coins,
                    }),
                    transaction,
                    bonus: None,
                };
                Ok((commit, (quote, tier, checked)))
            })
            .await?;

        let outcome = AccrualOutcome {
            coins_awarded: quote.final_coins,
            multiplier: quote.multiplier,
            base_coins: quote.base_coins,
            source,
            tier_before,
            tier_after: receipt.phase.current_tier,
            lifetime_steps: receipt.phase.total_lifetime_steps,
            wallet: receipt.wallet,
            daily: receipt.daily,
        };

        if outcome.tier_advanced() {
            info!(
                user_id = %user_id,
                from = outcome.tier_before,
                to = outcome.tier_after,
                lifetime_steps = outcome.lifetime_steps,
                "Phase tier advanced"
            );
        }
        debug!(
            user_id = %user_id,
            amount = outcome.coins_awarded,
            tier = tier_before,
            "Steps accrued"
        );
        Ok((outcome, checked))
    }

    /// Credit a bonus under its dedup key
    ///
    /// A key that already exists is reported as `AlreadyAwarded`, never
    /// as an error.
    #[instrument(skip(self, event), fields(user_id = %user_id, bonus_type = event.kind()))]
    pub async fn credit_bonus(
        &self,
        user_id: &UserId,
        amount: i64,
        description: &str,
        event: LedgerEvent,
    ) -> EngineResult<BonusCredit> {
        let bonus_type = bonus_kind(&event)?;
        if amount <= 0 {
            return Err(CoreError::NonPositiveAmount { amount }.into());
        }

        let result = self
            .commit_with_retry(user_id, "credit_bonus", |snapshot, now| {
                let commit = LedgerCommit {
                    user_id: user_id.clone(),
                    expected_version: snapshot.version(),
                    phase: None,
                    daily: None,
                    transaction: Transaction::new(
                        user_id.clone(),
                        amount,
                        description,
                        event.clone(),
                        now,
                    ),
                    bonus: Some(BonusLogEntry {
                        user_id: user_id.clone(),
                        bonus_type,
                        amount_paisa: amount,
                        description: description.to_string(),
                        date_earned: now,
                    }),
                };
                Ok((commit, ()))
            })
            .await;

        match result {
            Ok((receipt, ())) => {
                info!(user_id = %user_id, amount, description, "Bonus credited");
                Ok(BonusCredit::Awarded {
                    amount,
                    wallet: receipt.wallet,
                })
            }
            Err(EngineError::Store(e)) if e.is_duplicate() => {
                debug!(user_id = %user_id, description, "Bonus already awarded");
                Ok(BonusCredit::AlreadyAwarded)
            }
            Err(e) => Err(e),
        }
    }

    /// Spend coins; never touches `total_earned`
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn redeem(
        &self,
        user_id: &UserId,
        amount: i64,
        reference: &str,
    ) -> EngineResult<WalletBalance> {
        if amount <= 0 {
            return Err(CoreError::NonPositiveAmount { amount }.into());
        }

        let (receipt, ()) = self
            .commit_with_retry(user_id, "redeem", |snapshot, now| {
                if snapshot.wallet.total_balance < amount {
                    return Err(EngineError::InsufficientBalance {
                        balance: snapshot.wallet.total_balance,
                        requested: amount,
                    });
                }
                let commit = LedgerCommit {
                    user_id: user_id.clone(),
                    expected_version: snapshot.version(),
                    phase: None,
                    daily: None,
                    transaction: Transaction::new(
                        user_id.clone(),
                        -amount,
                        format!("Redeemed {amount} coins"),
                        LedgerEvent::Redemption {
                            reference: reference.to_string(),
                        },
                        now,
                    ),
                    bonus: None,
                };
                Ok((commit, ()))
            })
            .await?;

        info!(user_id = %user_id, amount, reference, "Coins redeemed");
        Ok(receipt.wallet)
    }

    /// Recompute totals from the transaction log and daily records
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reconcile(&self, user_id: &UserId) -> EngineResult<ReconciliationReport> {
        let snapshot = self.store.snapshot(user_id, self.today_date()).await?;
        let transactions = self.store.transactions(user_id).await?;
        let daily = self.store.daily_records(user_id).await?;

        let mut ledger_balance: i64 = 0;
        let mut ledger_earned: i64 = 0;
        let mut accrual_coins: i64 = 0;
        for tx in &transactions {
            ledger_balance = ledger_balance
                .checked_add(tx.amount)
                .ok_or_else(|| CoreError::overflow("ledger balance"))?;
            if tx.event.is_earning() && tx.amount > 0 {
                ledger_earned = ledger_earned
                    .checked_add(tx.amount)
                    .ok_or_else(|| CoreError::overflow("ledger earned"))?;
            }
            if matches!(tx.event, LedgerEvent::Accrual { .. }) {
                accrual_coins += tx.amount;
            }
        }
        let daily_coins = daily.iter().map(|r| r.coins_accrued).sum();

        let report = ReconciliationReport {
            user_id: user_id.clone(),
            transaction_count: transactions.len(),
            wallet_balance: snapshot.wallet.total_balance,
            ledger_balance,
            wallet_earned: snapshot.wallet.total_earned,
            ledger_earned,
            daily_coins,
            accrual_coins,
        };
        if !report.is_consistent() {
            warn!(user_id = %user_id, ?report, "Ledger drift detected");
        }
        Ok(report)
    }

    pub async fn wallet(&self, user_id: &UserId) -> EngineResult<WalletBalance> {
        Ok(self.store.snapshot(user_id, self.today_date()).await?.wallet)
    }

    pub async fn phase_state(&self, user_id: &UserId) -> EngineResult<UserPhaseState> {
        Ok(self.store.snapshot(user_id, self.today_date()).await?.phase)
    }

    pub async fn daily_record(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> EngineResult<Option<DailyAccrualRecord>> {
        Ok(self.store.daily_record(user_id, date).await?)
    }

    pub async fn today(&self, user_id: &UserId) -> EngineResult<Option<DailyAccrualRecord>> {
        self.daily_record(user_id, self.today_date()).await
    }

    fn today_date(&self) -> NaiveDate {
        self.calendar.date_of(self.clock.now())
    }

    pub async fn transactions(&self, user_id: &UserId) -> EngineResult<Vec<Transaction>> {
        Ok(self.store.transactions(user_id).await?)
    }

    pub async fn bonus_log(&self, user_id: &UserId) -> EngineResult<Vec<BonusLogEntry>> {
        Ok(self.store.bonus_log(user_id).await?)
    }

    /// Snapshot, build, commit; start over on a version conflict
    async fn commit_with_retry<T, F>(
        &self,
        user_id: &UserId,
        operation: &'static str,
        mut build: F,
    ) -> EngineResult<(CommitReceipt, T)>
    where
        F: FnMut(&LedgerSnapshot, DateTime<Utc>) -> EngineResult<(LedgerCommit, T)> + Send,
        T: Send,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let now = self.clock.now();
            let snapshot = self.store.snapshot(user_id, self.calendar.date_of(now)).await?;
            let (commit, extra) = build(&snapshot, now)?;

            match self.store.commit(commit).await {
                Ok(receipt) => return Ok((receipt, extra)),
                Err(e) if e.is_conflict() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.backoff(attempts);
                    debug!(
                        user_id = %user_id,
                        operation,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Ledger conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        user_id = %user_id,
                        operation,
                        attempts,
                        "Ledger retry budget exhausted"
                    );
                    return Err(EngineError::PersistenceConflict { attempts });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn bonus_kind(event: &LedgerEvent) -> EngineResult<BonusKind> {
    match event {
        LedgerEvent::StreakBonus { .. } => Ok(BonusKind::StreakBonus),
        LedgerEvent::MilestoneBonus { .. } => Ok(BonusKind::MilestoneBonus),
        LedgerEvent::ReferralBonus { .. } => Ok(BonusKind::ReferralBonus),
        LedgerEvent::SocialEngagement { .. } => Ok(BonusKind::SocialEngagement),
        other => Err(CoreError::malformed_sample(format!(
            "{} is not a bonus event",
            other.kind()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stride_core::ManualClock;
    use stride_store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, RewardLedger, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
        let ledger = RewardLedger::new(
            store.clone(),
            PhaseTable::default(),
            ActivityValidator::default(),
            LocalCalendar::default(),
            Arc::new(clock.clone()),
            RetryPolicy::default(),
        );
        (store, ledger, clock)
    }

    fn user() -> UserId {
        UserId::new("user:ledger")
    }

    #[tokio::test]
    async fn test_flooring_examples() {
        let (_, ledger, _) = setup();
        let out = ledger.accrue_steps(&user(), 24, "pedometer").await.unwrap();
        assert_eq!(out.coins_awarded, 0);
        let out = ledger.accrue_steps(&user(), 25, "pedometer").await.unwrap();
        assert_eq!(out.coins_awarded, 1);

        // Zero-coin accruals still count toward lifetime steps
        assert_eq!(out.lifetime_steps, 49);
        assert_eq!(ledger.transactions(&user()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_defaults() {
        let (_, ledger, _) = setup();
        let out = ledger.accrue_steps(&user(), 100, "smartwatch").await.unwrap();
        assert_eq!(out.source, StepSource::Pedometer);
        assert_eq!(out.coins_awarded, 4);
    }

    #[tokio::test]
    async fn test_tier_advances_after_pricing() {
        let (_, ledger, _) = setup();
        let out = ledger.accrue_steps(&user(), 50_000, "health_connect").await.unwrap();
        // Priced at tier 1, then promoted
        assert_eq!(out.multiplier, Decimal::ONE);
        assert_eq!(out.coins_awarded, 2_000);
        assert_eq!(out.tier_before, 1);
        assert_eq!(out.tier_after, 2);

        let out = ledger.accrue_steps(&user(), 1_000, "health_connect").await.unwrap();
        assert_eq!(out.coins_awarded, 44);
    }

    #[tokio::test]
    async fn test_daily_record_follows_local_calendar() {
        let (_, ledger, clock) = setup();
        // 18:40 UTC is already the next day in IST
        clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 18, 40, 0).unwrap());
        ledger.accrue_steps(&user(), 250, "gps").await.unwrap();
        let next_day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let record = ledger.daily_record(&user(), next_day).await.unwrap().unwrap();
        assert_eq!(record.steps_accrued, 250);
        assert_eq!(record.coins_accrued, 10);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_no_partial_credit() {
        let (store, ledger, _) = setup();
        store.fail_next_commits(1);
        let err = ledger.accrue_steps(&user(), 1_000, "pedometer").await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));

        assert_eq!(ledger.wallet(&user()).await.unwrap().total_balance, 0);
        assert!(ledger.today(&user()).await.unwrap().is_none());
        assert!(ledger.transactions(&user()).await.unwrap().is_empty());
        assert_eq!(ledger.phase_state(&user()).await.unwrap().total_lifetime_steps, 0);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_then_surface() {
        let (store, ledger, _) = setup();
        store.conflict_next_commits(2);
        let out = ledger.accrue_steps(&user(), 100, "pedometer").await.unwrap();
        assert_eq!(out.wallet.total_balance, 4);

        store.conflict_next_commits(100);
        let err = ledger.accrue_steps(&user(), 100, "pedometer").await.unwrap_err();
        assert_eq!(err, EngineError::PersistenceConflict { attempts: 8 });
        assert!(err.is_retryable());
        assert_eq!(ledger.wallet(&user()).await.unwrap().total_balance, 4);
    }

    #[tokio::test]
    async fn test_bonus_dedup_is_a_no_op() {
        let (_, ledger, _) = setup();
        let event = LedgerEvent::StreakBonus { streak_days: 7 };
        let first = ledger
            .credit_bonus(&user(), 100, "7-day streak bonus", event.clone())
            .await
            .unwrap();
        assert!(first.is_awarded());
        let second = ledger
            .credit_bonus(&user(), 100, "7-day streak bonus", event)
            .await
            .unwrap();
        assert_eq!(second, BonusCredit::AlreadyAwarded);
        assert_eq!(ledger.wallet(&user()).await.unwrap().total_balance, 100);
        assert_eq!(ledger.bonus_log(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_redeem_and_reconcile() {
        let (_, ledger, _) = setup();
        ledger.accrue_steps(&user(), 2_500, "pedometer").await.unwrap();
        let err = ledger.redeem(&user(), 101, "voucher-1").await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientBalance {
                balance: 100,
                requested: 101
            }
        );

        let wallet = ledger.redeem(&user(), 60, "voucher-1").await.unwrap();
        assert_eq!(wallet.total_balance, 40);
        assert_eq!(wallet.total_earned, 100);
        assert!(wallet.is_consistent());

        let report = ledger.reconcile(&user()).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.transaction_count, 2);
        assert_eq!(report.ledger_balance, 40);
    }

    #[tokio::test]
    async fn test_rejected_sample_has_no_effect() {
        let (_, ledger, _) = setup();
        let sample = ActivitySample {
            steps: 500,
            window_seconds: 600,
            speed_kmh: 25.0,
            gps_accuracy_meters: Some(5.0),
        };
        let err = ledger.submit_activity(&user(), &sample, "gps").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        assert_eq!(ledger.wallet(&user()).await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_submission_checked_against_committed_day() {
        let (store, ledger, _) = setup();
        ledger.accrue_steps(&user(), 49_500, "pedometer").await.unwrap();
        let sample = ActivitySample {
            steps: 1_000,
            window_seconds: 3_600,
            speed_kmh: 5.0,
            gps_accuracy_meters: None,
        };

        let err = ledger.submit_activity(&user(), &sample, "gps").await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation {
                reason: stride_core::RejectionReason::DailyStepsExceeded {
                    day_total: 50_500,
                    limit: 50_000,
                },
            }
        );
        assert_eq!(ledger.today(&user()).await.unwrap().unwrap().steps_accrued, 49_500);

        // Rebuilt and revalidated after the conflict
        store.conflict_next_commits(1);
        let sample = ActivitySample { steps: 500, ..sample };
        let out = ledger.submit_activity(&user(), &sample, "gps").await.unwrap();
        assert_eq!(out.accrual.daily.unwrap().steps_accrued, 50_000);
    }

    #[tokio::test]
    async fn test_non_bonus_event_rejected_for_credit() {
        let (_, ledger, _) = setup();
        let err = ledger
            .credit_bonus(
                &user(),
                10,
                "x",
                LedgerEvent::Redemption {
                    reference: "r".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
    }
}
