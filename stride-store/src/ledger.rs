//! Ledger Repository
//!
//! A user's phase state, wallet, daily records, transactions and bonus
//! log form one consistency unit. Every mutation goes through
//! [`LedgerStore::commit`], which applies all of its parts or none.

use async_trait::async_trait;
use chrono::NaiveDate;
use stride_core::{
    BonusKey, BonusLogEntry, DailyAccrualRecord, DailyDelta, Transaction, UserId, UserPhaseState,
    WalletBalance,
};

use crate::error::StoreResult;

/// Consistent read of a user's hot rows
///
/// `daily` is the record for the day the snapshot was taken on. It is
/// covered by the same version as the wallet, so a commit built from it
/// conflicts if another accrual lands on that day first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub phase: UserPhaseState,
    pub wallet: WalletBalance,
    pub daily: Option<DailyAccrualRecord>,
}

impl LedgerSnapshot {
    pub fn empty(user_id: &UserId) -> Self {
        Self {
            phase: UserPhaseState::new(user_id.clone()),
            wallet: WalletBalance::empty(user_id.clone()),
            daily: None,
        }
    }

    /// Steps already accrued on the snapshot's day
    pub fn steps_today(&self) -> u64 {
        self.daily.as_ref().map_or(0, |r| r.steps_accrued)
    }

    /// Optimistic concurrency token for the user's rows
    pub fn version(&self) -> u64 {
        self.wallet.version
    }
}

/// One atomic ledger write
///
/// Fails with `VersionConflict` if the user's rows moved past
/// `expected_version`, `Duplicate` if `bonus` is already logged, and
/// `Constraint` if the balance would go negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCommit {
    pub user_id: UserId,
    pub expected_version: u64,
    /// Replacement phase state, if the commit changes it
    pub phase: Option<UserPhaseState>,
    /// Increment to the daily accrual record
    pub daily: Option<DailyDelta>,
    /// Transaction to append; its amount moves the wallet
    pub transaction: Transaction,
    /// Dedup entry to insert under its unique key
    pub bonus: Option<BonusLogEntry>,
}

/// State after a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub wallet: WalletBalance,
    pub phase: UserPhaseState,
    pub daily: Option<DailyAccrualRecord>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read phase state, wallet and the daily record for `day`
    ///
    /// Absent users get initial state.
    async fn snapshot(&self, user_id: &UserId, day: NaiveDate) -> StoreResult<LedgerSnapshot>;

    /// Apply a commit atomically
    async fn commit(&self, commit: LedgerCommit) -> StoreResult<CommitReceipt>;

    /// Daily record for a local date
    async fn daily_record(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> StoreResult<Option<DailyAccrualRecord>>;

    /// All daily records, oldest first
    async fn daily_records(&self, user_id: &UserId) -> StoreResult<Vec<DailyAccrualRecord>>;

    /// Transaction log in append order
    async fn transactions(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>>;

    /// Bonus log entries, oldest first
    async fn bonus_log(&self, user_id: &UserId) -> StoreResult<Vec<BonusLogEntry>>;

    /// Whether a dedup key is taken
    async fn has_bonus(&self, key: &BonusKey) -> StoreResult<bool>;
}
