//! In-Memory Store
//!
//! Thread-safe backend used for tests, local simulation and the CLI.
//! Each user's ledger rows sit behind their own mutex, so commits for
//! one user serialize while different users never contend. The outer
//! maps are only write-locked to insert a missing row.

mod auth;
mod ledger;
mod referral;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use stride_core::{
    BonusKey, BonusLogEntry, ChallengeId, DailyAccrualRecord, MobileNumber, OperationType,
    OtpChallenge, RateLimitRecord, ReferralRelationship, Transaction, UserId, UserPhaseState,
    WalletBalance,
};
use tokio::sync::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};

/// All rows owned by one user's ledger
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserLedger {
    phase: UserPhaseState,
    wallet: WalletBalance,
    daily: BTreeMap<NaiveDate, DailyAccrualRecord>,
    transactions: Vec<Transaction>,
    bonus_log: Vec<BonusLogEntry>,
    #[serde(skip)]
    bonus_keys: HashSet<BonusKey>,
}

impl UserLedger {
    fn new(user_id: &UserId) -> Self {
        Self {
            phase: UserPhaseState::new(user_id.clone()),
            wallet: WalletBalance::empty(user_id.clone()),
            daily: BTreeMap::new(),
            transactions: Vec::new(),
            bonus_log: Vec::new(),
            bonus_keys: HashSet::new(),
        }
    }
}

/// OTP rows and the per-mobile index, updated together
#[derive(Debug, Default)]
pub(crate) struct OtpTables {
    challenges: HashMap<ChallengeId, OtpChallenge>,
    by_mobile: HashMap<MobileNumber, Vec<ChallengeId>>,
}

/// Fault injection for exercising failure paths in tests
#[derive(Debug, Default)]
struct FaultInjector {
    failures: AtomicU32,
    conflicts: AtomicU32,
}

impl FaultInjector {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

type RateLimitKey = (String, OperationType);

/// In-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledgers: RwLock<HashMap<UserId, Arc<Mutex<UserLedger>>>>,
    rate_limits: RwLock<HashMap<RateLimitKey, Arc<Mutex<RateLimitRecord>>>>,
    otp: RwLock<OtpTables>,
    referrals: RwLock<HashMap<UserId, ReferralRelationship>>,
    identities: RwLock<HashMap<MobileNumber, UserId>>,
    faults: FaultInjector,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` ledger commits fail with a database error
    pub fn fail_next_commits(&self, n: u32) {
        self.faults.failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` ledger commits lose the optimistic race
    pub fn conflict_next_commits(&self, n: u32) {
        self.faults.conflicts.store(n, Ordering::SeqCst);
    }

    /// Dump one user's ledger rows as pretty JSON
    pub async fn ledger_json(&self, user_id: &UserId) -> StoreResult<String> {
        let cell = self
            .existing_ledger(user_id)
            .await
            .ok_or_else(|| StoreError::not_found("ledger", user_id.as_str()))?;
        let ledger = cell.lock().await;
        Ok(serde_json::to_string_pretty(&*ledger)?)
    }

    /// Number of users with ledger rows
    pub async fn user_count(&self) -> usize {
        self.ledgers.read().await.len()
    }

    async fn existing_ledger(&self, user_id: &UserId) -> Option<Arc<Mutex<UserLedger>>> {
        self.ledgers.read().await.get(user_id).cloned()
    }

    async fn ledger_for(&self, user_id: &UserId) -> Arc<Mutex<UserLedger>> {
        get_or_insert(&self.ledgers, user_id, || UserLedger::new(user_id)).await
    }

    async fn rate_limit_for(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> Arc<Mutex<RateLimitRecord>> {
        let key = (subject_key.to_string(), operation);
        get_or_insert(&self.rate_limits, &key, || {
            RateLimitRecord::new(subject_key, operation)
        })
        .await
    }
}

/// Fetch a row cell, inserting it under the write lock if missing
async fn get_or_insert<K, V, F>(
    map: &RwLock<HashMap<K, Arc<Mutex<V>>>>,
    key: &K,
    init: F,
) -> Arc<Mutex<V>>
where
    K: Eq + Hash + Clone,
    F: FnOnce() -> V,
{
    if let Some(cell) = map.read().await.get(key) {
        return cell.clone();
    }
    let mut guard = map.write().await;
    guard
        .entry(key.clone())
        .or_insert_with(|| Arc::new(Mutex::new(init())))
        .clone()
}
