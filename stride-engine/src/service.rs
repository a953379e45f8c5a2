//! Stride Engine Facade
//!
//! Wires the ledger, bonus, referral, guard and OTP components over one
//! backend and exposes the operation surface clients call.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stride_core::{
    ActivitySample, ActivityValidator, BonusLogEntry, Clock, DailyAccrualRecord, MilestoneLadder,
    MobileNumber, OperationType, PhaseTable, RateLimitDecision, RateLimitRecord,
    ReferralRelationship, SystemClock, Transaction, UserId, UserPhaseState, WalletBalance,
};
use stride_store::{IdentityDirectory, StrideStore};
use tracing::info;

use crate::bonus::{BonusEngine, EngagementAward, MilestoneAward, StreakAward};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::guard::AbuseGuard;
use crate::ledger::{AccrualOutcome, ActivityOutcome, ReconciliationReport, RewardLedger};
use crate::otp::{LogTransport, OtpIssued, OtpService, OtpTransport, VerifiedIdentity};
use crate::referral::{ReferralEngine, ReferralUnlock};

/// Everything one accepted activity sample triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySubmission {
    pub activity: ActivityOutcome,
    pub milestones: Vec<MilestoneAward>,
    pub referral: ReferralUnlock,
}

/// Builder for [`StrideEngine`]
pub struct StrideEngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn OtpTransport>,
    phases: PhaseTable,
    ladder: MilestoneLadder,
}

impl Default for StrideEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            transport: Arc::new(LogTransport),
            phases: PhaseTable::default(),
            ladder: MilestoneLadder::default(),
        }
    }
}

impl StrideEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn OtpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn phases(mut self, phases: PhaseTable) -> Self {
        self.phases = phases;
        self
    }

    pub fn milestones(mut self, ladder: MilestoneLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Validate the configuration and assemble the engine
    pub fn build<S>(self, store: Arc<S>) -> EngineResult<StrideEngine>
    where
        S: StrideStore + 'static,
    {
        self.config.validate()?;
        self.phases.validate()?;

        let calendar = self.config.ledger.calendar();
        let ledger = Arc::new(RewardLedger::new(
            store.clone(),
            self.phases,
            ActivityValidator::new(self.config.validator),
            calendar,
            self.clock.clone(),
            self.config.ledger.conflict_retry,
        ));
        let guard = Arc::new(AbuseGuard::new(
            store.clone(),
            self.config.rate_limits.clone(),
            calendar,
            self.clock.clone(),
        ));
        let bonuses = BonusEngine::new(ledger.clone(), self.ladder);
        let referrals = ReferralEngine::new(
            store.clone(),
            ledger.clone(),
            self.config.referral,
            self.clock.clone(),
        );
        let otp = OtpService::new(
            store.clone(),
            store.clone(),
            guard.clone(),
            self.transport,
            self.config.otp.clone(),
            self.clock.clone(),
        );

        info!(
            local_offset_secs = self.config.ledger.local_offset_secs,
            retry_attempts = self.config.ledger.conflict_retry.max_attempts,
            "Stride engine initialised"
        );

        Ok(StrideEngine {
            ledger,
            bonuses,
            referrals,
            guard,
            otp,
            directory: store,
            config: self.config,
        })
    }
}

/// Operation surface of the reward engine
pub struct StrideEngine {
    ledger: Arc<RewardLedger>,
    bonuses: BonusEngine,
    referrals: ReferralEngine,
    guard: Arc<AbuseGuard>,
    otp: OtpService,
    directory: Arc<dyn IdentityDirectory>,
    config: EngineConfig,
}

impl StrideEngine {
    pub fn builder() -> StrideEngineBuilder {
        StrideEngineBuilder::default()
    }

    /// Engine with default settings and the wall clock
    pub fn new<S>(config: EngineConfig, store: Arc<S>) -> EngineResult<Self>
    where
        S: StrideStore + 'static,
    {
        Self::builder().config(config).build(store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<RewardLedger> {
        &self.ledger
    }

    pub fn guard(&self) -> &Arc<AbuseGuard> {
        &self.guard
    }

    // ---- Ledger ----

    pub async fn accrue_steps(
        &self,
        user_id: &UserId,
        steps: u64,
        source: &str,
    ) -> EngineResult<AccrualOutcome> {
        self.ledger.accrue_steps(user_id, steps, source).await
    }

    /// Rate-limit, validate and accrue a sample, then run the derived
    /// milestone and referral checks against the new lifetime total
    pub async fn submit_activity(
        &self,
        user_id: &UserId,
        sample: &ActivitySample,
        source: &str,
    ) -> EngineResult<ActivitySubmission> {
        self.guard
            .enforce(user_id.as_str(), OperationType::StepSubmission)
            .await?;

        let activity = self.ledger.submit_activity(user_id, sample, source).await?;
        let milestones = self.bonuses.check_milestones(user_id).await?;
        let referral = self
            .referrals
            .on_referee_activity(user_id, activity.accrual.lifetime_steps)
            .await?;

        Ok(ActivitySubmission {
            activity,
            milestones,
            referral,
        })
    }

    pub async fn redeem(
        &self,
        user_id: &UserId,
        amount: i64,
        reference: &str,
    ) -> EngineResult<WalletBalance> {
        self.ledger.redeem(user_id, amount, reference).await
    }

    pub async fn reconcile(&self, user_id: &UserId) -> EngineResult<ReconciliationReport> {
        self.ledger.reconcile(user_id).await
    }

    // ---- Bonuses ----

    pub async fn check_milestones(&self, user_id: &UserId) -> EngineResult<Vec<MilestoneAward>> {
        self.bonuses.check_milestones(user_id).await
    }

    pub async fn award_streak_bonus(
        &self,
        user_id: &UserId,
        streak_days: u32,
    ) -> EngineResult<StreakAward> {
        self.bonuses.award_streak_bonus(user_id, streak_days).await
    }

    pub async fn award_engagement(
        &self,
        user_id: &UserId,
        action: &str,
        amount: i64,
    ) -> EngineResult<EngagementAward> {
        self.bonuses.award_engagement(user_id, action, amount).await
    }

    // ---- Referrals ----

    pub async fn register_referral(
        &self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> EngineResult<ReferralRelationship> {
        self.referrals.register_referral(referrer_id, referee_id).await
    }

    pub async fn on_referee_activity(
        &self,
        referee_id: &UserId,
        lifetime_steps: u64,
    ) -> EngineResult<ReferralUnlock> {
        self.referrals
            .on_referee_activity(referee_id, lifetime_steps)
            .await
    }

    pub async fn referral_for(
        &self,
        referee_id: &UserId,
    ) -> EngineResult<Option<ReferralRelationship>> {
        self.referrals.referral_for(referee_id).await
    }

    // ---- Authentication ----

    /// Register a mobile number with the identity directory
    pub async fn register_account(&self, mobile_number: &str) -> EngineResult<UserId> {
        let mobile = MobileNumber::parse(mobile_number)?;
        let user_id = self.directory.register(&mobile).await?;
        info!(mobile = %mobile.masked(), user_id = %user_id, "Account registered");
        Ok(user_id)
    }

    pub async fn generate_otp(&self, mobile_number: &str) -> EngineResult<OtpIssued> {
        self.otp.generate_otp(mobile_number).await
    }

    pub async fn verify_otp(
        &self,
        mobile_number: &str,
        code: &str,
    ) -> EngineResult<VerifiedIdentity> {
        self.otp.verify_otp(mobile_number, code).await
    }

    pub async fn check_and_record(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<RateLimitDecision> {
        self.guard.check_and_record(subject_key, operation).await
    }

    pub async fn clear_block(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<bool> {
        self.guard.clear_block(subject_key, operation).await
    }

    pub async fn rate_limit_status(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<Option<RateLimitRecord>> {
        self.guard.status(subject_key, operation).await
    }

    // ---- Reads ----

    pub async fn wallet(&self, user_id: &UserId) -> EngineResult<WalletBalance> {
        self.ledger.wallet(user_id).await
    }

    pub async fn phase_state(&self, user_id: &UserId) -> EngineResult<UserPhaseState> {
        self.ledger.phase_state(user_id).await
    }

    pub async fn daily_record(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> EngineResult<Option<DailyAccrualRecord>> {
        self.ledger.daily_record(user_id, date).await
    }

    pub async fn transactions(&self, user_id: &UserId) -> EngineResult<Vec<Transaction>> {
        self.ledger.transactions(user_id).await
    }

    pub async fn bonus_log(&self, user_id: &UserId) -> EngineResult<Vec<BonusLogEntry>> {
        self.ledger.bonus_log(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_store::MemoryStore;

    use crate::error::EngineError;

    #[tokio::test]
    async fn test_build_rejects_bad_config() {
        let mut config = EngineConfig::default();
        config.otp.pepper.clear();
        let result = StrideEngine::new(config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_register_account_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = StrideEngine::new(EngineConfig::default(), store).unwrap();
        let a = engine.register_account("98765 43210").await.unwrap();
        let b = engine.register_account("9876543210").await.unwrap();
        assert_eq!(a, b);
        assert!(engine.register_account("123").await.is_err());
    }
}
