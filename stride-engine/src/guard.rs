//! Abuse Guard
//!
//! Per-(subject, operation) rate limiting in front of authentication and
//! step submission. The evaluate-and-increment runs inside the store so
//! parallel attempts can never both read the same count.

use std::sync::Arc;

use stride_core::{
    BlockReason, Clock, LocalCalendar, OperationType, RateLimitDecision, RateLimitPolicies,
    RateLimitPolicy, RateLimitRecord,
};
use stride_store::RateLimitStore;
use tracing::{info, instrument, warn};

use crate::error::{EngineError, EngineResult};

pub struct AbuseGuard {
    store: Arc<dyn RateLimitStore>,
    policies: RateLimitPolicies,
    calendar: LocalCalendar,
    clock: Arc<dyn Clock>,
}

impl AbuseGuard {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        policies: RateLimitPolicies,
        calendar: LocalCalendar,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policies,
            calendar,
            clock,
        }
    }

    pub fn policy(&self, operation: OperationType) -> &RateLimitPolicy {
        self.policies.for_operation(operation)
    }

    /// Count one attempt and return the raw decision
    #[instrument(skip(self), fields(operation = %operation))]
    pub async fn check_and_record(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<RateLimitDecision> {
        let decision = self
            .store
            .check_and_record(
                subject_key,
                operation,
                self.policies.for_operation(operation),
                self.clock.now(),
                &self.calendar,
            )
            .await?;

        match &decision {
            RateLimitDecision::Allowed { .. } => {}
            RateLimitDecision::Blocked {
                retry_after,
                reason: BlockReason::DailyLimit,
            } => {
                warn!(operation = %operation, %retry_after, "Daily ceiling reached");
            }
            RateLimitDecision::Blocked { retry_after, .. } => {
                warn!(operation = %operation, %retry_after, "Attempt blocked");
            }
            RateLimitDecision::PermanentlyBlocked => {
                warn!(operation = %operation, "Subject permanently blocked");
            }
        }
        Ok(decision)
    }

    /// Count one attempt; a blocked attempt becomes an error
    pub async fn enforce(&self, subject_key: &str, operation: OperationType) -> EngineResult<u32> {
        match self.check_and_record(subject_key, operation).await? {
            RateLimitDecision::Allowed { remaining } => Ok(remaining),
            RateLimitDecision::Blocked { retry_after, .. } => Err(EngineError::RateLimited {
                operation,
                retry_after,
            }),
            RateLimitDecision::PermanentlyBlocked => {
                Err(EngineError::PermanentlyBlocked { operation })
            }
        }
    }

    /// Forget the current window after a successful attempt
    pub async fn record_success(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<()> {
        Ok(self.store.reset_window(subject_key, operation).await?)
    }

    /// Support-only: drop the record, permanent block included
    #[instrument(skip(self), fields(operation = %operation))]
    pub async fn clear_block(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<bool> {
        let cleared = self.store.clear(subject_key, operation).await?;
        info!(operation = %operation, cleared, "Rate limit record cleared");
        Ok(cleared)
    }

    pub async fn status(
        &self,
        subject_key: &str,
        operation: OperationType,
    ) -> EngineResult<Option<RateLimitRecord>> {
        Ok(self.store.get(subject_key, operation).await?)
    }
}
