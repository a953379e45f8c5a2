//! OTP Authentication
//!
//! Issues and verifies one-time codes bound to a mobile number. Only the
//! peppered hash is stored; the plaintext code goes to the transport and
//! nowhere else. Issuing a code supersedes every older unconsumed one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use stride_core::otp::{check_code_shape, hash_code, hashes_match};
use stride_core::{
    ChallengeId, ChallengeState, Clock, MobileNumber, OperationType, OtpChallenge, UserId,
};
use stride_store::{IdentityDirectory, OtpStore};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::OtpConfig;
use crate::error::{EngineError, EngineResult};
use crate::guard::AbuseGuard;

/// Outbound delivery of a plaintext code
#[async_trait]
pub trait OtpTransport: Send + Sync {
    async fn deliver(&self, mobile: &MobileNumber, code: &str) -> EngineResult<()>;
}

/// Logs that a delivery happened; the code itself is never logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl OtpTransport for LogTransport {
    async fn deliver(&self, mobile: &MobileNumber, _code: &str) -> EngineResult<()> {
        info!(mobile = %mobile.masked(), "OTP dispatched");
        Ok(())
    }
}

/// Keeps delivered codes in memory for tests and local replays
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<HashMap<MobileNumber, Vec<String>>>,
    failures: AtomicU32,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` deliveries fail
    pub fn fail_next_deliveries(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub async fn last_code(&self, mobile: &MobileNumber) -> Option<String> {
        self.sent
            .lock()
            .await
            .get(mobile)
            .and_then(|codes| codes.last().cloned())
    }

    pub async fn sent_count(&self, mobile: &MobileNumber) -> usize {
        self.sent.lock().await.get(mobile).map_or(0, Vec::len)
    }
}

#[async_trait]
impl OtpTransport for RecordingTransport {
    async fn deliver(&self, mobile: &MobileNumber, code: &str) -> EngineResult<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Transport(format!(
                "delivery to {} failed",
                mobile.masked()
            )));
        }
        self.sent
            .lock()
            .await
            .entry(mobile.clone())
            .or_default()
            .push(code.to_string());
        Ok(())
    }
}

/// Issued challenge, safe to return to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpIssued {
    pub challenge_id: ChallengeId,
    pub expires_at: DateTime<Utc>,
    /// Older challenges superseded by this one
    pub superseded: usize,
}

/// Identity established by a verified code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    directory: Arc<dyn IdentityDirectory>,
    guard: Arc<AbuseGuard>,
    transport: Arc<dyn OtpTransport>,
    config: OtpConfig,
    clock: Arc<dyn Clock>,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        directory: Arc<dyn IdentityDirectory>,
        guard: Arc<AbuseGuard>,
        transport: Arc<dyn OtpTransport>,
        config: OtpConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            guard,
            transport,
            config,
            clock,
        }
    }

    fn generate_code(&self) -> String {
        let width = self.config.code_length;
        let upper = 10u64.pow(width as u32);
        let n = rand::thread_rng().gen_range(0..upper);
        format!("{n:0width$}")
    }

    /// Issue a fresh code for a registered mobile number
    ///
    /// The attempt is counted before the account lookup so probing for
    /// unregistered numbers is rate limited too.
    #[instrument(skip(self, mobile_number))]
    pub async fn generate_otp(&self, mobile_number: &str) -> EngineResult<OtpIssued> {
        let mobile = MobileNumber::parse(mobile_number)?;
        self.guard
            .enforce(mobile.as_str(), OperationType::OtpGeneration)
            .await?;

        let user_id = self
            .directory
            .user_for_mobile(&mobile)
            .await?
            .ok_or_else(|| EngineError::AccountNotFound {
                mobile: mobile.masked(),
            })?;

        let code = self.generate_code();
        let now = self.clock.now();
        let challenge = OtpChallenge {
            challenge_id: ChallengeId::generate(),
            user_id,
            hashed_code: hash_code(&self.config.pepper, &mobile, &code),
            mobile_number: mobile.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(self.config.expiry_secs),
            is_used: false,
        };
        let issued = OtpIssued {
            challenge_id: challenge.challenge_id,
            expires_at: challenge.expires_at,
            superseded: 0,
        };

        let superseded = self.store.issue(challenge).await?;
        if let Err(e) = self.transport.deliver(&mobile, &code).await {
            // The stored challenge is unusable without its code; the client asks again
            warn!(mobile = %mobile.masked(), error = %e, "OTP delivery failed");
            return Err(e);
        }

        info!(
            mobile = %mobile.masked(),
            challenge_id = %issued.challenge_id,
            superseded,
            "OTP issued"
        );
        Ok(OtpIssued {
            superseded,
            ..issued
        })
    }

    /// Verify a code against the latest challenge for the number
    ///
    /// Success consumes the challenge and resets the verification window.
    #[instrument(skip(self, mobile_number, code))]
    pub async fn verify_otp(
        &self,
        mobile_number: &str,
        code: &str,
    ) -> EngineResult<VerifiedIdentity> {
        let mobile = MobileNumber::parse(mobile_number)?;
        self.guard
            .enforce(mobile.as_str(), OperationType::OtpVerification)
            .await?;

        if check_code_shape(code).is_err() {
            debug!(mobile = %mobile.masked(), "Malformed OTP code");
            return Err(EngineError::InvalidCode);
        }

        let now = self.clock.now();
        let challenge = self
            .store
            .latest_for_mobile(&mobile)
            .await?
            .ok_or(EngineError::ChallengeExpiredOrConsumed)?;

        match challenge.state(now) {
            ChallengeState::Issued => {}
            state => {
                debug!(mobile = %mobile.masked(), ?state, "OTP challenge not redeemable");
                return Err(EngineError::ChallengeExpiredOrConsumed);
            }
        }

        let presented = hash_code(&self.config.pepper, &mobile, code);
        if !hashes_match(&presented, &challenge.hashed_code) {
            warn!(mobile = %mobile.masked(), "Incorrect OTP code");
            return Err(EngineError::InvalidCode);
        }

        // Conditional consume: a parallel verifier may have won
        if !self.store.consume(challenge.challenge_id, now).await? {
            return Err(EngineError::ChallengeExpiredOrConsumed);
        }

        self.guard
            .record_success(mobile.as_str(), OperationType::OtpVerification)
            .await?;
        info!(mobile = %mobile.masked(), user_id = %challenge.user_id, "OTP verified");

        Ok(VerifiedIdentity {
            user_id: challenge.user_id,
            challenge_id: challenge.challenge_id,
        })
    }

    /// Drop challenges that expired before `now - grace`
    pub async fn purge_expired(&self, grace: Duration) -> EngineResult<usize> {
        Ok(self.store.purge_expired(self.clock.now() - grace).await?)
    }
}
