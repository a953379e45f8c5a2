//! Scenario Replay
//!
//! Replays a scripted sequence of engine calls against a fresh in-memory
//! engine. Time only moves on `advance` steps, and OTP codes are captured
//! by a recording transport so `verify_otp` steps can omit the code.
//!
//! ```json
//! {
//!   "start": "2024-06-01T00:00:00Z",
//!   "steps": [
//!     { "op": "accrue", "user": "asha", "steps": 1000 },
//!     { "op": "advance", "seconds": 86400 },
//!     { "op": "streak", "user": "asha", "days": 7 }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stride_core::{ActivitySample, Clock, ManualClock, MobileNumber, OperationType, UserId};
use stride_engine::{
    EngineConfig, EngineResult, OperationResponse, ReconciliationReport, RecordingTransport,
    StrideEngine, VerifyOtpResponse,
};
use stride_store::MemoryStore;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

fn default_source() -> String {
    "pedometer".to_string()
}

/// A scripted run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Initial clock instant
    pub start: DateTime<Utc>,
    pub steps: Vec<ScenarioStep>,
}

/// One engine call or clock movement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    Advance {
        seconds: i64,
    },
    RegisterAccount {
        mobile: String,
    },
    Accrue {
        user: String,
        steps: u64,
        #[serde(default = "default_source")]
        source: String,
    },
    Submit {
        user: String,
        sample: ActivitySample,
        #[serde(default = "default_source")]
        source: String,
    },
    Streak {
        user: String,
        days: u32,
    },
    Engagement {
        user: String,
        action: String,
        amount: i64,
    },
    Referral {
        referrer: String,
        referee: String,
    },
    Redeem {
        user: String,
        amount: i64,
        reference: String,
    },
    GenerateOtp {
        mobile: String,
    },
    /// Without a code, the last delivered code is used
    VerifyOtp {
        mobile: String,
        #[serde(default)]
        code: Option<String>,
    },
    ClearBlock {
        subject: String,
        operation: OperationType,
    },
}

impl ScenarioStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::RegisterAccount { .. } => "register_account",
            Self::Accrue { .. } => "accrue",
            Self::Submit { .. } => "submit",
            Self::Streak { .. } => "streak",
            Self::Engagement { .. } => "engagement",
            Self::Referral { .. } => "referral",
            Self::Redeem { .. } => "redeem",
            Self::GenerateOtp { .. } => "generate_otp",
            Self::VerifyOtp { .. } => "verify_otp",
            Self::ClearBlock { .. } => "clear_block",
        }
    }

    /// Users whose wallets this step can touch
    fn users(&self) -> Vec<&str> {
        match self {
            Self::Accrue { user, .. }
            | Self::Submit { user, .. }
            | Self::Streak { user, .. }
            | Self::Engagement { user, .. }
            | Self::Redeem { user, .. } => vec![user.as_str()],
            Self::Referral { referrer, referee } => vec![referrer.as_str(), referee.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub at: DateTime<Utc>,
    pub response: OperationResponse<Value>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    /// Final ledger check for every user the scenario touched
    pub wallets: Vec<ReconciliationReport>,
}

impl ScenarioReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.response.success).count()
    }

    pub fn is_consistent(&self) -> bool {
        self.wallets.iter().all(ReconciliationReport::is_consistent)
    }
}

fn respond<T: Serialize>(result: EngineResult<T>) -> CliResult<OperationResponse<Value>> {
    match result {
        Ok(data) => Ok(OperationResponse::ok(serde_json::to_value(data)?)),
        Err(err) => Ok(OperationResponse::err(&err)),
    }
}

/// Replay a scenario on a fresh engine built from `config`
pub async fn run_scenario(config: EngineConfig, scenario: &Scenario) -> CliResult<ScenarioReport> {
    let clock = ManualClock::new(scenario.start);
    let transport = Arc::new(RecordingTransport::new());
    let engine = StrideEngine::builder()
        .config(config)
        .clock(Arc::new(clock.clone()))
        .transport(transport.clone())
        .build(Arc::new(MemoryStore::new()))?;

    let mut reports = Vec::with_capacity(scenario.steps.len());
    let mut users = BTreeSet::new();

    for (index, step) in scenario.steps.iter().enumerate() {
        users.extend(step.users().into_iter().map(UserId::new));

        let response = match step {
            ScenarioStep::Advance { seconds } => {
                if *seconds < 0 {
                    return Err(CliError::invalid_arg(format!(
                        "step {index}: the clock cannot move backwards"
                    )));
                }
                clock.advance(Duration::seconds(*seconds));
                OperationResponse::ok(json!({ "now": clock.now() }))
            }
            ScenarioStep::RegisterAccount { mobile } => {
                respond(engine.register_account(mobile).await)?
            }
            ScenarioStep::Accrue { user, steps, source } => {
                respond(engine.accrue_steps(&UserId::new(user), *steps, source).await)?
            }
            ScenarioStep::Submit {
                user,
                sample,
                source,
            } => respond(engine.submit_activity(&UserId::new(user), sample, source).await)?,
            ScenarioStep::Streak { user, days } => {
                respond(engine.award_streak_bonus(&UserId::new(user), *days).await)?
            }
            ScenarioStep::Engagement {
                user,
                action,
                amount,
            } => respond(
                engine
                    .award_engagement(&UserId::new(user), action, *amount)
                    .await,
            )?,
            ScenarioStep::Referral { referrer, referee } => respond(
                engine
                    .register_referral(&UserId::new(referrer), &UserId::new(referee))
                    .await,
            )?,
            ScenarioStep::Redeem {
                user,
                amount,
                reference,
            } => respond(engine.redeem(&UserId::new(user), *amount, reference).await)?,
            ScenarioStep::GenerateOtp { mobile } => respond(engine.generate_otp(mobile).await)?,
            ScenarioStep::VerifyOtp { mobile, code } => {
                let code = match code {
                    Some(code) => code.clone(),
                    None => {
                        let number = MobileNumber::parse(mobile)?;
                        transport.last_code(&number).await.ok_or_else(|| {
                            CliError::invalid_arg(format!(
                                "step {index}: no code was delivered to {}",
                                number.masked()
                            ))
                        })?
                    }
                };
                let verified = engine.verify_otp(mobile, &code).await;
                respond(verified.map(|identity| VerifyOtpResponse::from(&identity)))?
            }
            ScenarioStep::ClearBlock { subject, operation } => {
                respond(engine.clear_block(subject, *operation).await)?
            }
        };

        debug!(index, op = step.name(), success = response.success, "Scenario step");
        reports.push(StepReport {
            index,
            op: step.name(),
            at: clock.now(),
            response,
        });
    }

    let mut wallets = Vec::with_capacity(users.len());
    for user in &users {
        wallets.push(engine.reconcile(user).await?);
    }

    let report = ScenarioReport {
        steps: reports,
        wallets,
    };
    info!(
        steps = report.steps.len(),
        failures = report.failures(),
        consistent = report.is_consistent(),
        "Scenario replayed"
    );
    Ok(report)
}
