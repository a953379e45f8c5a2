//! Concurrency tests for the Stride engine
//!
//! Many tasks hit the same user at once on a multi-thread runtime. The
//! per-user version check and the store's atomic primitives must keep
//! every total exact.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use stride_core::{
    ActivitySample, ManualClock, MobileNumber, OperationType, RateLimitDecision, RejectionReason,
    UserId,
};
use stride_engine::{
    EngineConfig, EngineError, RecordingTransport, RetryPolicy, RetryStrategy, StrideEngine,
};
use stride_store::MemoryStore;

fn patient_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.ledger.conflict_retry = RetryPolicy {
        max_attempts: 500,
        strategy: RetryStrategy::Fixed { delay_ms: 1 },
        jitter: true,
    };
    config
}

fn engine_with(config: EngineConfig) -> (Arc<StrideEngine>, Arc<RecordingTransport>) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap());
    let transport = Arc::new(RecordingTransport::new());
    let engine = StrideEngine::builder()
        .config(config)
        .clock(Arc::new(clock))
        .transport(transport.clone())
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    (Arc::new(engine), transport)
}

// ============ Ledger ============

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_accruals_lose_no_update() {
    let (engine, _) = engine_with(patient_config());
    let user = UserId::new("user:race");

    let mut handles = Vec::new();
    for i in 0..20u64 {
        let engine = engine.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            engine
                .accrue_steps(&user, 1_000 + i * 25, "health_connect")
                .await
                .unwrap()
                .coins_awarded
        }));
    }

    let mut awarded = 0;
    for handle in handles {
        awarded += handle.await.unwrap();
    }

    let wallet = engine.wallet(&user).await.unwrap();
    assert_eq!(wallet.total_balance, awarded);
    assert_eq!(wallet.total_earned, awarded);
    assert_eq!(wallet.version, 20);
    assert_eq!(engine.transactions(&user).await.unwrap().len(), 20);

    let report = engine.reconcile(&user).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.daily_coins, awarded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exhausted_retries_leave_no_partial_credit() {
    let mut config = EngineConfig::default();
    config.ledger.conflict_retry = RetryPolicy::no_retry();
    let (engine, _) = engine_with(config);
    let user = UserId::new("user:impatient");

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            engine.accrue_steps(&user, 500, "pedometer").await
        }));
    }

    let mut awarded = 0;
    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                awarded += outcome.coins_awarded;
                committed += 1;
            }
            Err(err) => assert_eq!(err, EngineError::PersistenceConflict { attempts: 1 }),
        }
    }

    let wallet = engine.wallet(&user).await.unwrap();
    assert_eq!(wallet.total_balance, awarded);
    assert_eq!(engine.transactions(&user).await.unwrap().len(), committed);
    let phase = engine.phase_state(&user).await.unwrap();
    assert_eq!(phase.total_lifetime_steps, 500 * committed as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_submissions_respect_daily_ceiling() {
    let (engine, _) = engine_with(patient_config());
    let user = UserId::new("user:ceiling");
    engine.accrue_steps(&user, 45_000, "pedometer").await.unwrap();

    let sample = ActivitySample {
        steps: 1_000,
        window_seconds: 3_600,
        speed_kmh: 5.0,
        gps_accuracy_meters: Some(8.0),
    };
    let mut handles = Vec::new();
    for _ in 0..24 {
        let engine = engine.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            engine.submit_activity(&user, &sample, "pedometer").await
        }));
    }

    let mut accepted = 0;
    let mut over_ceiling = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(EngineError::Validation {
                reason: RejectionReason::DailyStepsExceeded { limit, .. },
            }) => {
                assert_eq!(limit, 50_000);
                over_ceiling += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 5);
    assert_eq!(over_ceiling, 19);

    let today = engine.ledger().today(&user).await.unwrap().unwrap();
    assert_eq!(today.steps_accrued, 50_000);
    assert_eq!(engine.transactions(&user).await.unwrap().len(), 6);
    assert!(engine.reconcile(&user).await.unwrap().is_consistent());
}

// ============ Bonuses ============

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_streak_bonus_paid_once() {
    let (engine, _) = engine_with(patient_config());
    let user = UserId::new("user:streaker");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            engine.award_streak_bonus(&user, 21).await.unwrap()
        }));
    }

    let mut paid = 0;
    for handle in handles {
        if handle.await.unwrap().awarded {
            paid += 1;
        }
    }
    assert_eq!(paid, 1);
    assert_eq!(engine.wallet(&user).await.unwrap().total_balance, 300);
    assert_eq!(engine.bonus_log(&user).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_referral_unlock_exactly_once() {
    let (engine, _) = engine_with(patient_config());
    let referrer = UserId::new("user:host");
    let referee = UserId::new("user:guest");
    engine.register_referral(&referrer, &referee).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let engine = engine.clone();
        let referee = referee.clone();
        handles.push(tokio::spawn(async move {
            engine.on_referee_activity(&referee, 2_500).await.unwrap()
        }));
    }

    let mut unlocked = 0;
    for handle in handles {
        if handle.await.unwrap().unlocked {
            unlocked += 1;
        }
    }
    assert_eq!(unlocked, 1);
    assert_eq!(engine.wallet(&referrer).await.unwrap().total_balance, 200);
    assert_eq!(engine.wallet(&referee).await.unwrap().total_balance, 100);
}

// ============ Abuse guard ============

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_attempts_counted_once_each() {
    let (engine, _) = engine_with(EngineConfig::default());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .check_and_record("919876543210", OperationType::OtpGeneration)
                .await
                .unwrap()
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), RateLimitDecision::Allowed { .. }) {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 3);
}

// ============ Authentication ============

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_verification_consumes_once() {
    let (engine, transport) = engine_with(EngineConfig::default());
    engine.register_account("9876543210").await.unwrap();
    engine.generate_otp("9876543210").await.unwrap();
    let mobile = MobileNumber::parse("9876543210").unwrap();
    let code = transport.last_code(&mobile).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let engine = engine.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            engine.verify_otp("9876543210", &code).await
        }));
    }

    let mut verified = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => verified += 1,
            Err(err) => assert_eq!(err, EngineError::ChallengeExpiredOrConsumed),
        }
    }
    assert_eq!(verified, 1);
}
