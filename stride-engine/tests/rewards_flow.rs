//! Accrual, bonus and referral flows through the engine facade

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use stride_core::{ActivitySample, LedgerEvent, ManualClock, RejectionReason, StepSource, UserId};
use stride_engine::{AccrualResponse, EngineConfig, EngineError, OperationResponse, StrideEngine};
use stride_store::MemoryStore;

fn engine() -> (StrideEngine, ManualClock) {
    // 02:00 UTC is 07:30 IST on 2024-08-10
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 10, 2, 0, 0).unwrap());
    let engine = StrideEngine::builder()
        .config(EngineConfig::default())
        .clock(Arc::new(clock.clone()))
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    (engine, clock)
}

fn walk(steps: u64) -> ActivitySample {
    ActivitySample {
        steps,
        window_seconds: 3_600,
        speed_kmh: 5.0,
        gps_accuracy_meters: Some(8.0),
    }
}

// ============ Accrual ============

#[tokio::test]
async fn test_multiplier_by_tier() {
    let (engine, _) = engine();
    let user = UserId::new("user:climber");

    // Priced at tier 1, then promoted straight through tier 2 to tier 3
    let first = engine.accrue_steps(&user, 150_000, "google_fit").await.unwrap();
    assert_eq!(first.coins_awarded, 6_000);
    assert_eq!(first.tier_after, 3);

    let second = engine.accrue_steps(&user, 1_000, "google_fit").await.unwrap();
    assert_eq!(second.multiplier, Decimal::new(12, 1));
    assert_eq!(second.coins_awarded, 48);

    let response = AccrualResponse::from(&second);
    assert_eq!(response.current_tier, 3);
    assert_eq!(response.total_balance, 6_048);

    let txs = engine.transactions(&user).await.unwrap();
    match &txs[1].event {
        LedgerEvent::Accrual {
            multiplier,
            source,
            tier,
            ..
        } => {
            assert_eq!(*multiplier, Decimal::new(12, 1));
            assert_eq!(*source, StepSource::GoogleFit);
            assert_eq!(*tier, 3);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_accepted_sample_updates_every_row() {
    let (engine, _) = engine();
    let user = UserId::new("user:walker");

    let submission = engine
        .submit_activity(&user, &walk(5_000), "health_connect")
        .await
        .unwrap();
    assert_eq!(submission.activity.accrual.coins_awarded, 200);
    assert!(submission.activity.validation.is_accepted());

    let today = NaiveDate::from_ymd_opt(2024, 8, 10).unwrap();
    let record = engine.daily_record(&user, today).await.unwrap().unwrap();
    assert_eq!(record.steps_accrued, 5_000);
    assert_eq!(record.coins_accrued, 200);
    assert_eq!(engine.wallet(&user).await.unwrap().total_earned, 200);
    assert_eq!(engine.phase_state(&user).await.unwrap().total_lifetime_steps, 5_000);
}

#[tokio::test]
async fn test_rejected_samples_have_no_currency_effect() {
    let (engine, _) = engine();
    let user = UserId::new("user:driver");

    let mut fast = walk(200);
    fast.speed_kmh = 12.5;
    fast.gps_accuracy_meters = Some(3.0);
    let err = engine.submit_activity(&user, &fast, "gps").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            reason: RejectionReason::SpeedExceeded { .. }
        }
    ));

    let mut edge = walk(200);
    edge.speed_kmh = 12.0;
    engine.submit_activity(&user, &edge, "gps").await.unwrap();

    engine.accrue_steps(&user, 49_000, "pedometer").await.unwrap();
    let err = engine
        .submit_activity(&user, &walk(2_000), "pedometer")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            reason: RejectionReason::DailyStepsExceeded { .. }
        }
    ));

    let err = engine
        .submit_activity(&user, &walk(9_000), "pedometer")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            reason: RejectionReason::HourlyStepsExceeded { .. }
        }
    ));

    assert_eq!(engine.transactions(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_daily_ceiling_is_per_local_day() {
    let (engine, clock) = engine();
    let user = UserId::new("user:marathon");
    engine.accrue_steps(&user, 49_500, "pedometer").await.unwrap();
    assert!(engine.submit_activity(&user, &walk(1_000), "pedometer").await.is_err());

    clock.advance(Duration::days(1));
    engine
        .submit_activity(&user, &walk(1_000), "pedometer")
        .await
        .unwrap();
}

// ============ Bonuses ============

#[tokio::test]
async fn test_submission_triggers_milestones_once() {
    let (engine, clock) = engine();
    let user = UserId::new("user:hiker");
    // Imported history, credited on an earlier day
    engine.accrue_steps(&user, 99_000, "pedometer").await.unwrap();
    clock.advance(Duration::days(1));

    let submission = engine
        .submit_activity(&user, &walk(2_000), "pedometer")
        .await
        .unwrap();
    assert_eq!(submission.milestones.len(), 1);
    assert_eq!(submission.milestones[0].milestone_name, "100K Steps");
    assert_eq!(submission.milestones[0].bonus_awarded, 500);

    assert!(engine.check_milestones(&user).await.unwrap().is_empty());
    let log = engine.bonus_log(&user).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount_paisa, 500);
}

#[tokio::test]
async fn test_streak_days_off_the_week_pay_nothing() {
    let (engine, _) = engine();
    let user = UserId::new("user:daily");
    for day in [1, 3, 6, 8, 13] {
        let award = engine.award_streak_bonus(&user, day).await.unwrap();
        assert!(!award.awarded, "day {day}");
    }
    assert_eq!(engine.award_streak_bonus(&user, 7).await.unwrap().amount, 100);
    assert_eq!(engine.award_streak_bonus(&user, 28).await.unwrap().amount, 400);
    assert_eq!(engine.wallet(&user).await.unwrap().total_balance, 500);
}

// ============ Referrals ============

#[tokio::test]
async fn test_referee_activity_unlocks_referral() {
    let (engine, _) = engine();
    let referrer = UserId::new("user:inviter");
    let referee = UserId::new("user:invitee");
    engine.register_referral(&referrer, &referee).await.unwrap();

    let first = engine
        .submit_activity(&referee, &walk(600), "pedometer")
        .await
        .unwrap();
    assert!(!first.referral.unlocked);

    let second = engine
        .submit_activity(&referee, &walk(600), "pedometer")
        .await
        .unwrap();
    assert!(second.referral.unlocked);
    assert_eq!(second.referral.referrer_id.as_ref(), Some(&referrer));

    let third = engine
        .submit_activity(&referee, &walk(600), "pedometer")
        .await
        .unwrap();
    assert!(!third.referral.unlocked);

    assert_eq!(engine.wallet(&referrer).await.unwrap().total_balance, 200);
    // 3 x 24 coins from walking plus the referee bonus
    assert_eq!(engine.wallet(&referee).await.unwrap().total_balance, 72 + 100);
}

// ============ Redemption ============

#[tokio::test]
async fn test_redeem_keeps_wallet_consistent() {
    let (engine, _) = engine();
    let user = UserId::new("user:spender");
    engine.accrue_steps(&user, 10_000, "pedometer").await.unwrap();

    let response: OperationResponse<_> = engine.redeem(&user, 1_000, "voucher-9").await.into();
    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "STRIDE-LEDGER-101");

    let wallet = engine.redeem(&user, 150, "voucher-9").await.unwrap();
    assert_eq!(wallet.total_balance, 250);
    assert_eq!(wallet.total_earned, 400);

    let report = engine.reconcile(&user).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.ledger_balance, 250);
    assert_eq!(report.ledger_earned, 400);
}
