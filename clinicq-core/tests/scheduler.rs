use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use clinicq_core::{
    QueueScheduler, ReconcileTrigger, SchedulerConfig, TickOutcome,
    clock::ManualClock, store::InMemoryQueueStore,
};
use clinicq_model::{CheckIn, Clinic, Doctor};
use tokio_util::sync::CancellationToken;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap()
}

struct Harness {
    store: Arc<InMemoryQueueStore>,
    clock: Arc<ManualClock>,
    clinic: Clinic,
    check_in: CheckIn,
}

async fn harness() -> Harness {
    let store = Arc::new(InMemoryQueueStore::new());
    let clinic = Clinic::new("Harbour", false);
    store.insert_doctor(Doctor::new(clinic.id, "Dr. Lindqvist")).await;
    store.insert_clinic(clinic.clone()).await;

    let check_in = CheckIn::new(clinic.id, start() - Duration::minutes(10))
        .with_expected_arrival(start())
        .with_eta_hint("15");
    store.put_check_in(check_in.clone()).await;

    Harness {
        store,
        clock: Arc::new(ManualClock::new(start())),
        clinic,
        check_in,
    }
}

fn scheduler(h: &Harness) -> QueueScheduler<InMemoryQueueStore> {
    QueueScheduler::with_clock(
        h.store.clone(),
        SchedulerConfig::default(),
        h.clock.clone(),
    )
}

fn trigger(outcome: &TickOutcome) -> Option<ReconcileTrigger> {
    match outcome {
        TickOutcome::Idle => None,
        TickOutcome::Reconciled { trigger, .. } => Some(*trigger),
    }
}

#[tokio::test(start_paused = true)]
async fn untracked_edits_do_not_reconcile() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");
    let batches = h.store.upsert_batches().await;

    h.store
        .update_check_in(h.check_in.id, |c| {
            c.patient_name = Some("R. Haddad".into());
            c.notes = Some("bring previous results".into());
        })
        .await;

    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(outcome, TickOutcome::Idle);
    assert_eq!(h.store.upsert_batches().await, batches);
}

#[tokio::test(start_paused = true)]
async fn tracked_edit_reconciles_on_next_tick() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");

    h.store
        .update_check_in(h.check_in.id, |c| c.status = "with_nurse".into())
        .await;

    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Changes));
    assert_eq!(outcome.report().map(|r| r.assignments_written), Some(1));

    assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn completing_a_check_in_is_left_to_the_full_pass() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");

    h.store
        .update_check_in(h.check_in.id, |c| c.status = "completed".into())
        .await;
    assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Idle);
    assert_eq!(scheduler.detector().tracked(), 0);

    tokio::time::advance(StdDuration::from_secs(15 * 60)).await;
    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Scheduled));
}

#[tokio::test(start_paused = true)]
async fn change_driven_passes_do_not_reset_the_timer() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");

    tokio::time::advance(StdDuration::from_secs(10 * 60)).await;
    h.store
        .update_check_in(h.check_in.id, |c| c.eta_hint = Some("25".into()))
        .await;
    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Changes));

    tokio::time::advance(StdDuration::from_secs(5 * 60)).await;
    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Scheduled));
}

#[tokio::test(start_paused = true)]
async fn timer_and_change_on_same_tick_run_one_pass() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");
    let batches = h.store.upsert_batches().await;

    tokio::time::advance(StdDuration::from_secs(15 * 60)).await;
    h.store
        .put_check_in(CheckIn::new(h.clinic.id, start()))
        .await;

    let outcome = scheduler.tick().await.expect("tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Scheduled));
    assert_eq!(h.store.upsert_batches().await, batches + 1);

    assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn loop_picks_up_changes_after_poll_interval() {
    let h = harness().await;
    let scheduler = scheduler(&h);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(StdDuration::from_secs(1)).await;
    let first = h.store.assignment(h.check_in.id).await.expect("row");

    h.clock.advance(Duration::minutes(1));
    h.store
        .update_check_in(h.check_in.id, |c| c.expected_arrival = Some(start() - Duration::minutes(20)))
        .await;

    tokio::time::sleep(StdDuration::from_secs(30)).await;
    let second = h.store.assignment(h.check_in.id).await.expect("row");
    assert!(second.updated_at > first.updated_at);

    shutdown.cancel();
    task.await.expect("scheduler task");
}

#[tokio::test(start_paused = true)]
async fn failed_pass_forgets_the_snapshot() {
    let h = harness().await;
    let mut scheduler = scheduler(&h);
    scheduler.tick().await.expect("initial tick");
    let batches = h.store.upsert_batches().await;

    h.store
        .update_check_in(h.check_in.id, |c| c.status = "with_nurse".into())
        .await;
    h.store.fail_clinic_listing(1).await;
    scheduler.tick().await.expect_err("listing fails");
    assert!(scheduler.detector().is_empty());
    assert_eq!(h.store.upsert_batches().await, batches);

    // Nothing changed since, but the retry still reconciles.
    let outcome = scheduler.tick().await.expect("retry tick");
    assert_eq!(trigger(&outcome), Some(ReconcileTrigger::Changes));
    assert_eq!(h.store.upsert_batches().await, batches + 1);
}

#[tokio::test(start_paused = true)]
async fn loop_backs_off_after_a_failed_tick_and_keeps_going() {
    let h = harness().await;
    h.store.fail_clinic_listing(1).await;
    let scheduler = scheduler(&h);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(StdDuration::from_secs(9)).await;
    assert_eq!(h.store.upsert_batches().await, 0);
    assert!(h.store.assignment(h.check_in.id).await.is_none());

    tokio::time::sleep(StdDuration::from_secs(2)).await;
    assert_eq!(h.store.upsert_batches().await, 1);
    assert!(h.store.assignment(h.check_in.id).await.is_some());
    assert!(!task.is_finished());

    shutdown.cancel();
    task.await.expect("scheduler task");
}
