use std::sync::Arc;
use std::time::Duration;

use lakeshore_scheduler::{JobScheduler, JobState, SchedulerError, SchedulerState, Trigger};
use tempfile::TempDir;

use crate::helpers::{Behaviour, MockJob};

const TICK: Duration = Duration::from_millis(10);

fn every(ms: u64) -> Trigger {
    Trigger::every(Duration::from_millis(ms))
}

#[tokio::test]
async fn interval_job_runs_repeatedly_and_persists_status() {
    let dir = TempDir::new().unwrap();
    let status_file = dir.path().join("status.json");
    let job = MockJob::new("file_ingestion", Behaviour::Succeed, Duration::ZERO);

    let mut scheduler = JobScheduler::new(TICK).with_status_file(&status_file);
    scheduler.register(job.clone(), every(20)).unwrap();
    let scheduler = Arc::new(scheduler);

    let handle = tokio::spawn({
        let s = Arc::clone(&scheduler);
        async move { s.run().await }
    });
    tokio::time::sleep(Duration::from_millis(250)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    assert!(job.runs() >= 2, "ran {} times", job.runs());
    let persisted = SchedulerState::load(&status_file).unwrap();
    let status = persisted.get("file_ingestion").unwrap();
    assert_eq!(status.status, JobState::Success);
    assert_eq!(status.success_count as usize, job.runs());
    assert!(status.next_run.is_some());
}

#[tokio::test]
async fn slow_job_never_overlaps_itself() {
    let job = MockJob::new("api_ingestion", Behaviour::Succeed, Duration::from_millis(120));
    let mut scheduler = JobScheduler::new(TICK);
    scheduler.register(job.clone(), every(5)).unwrap();
    let scheduler = Arc::new(scheduler);

    let handle = tokio::spawn({
        let s = Arc::clone(&scheduler);
        async move { s.run().await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    assert!(job.runs() >= 1);
    assert_eq!(job.max_active(), 1);
}

#[tokio::test]
async fn different_jobs_run_in_parallel() {
    let active: Arc<std::sync::atomic::AtomicUsize> = Arc::default();
    let max_active: Arc<std::sync::atomic::AtomicUsize> = Arc::default();
    let slow = Duration::from_millis(200);
    let a = MockJob::with_counters("a", Behaviour::Succeed, slow, Arc::clone(&active), Arc::clone(&max_active));
    let b = MockJob::with_counters("b", Behaviour::Succeed, slow, active, Arc::clone(&max_active));

    let mut scheduler = JobScheduler::new(TICK);
    scheduler.register(a.clone(), every(15)).unwrap();
    scheduler.register(b.clone(), every(15)).unwrap();
    let scheduler = Arc::new(scheduler);

    let handle = tokio::spawn({
        let s = Arc::clone(&scheduler);
        async move { s.run().await }
    });
    tokio::time::sleep(Duration::from_millis(120)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    assert_eq!(max_active.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_job() {
    let job = MockJob::new("slow", Behaviour::Succeed, Duration::from_millis(200));
    let mut scheduler = JobScheduler::new(TICK);
    scheduler.register(job.clone(), every(5)).unwrap();
    let scheduler = Arc::new(scheduler);

    let handle = tokio::spawn({
        let s = Arc::clone(&scheduler);
        async move { s.run().await }
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    let status = scheduler.status();
    let slow = status.get("slow").unwrap();
    assert_eq!(slow.status, JobState::Success);
    assert_eq!(slow.success_count, 1);
}

#[tokio::test]
async fn run_once_records_each_outcome() {
    let mut scheduler = JobScheduler::new(TICK);
    for (name, behaviour) in [
        ("ok", Behaviour::Succeed),
        ("partial", Behaviour::Fail),
        ("broken", Behaviour::Error),
        ("panics", Behaviour::Panic),
    ] {
        scheduler
            .register(MockJob::new(name, behaviour, Duration::ZERO), every(60_000))
            .unwrap();
    }

    assert_eq!(scheduler.run_once("ok").await.unwrap(), JobState::Success);
    assert_eq!(scheduler.run_once("partial").await.unwrap(), JobState::Failed);
    assert_eq!(scheduler.run_once("broken").await.unwrap(), JobState::Error);
    assert_eq!(scheduler.run_once("panics").await.unwrap(), JobState::Error);

    let status = scheduler.status();
    assert_eq!(status.get("ok").unwrap().success_count, 1);
    assert_eq!(status.get("partial").unwrap().failure_count, 1);
    assert!(status.get("partial").unwrap().last_summary.is_some());
    assert!(status
        .get("broken")
        .unwrap()
        .last_error
        .as_deref()
        .unwrap()
        .contains("source unreachable"));
    assert_eq!(status.get("panics").unwrap().last_error.as_deref(), Some("job panicked"));
}

#[tokio::test]
async fn run_once_rejects_unknown_and_busy_jobs() {
    let job = MockJob::new("busy", Behaviour::Succeed, Duration::from_millis(200));
    let mut scheduler = JobScheduler::new(TICK);
    scheduler.register(job, every(60_000)).unwrap();
    let scheduler = Arc::new(scheduler);

    assert!(matches!(
        scheduler.run_once("nope").await,
        Err(SchedulerError::UnknownJob(_))
    ));

    let first = tokio::spawn({
        let s = Arc::clone(&scheduler);
        async move { s.run_once("busy").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        scheduler.run_once("busy").await,
        Err(SchedulerError::AlreadyRunning(_))
    ));
    assert_eq!(first.await.unwrap().unwrap(), JobState::Success);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let mut scheduler = JobScheduler::new(TICK);
    scheduler
        .register(MockJob::new("x", Behaviour::Succeed, Duration::ZERO), every(1000))
        .unwrap();
    let err = scheduler
        .register(MockJob::new("x", Behaviour::Succeed, Duration::ZERO), every(1000))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob(_)));
}
