use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::job::ScheduledJob;
use crate::state::{JobState, SchedulerState, SharedSchedulerState};
use crate::trigger::{Trigger, TriggerClock};
use crate::SchedulerError;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

struct RegisteredJob {
    job: Arc<dyn ScheduledJob>,
    trigger: Trigger,
    /// Held for the duration of a run; a job never overlaps itself.
    lock: Arc<Mutex<()>>,
}

/// Status table plus where to persist it.
#[derive(Clone)]
struct StatusSink {
    state: SharedSchedulerState,
    status_file: Option<PathBuf>,
    persist_lock: Arc<StdMutex<()>>,
}

impl StatusSink {
    fn update(&self, f: impl FnOnce(&mut SchedulerState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    fn snapshot(&self) -> SchedulerState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rewrite the status file from a fresh snapshot. Serialized so an older
    /// snapshot never lands after a newer one.
    fn persist(&self) {
        let Some(path) = &self.status_file else {
            return;
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.snapshot().save(path) {
            warn!(path = %path.display(), error = %e, "Failed to persist scheduler status");
        }
    }
}

/// Polls registered jobs every tick and runs the due ones on their own tasks.
pub struct JobScheduler {
    jobs: Vec<RegisteredJob>,
    sink: StatusSink,
    tick: Duration,
    shutdown: Arc<AtomicBool>,
}

impl JobScheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            sink: StatusSink {
                state: Arc::new(RwLock::new(SchedulerState::default())),
                status_file: None,
                persist_lock: Arc::new(StdMutex::new(())),
            },
            tick: tick.max(Duration::from_millis(1)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persist the status table to `path` after every change. Counters from
    /// an existing file are carried over.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_file() {
            match SchedulerState::load(&path) {
                Ok(previous) => self.sink.update(|s| *s = previous),
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable scheduler status"),
            }
        }
        self.sink.status_file = Some(path);
        self
    }

    pub fn register(&mut self, job: Arc<dyn ScheduledJob>, trigger: Trigger) -> Result<(), SchedulerError> {
        let name = job.name().to_string();
        if self.jobs.iter().any(|j| j.job.name() == name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        if trigger.interval.is_none() && trigger.daily_at.is_none() {
            return Err(SchedulerError::NoTrigger(name));
        }

        let next_run = TriggerClock::start(trigger, Utc::now()).next_run();
        self.sink.update(|s| s.register(&name, next_run));
        info!(
            job = %name,
            interval_secs = trigger.interval.map(|d| d.as_secs()),
            daily_at = ?trigger.daily_at,
            "Registered job"
        );
        self.jobs.push(RegisteredJob {
            job,
            trigger,
            lock: Arc::new(Mutex::new(())),
        });
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.job.name()).collect()
    }

    /// Snapshot of every job's status, including next-run times.
    pub fn status(&self) -> SchedulerState {
        self.sink.snapshot()
    }

    pub fn state_handle(&self) -> SharedSchedulerState {
        Arc::clone(&self.sink.state)
    }

    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run `name` now, through the same status bookkeeping as scheduled runs.
    pub async fn run_once(&self, name: &str) -> Result<JobState, SchedulerError> {
        let registered = self
            .jobs
            .iter()
            .find(|j| j.job.name() == name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        let guard = Arc::clone(&registered.lock)
            .try_lock_owned()
            .map_err(|_| SchedulerError::AlreadyRunning(name.to_string()))?;
        Ok(execute(Arc::clone(&registered.job), guard, self.sink.clone()).await)
    }

    /// Main loop. Returns after shutdown once every in-flight job finished.
    pub async fn run(&self) {
        info!(jobs = self.jobs.len(), tick_ms = self.tick.as_millis() as u64, "Scheduler started");

        let start = Utc::now();
        let mut clocks: Vec<TriggerClock> = self
            .jobs
            .iter()
            .map(|j| TriggerClock::start(j.trigger, start))
            .collect();
        self.sink.update(|s| {
            for (registered, clock) in self.jobs.iter().zip(&clocks) {
                s.set_next_run(registered.job.name(), clock.next_run());
            }
        });
        self.sink.persist();

        let mut in_flight: JoinSet<JobState> = JoinSet::new();
        while !self.is_shutting_down() {
            let now = Utc::now();
            for (registered, clock) in self.jobs.iter().zip(clocks.iter_mut()) {
                if !clock.poll(now) {
                    continue;
                }
                let name = registered.job.name();
                let next_run = clock.next_run();
                self.sink.update(|s| s.set_next_run(name, next_run));

                match Arc::clone(&registered.lock).try_lock_owned() {
                    Ok(guard) => {
                        in_flight.spawn(execute(Arc::clone(&registered.job), guard, self.sink.clone()));
                    }
                    Err(_) => warn!(job = %name, "Previous run still in progress, skipping"),
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Job runner task failed");
                }
            }
            self.sleep_tick().await;
        }

        info!(in_flight = in_flight.len(), "Scheduler stopping, waiting for running jobs");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Job runner task failed");
            }
        }
        self.sink.persist();
        info!("Scheduler stopped");
    }

    async fn sleep_tick(&self) {
        let mut remaining = self.tick;
        while !remaining.is_zero() && !self.is_shutting_down() {
            let step = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }
}

/// Run one job while holding its lock, recording the outcome.
///
/// The job body runs on its own task so a panic is reported as an `error`
/// state instead of taking the scheduler down.
async fn execute(job: Arc<dyn ScheduledJob>, _guard: OwnedMutexGuard<()>, sink: StatusSink) -> JobState {
    let name = job.name().to_string();
    sink.update(|s| s.mark_running(&name, Utc::now()));
    sink.persist();
    info!(job = %name, "Job started");

    let started = Instant::now();
    let task = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run().await })
    };
    let (state, error, summary) = match task.await {
        Ok(Ok(outcome)) if outcome.success => (JobState::Success, None, Some(outcome.summary)),
        Ok(Ok(outcome)) => (
            JobState::Failed,
            Some("job reported failure".to_string()),
            Some(outcome.summary),
        ),
        Ok(Err(e)) => (JobState::Error, Some(format!("{e:#}")), None),
        Err(e) if e.is_panic() => (JobState::Error, Some("job panicked".to_string()), None),
        Err(e) => (JobState::Error, Some(format!("job task failed: {e}")), None),
    };

    let elapsed_secs = started.elapsed().as_secs_f64();
    match state {
        JobState::Success => info!(job = %name, elapsed_secs, "Job completed"),
        JobState::Failed => warn!(job = %name, elapsed_secs, "Job completed with failures"),
        _ => error!(job = %name, elapsed_secs, error = error.as_deref().unwrap_or(""), "Job errored"),
    }

    sink.update(|s| s.finish(&name, state, Utc::now(), error, summary));
    sink.persist();
    state
}
