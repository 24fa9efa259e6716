//! Interval / daily-time job scheduler.
//!
//! Jobs implement [`ScheduledJob`] and are registered with a [`Trigger`].
//! The [`JobScheduler`] loop wakes every tick, dispatches due jobs onto their
//! own tokio tasks (never more than one execution per job at a time) and
//! keeps a persisted [`SchedulerState`] status table.

pub mod error;
pub mod job;
pub mod runner;
pub mod state;
pub mod trigger;

pub use error::SchedulerError;
pub use job::{JobOutcome, ScheduledJob};
pub use runner::JobScheduler;
pub use state::{JobState, JobStatus, SchedulerState, SharedSchedulerState};
pub use trigger::{parse_daily_time, parse_interval, Trigger};
