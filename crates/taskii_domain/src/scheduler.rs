//! Background loop that fires due reminders.
//!
//! Each cycle scans the store for pending records whose occurrence falls in
//! `[now, now + due_window)`, delivers a notification for each, then either
//! completes the record or completes it and appends its rescheduled sibling.
//! A window that passes while the process is down is never fired afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::notifications::Notifier;
use crate::recurrence::next_occurrence;
use crate::store::TaskStore;
use crate::task::{RepeatPolicy, TaskRecord, TaskSelector};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_DUE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// How far ahead of an occurrence a record counts as due.
    pub due_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            due_window: DEFAULT_DUE_WINDOW,
        }
    }
}

/// How a fired record was resolved in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    Completed,
    Rescheduled { next: NaiveDateTime },
    /// No next occurrence could be computed; the record stays pending.
    LeftPending,
    /// The record was deleted or edited before it could be resolved.
    Withdrawn,
    ResolveFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTask {
    pub record: TaskRecord,
    pub delivered: bool,
    pub outcome: FireOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fired: Vec<FiredTask>,
    pub skipped_unparseable: usize,
}

/// True when `0 <= occurrence - now < window`.
pub fn is_due(occurrence: NaiveDateTime, now: NaiveDateTime, window: Duration) -> bool {
    let diff_ms = (occurrence - now).num_milliseconds();
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    (0..window_ms).contains(&diff_ms)
}

pub struct NotificationScheduler {
    store: Arc<TaskStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<TaskStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// One scan, fire and resolve pass.
    pub fn run_cycle(&self) -> CycleReport {
        let now = self.clock.now();
        let mut report = CycleReport::default();

        for record in self.store.list().into_iter().filter(TaskRecord::is_pending) {
            let Some(occurrence) = record.occurrence() else {
                debug!(name = %record.name, date = %record.date, time = %record.time, "skipping unparseable occurrence");
                report.skipped_unparseable += 1;
                continue;
            };
            if !is_due(occurrence, now, self.config.due_window) {
                continue;
            }
            report.fired.push(self.fire(record, occurrence));
        }

        if !report.fired.is_empty() {
            info!(fired = report.fired.len(), "scheduler cycle fired reminders");
        }
        report
    }

    /// Cycles until `cancel` fires, sleeping `poll_interval` in between.
    ///
    /// Cycles run on the blocking pool since they touch the file system and
    /// may wait on the notifier process.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            window_secs = self.config.due_window.as_secs(),
            store = %self.store.path().display(),
            "notification scheduler started"
        );
        let poll_interval = self.config.poll_interval;
        let scheduler = Arc::new(self);
        loop {
            let cycle = {
                let scheduler = Arc::clone(&scheduler);
                tokio::task::spawn_blocking(move || scheduler.run_cycle())
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                joined = cycle => {
                    if let Err(err) = joined {
                        error!(error = %err, "scheduler cycle aborted");
                    }
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        info!("notification scheduler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    fn fire(&self, record: TaskRecord, occurrence: NaiveDateTime) -> FiredTask {
        let delivered = match self.notifier.notify(&record.name, &record.description) {
            Ok(()) => true,
            Err(err) => {
                warn!(name = %record.name, error = %err, "notification delivery failed");
                false
            }
        };
        let outcome = self.resolve(&record, occurrence);
        debug!(name = %record.name, ?outcome, delivered, "task fired");
        FiredTask {
            record,
            delivered,
            outcome,
        }
    }

    fn resolve(&self, record: &TaskRecord, occurrence: NaiveDateTime) -> FireOutcome {
        let selector = TaskSelector::exact(record);
        if record.repeat == RepeatPolicy::OneTime {
            return match self.store.mark_completed(&selector) {
                Ok(0) => withdrawn(record),
                Ok(_) => FireOutcome::Completed,
                Err(err) => {
                    warn!(name = %record.name, error = %err, "unable to complete fired task");
                    FireOutcome::ResolveFailed(err.to_string())
                }
            };
        }

        let Some(next) = next_occurrence(occurrence, record.repeat) else {
            warn!(name = %record.name, repeat = %record.repeat, "no next occurrence; leaving task pending");
            return FireOutcome::LeftPending;
        };
        match self.store.complete_and_add(&selector, record.successor(next)) {
            Ok(0) => withdrawn(record),
            Ok(_) => FireOutcome::Rescheduled { next },
            Err(err) => {
                warn!(name = %record.name, error = %err, "unable to reschedule fired task");
                FireOutcome::ResolveFailed(err.to_string())
            }
        }
    }
}

fn withdrawn(record: &TaskRecord) -> FireOutcome {
    info!(name = %record.name, "fired task was removed before it could be resolved");
    FireOutcome::Withdrawn
}
