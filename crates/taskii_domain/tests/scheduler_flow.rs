use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use taskii_domain::{
    clock::FixedClock,
    notifications::{Notifier, RecordingNotifier},
    scheduler::FireOutcome,
    summarize::PassthroughSummarizer,
    validation::TaskDraft,
    NotificationScheduler, RepeatPolicy, SchedulerConfig, TaskEditor, TaskRecord, TaskSelector,
    TaskStatus, TaskStore,
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _title: &str, _body: &str) -> anyhow::Result<()> {
        Err(anyhow!("notification daemon unavailable"))
    }
}

/// Deletes every record with the notified title, as a user would from the
/// editor while the reminder is on screen.
struct DeletingNotifier {
    store: Arc<TaskStore>,
}

impl Notifier for DeletingNotifier {
    fn notify(&self, title: &str, _body: &str) -> anyhow::Result<()> {
        self.store.delete(&TaskSelector::by_name(title))?;
        Ok(())
    }
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

fn scheduler(
    store: &Arc<TaskStore>,
    notifier: Arc<dyn Notifier>,
    clock: &Arc<FixedClock>,
) -> NotificationScheduler {
    NotificationScheduler::new(
        Arc::clone(store),
        notifier,
        clock.clone(),
        SchedulerConfig::default(),
    )
}

fn open_store(dir: &Path) -> Arc<TaskStore> {
    Arc::new(TaskStore::open(dir.join("task.json")))
}

#[tokio::test]
async fn monthly_task_fires_once_and_reschedules_with_clamp() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let now = at(2025, 1, 31, 10, 0, 0);
    let clock = Arc::new(FixedClock::new(now));
    let editor = TaskEditor::new(
        Arc::clone(&store),
        Arc::new(PassthroughSummarizer),
        clock.clone(),
    );

    let created = editor
        .create(TaskDraft {
            name: "Pay rent".into(),
            description: "Transfer to landlord".into(),
            date: "31-01-2025".into(),
            time: "10:00:45 AM".into(),
            repeat: RepeatPolicy::Monthly,
        })
        .await
        .expect("create task");

    let notifier = Arc::new(RecordingNotifier::new());
    let report = scheduler(&store, notifier.clone(), &clock).run_cycle();

    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Pay rent");
    assert_eq!(delivered[0].body, "Transfer to landlord");
    assert_eq!(
        report.fired[0].outcome,
        FireOutcome::Rescheduled {
            next: at(2025, 2, 28, 10, 0, 45)
        }
    );

    let records = store.list();
    assert_eq!(records.len(), 2);
    let completed: Vec<&TaskRecord> = records
        .iter()
        .filter(|record| record.status == TaskStatus::Completed)
        .collect();
    let pending: Vec<&TaskRecord> = records.iter().filter(|record| record.is_pending()).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].occurrence(), created.occurrence());
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].date, "28-02-2025");
    assert_eq!(pending[0].time, "10:00:45 AM");
    assert_eq!(pending[0].repeat, RepeatPolicy::Monthly);
    assert_eq!(pending[0].description, "Transfer to landlord");

    // A second pass in the same window must not fire again.
    clock.advance(ChronoDuration::seconds(30));
    let again = scheduler(&store, notifier.clone(), &clock).run_cycle();
    assert!(again.fired.is_empty());
    assert_eq!(notifier.delivered().len(), 1);
}

#[test]
fn one_time_task_completes_without_new_record() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let now = at(2025, 6, 1, 18, 0, 0);
    store
        .add(TaskRecord::new(
            "Call Mom",
            "Weekend plans",
            now + ChronoDuration::seconds(20),
            RepeatPolicy::OneTime,
        ))
        .unwrap();
    store
        .add(TaskRecord::new(
            "Later",
            "Not yet",
            now + ChronoDuration::seconds(90),
            RepeatPolicy::OneTime,
        ))
        .unwrap();

    let clock = Arc::new(FixedClock::new(now));
    let notifier = Arc::new(RecordingNotifier::new());
    let report = scheduler(&store, notifier.clone(), &clock).run_cycle();

    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].outcome, FireOutcome::Completed);
    let records = store.list();
    assert_eq!(records.len(), 2);
    let call = records.iter().find(|r| r.name == "Call Mom").unwrap();
    assert_eq!(call.status, TaskStatus::Completed);
    let later = records.iter().find(|r| r.name == "Later").unwrap();
    assert_eq!(later.status, TaskStatus::Pending);
}

#[test]
fn overdue_and_unparseable_records_are_not_fired() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("task.json");
    fs::write(
        &path,
        r#"[
  {"name": "Broken", "description": "bad time", "time": "7 o'clock", "date": "01-06-2025", "repeat": "Daily"},
  {"name": "Missed", "description": "too late", "time": "05:59:50 PM", "date": "01-06-2025", "repeat": "Daily"},
  {"name": "Done", "description": "already", "time": "06:00:10 PM", "date": "01-06-2025", "repeat": "One-time", "status": "completed"}
]"#,
    )
    .unwrap();
    let store = Arc::new(TaskStore::open(&path));
    let clock = Arc::new(FixedClock::new(at(2025, 6, 1, 18, 0, 0)));
    let notifier = Arc::new(RecordingNotifier::new());

    let report = scheduler(&store, notifier.clone(), &clock).run_cycle();

    assert!(report.fired.is_empty());
    assert_eq!(report.skipped_unparseable, 1);
    assert!(notifier.delivered().is_empty());
    assert_eq!(store.list().len(), 3);
}

#[test]
fn delivery_failure_still_resolves_task() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let now = at(2024, 2, 29, 7, 30, 0);
    store
        .add(TaskRecord::new(
            "Leap stretch",
            "Move",
            now + ChronoDuration::seconds(5),
            RepeatPolicy::Yearly,
        ))
        .unwrap();

    let clock = Arc::new(FixedClock::new(now));
    let report = scheduler(&store, Arc::new(FailingNotifier), &clock).run_cycle();

    assert_eq!(report.fired.len(), 1);
    assert!(!report.fired[0].delivered);
    let pending = store.list_by_status(TaskStatus::Pending);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].date, "28-02-2025");
    assert_eq!(store.list_by_status(TaskStatus::Completed).len(), 1);
}

#[test]
fn task_deleted_during_delivery_is_not_resurrected() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let now = at(2025, 6, 1, 9, 0, 0);
    store
        .add(TaskRecord::new(
            "Gym",
            "Leg day",
            now + ChronoDuration::seconds(10),
            RepeatPolicy::Daily,
        ))
        .unwrap();
    store
        .add(TaskRecord::new(
            "Pharmacy",
            "Pick up prescription",
            now + ChronoDuration::seconds(20),
            RepeatPolicy::OneTime,
        ))
        .unwrap();

    let clock = Arc::new(FixedClock::new(now));
    let notifier = Arc::new(DeletingNotifier {
        store: Arc::clone(&store),
    });
    let report = scheduler(&store, notifier, &clock).run_cycle();

    assert_eq!(report.fired.len(), 2);
    assert!(report
        .fired
        .iter()
        .all(|fired| fired.delivered && fired.outcome == FireOutcome::Withdrawn));
    assert!(store.list().is_empty());
}

#[test]
fn write_failures_are_reported_per_task() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("task.json");
    let now = at(2025, 6, 1, 9, 0, 0);
    let records = vec![
        TaskRecord::new(
            "Call bank",
            "Card limit",
            now + ChronoDuration::seconds(10),
            RepeatPolicy::OneTime,
        ),
        TaskRecord::new(
            "Water plants",
            "Balcony",
            now + ChronoDuration::seconds(20),
            RepeatPolicy::Daily,
        ),
    ];
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();
    let before = fs::read_to_string(&path).unwrap();
    // The staging file cannot be created while a directory holds its name.
    fs::create_dir(temp.path().join("task.json.tmp")).unwrap();

    let store = Arc::new(TaskStore::open(&path));
    let clock = Arc::new(FixedClock::new(now));
    let notifier = Arc::new(RecordingNotifier::new());
    let report = scheduler(&store, notifier.clone(), &clock).run_cycle();

    assert_eq!(report.fired.len(), 2);
    assert!(report
        .fired
        .iter()
        .all(|fired| matches!(fired.outcome, FireOutcome::ResolveFailed(_))));
    assert_eq!(notifier.delivered().len(), 2);
    assert_eq!(store.list(), records);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn concurrent_writers_do_not_lose_updates() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let base = at(2030, 1, 1, 9, 0, 0);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    let occurrence = base + ChronoDuration::minutes(worker * 100 + i);
                    store
                        .add(TaskRecord::new(
                            format!("task-{worker}"),
                            "bulk",
                            occurrence,
                            RepeatPolicy::Daily,
                        ))
                        .expect("add");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    assert_eq!(store.list().len(), 40);
}

#[tokio::test]
async fn background_loop_fires_and_stops_on_cancel() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let now = at(2025, 3, 10, 12, 0, 0);
    store
        .add(TaskRecord::new(
            "Stand up",
            "Stretch your legs",
            now + ChronoDuration::seconds(10),
            RepeatPolicy::Daily,
        ))
        .unwrap();

    let clock = Arc::new(FixedClock::new(now));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = SchedulerConfig {
        poll_interval: Duration::from_millis(10),
        ..SchedulerConfig::default()
    };
    let scheduler = NotificationScheduler::new(Arc::clone(&store), notifier.clone(), clock, config);

    let cancel = CancellationToken::new();
    let handle = scheduler.spawn(cancel.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while notifier.delivered().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Let a few more cycles run against the already resolved record.
    tokio::time::sleep(Duration::from_millis(50)).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop stops after cancel")
        .expect("loop task did not panic");

    assert_eq!(notifier.delivered().len(), 1);
    let pending = store.list_by_status(TaskStatus::Pending);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].date, "11-03-2025");
}
