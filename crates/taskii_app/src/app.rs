use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use taskii_domain::{
    clock::{Clock, SystemClock},
    editor::TaskRow,
    notifications::{CommandNotifier, LogNotifier, Notifier},
    summarize::{GeminiSummarizer, PassthroughSummarizer, Summarizer},
    validation::TaskDraft,
    NotificationScheduler, RepeatPolicy, SchedulerConfig, TaskEditor, TaskSelector, TaskStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierKind {
    Desktop,
    Log,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) store_path: PathBuf,
    pub(crate) scheduler: SchedulerConfig,
    pub(crate) notifier: NotifierKind,
    pub(crate) gemini_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`; unset or invalid values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("TASKII_STORE_PATH") {
            if !path.trim().is_empty() {
                config.store_path = PathBuf::from(path.trim());
            }
        }
        if let Some(secs) = lookup("TASKII_POLL_INTERVAL_SECS").and_then(|v| parse_secs(&v)) {
            config.scheduler.poll_interval = secs;
        }
        if let Some(secs) = lookup("TASKII_DUE_WINDOW_SECS").and_then(|v| parse_secs(&v)) {
            config.scheduler.due_window = secs;
        }
        if let Some(kind) = lookup("TASKII_NOTIFIER") {
            match kind.trim().to_ascii_lowercase().as_str() {
                "desktop" => config.notifier = NotifierKind::Desktop,
                "log" => config.notifier = NotifierKind::Log,
                other => warn!(value = other, "unknown TASKII_NOTIFIER; keeping default"),
            }
        }
        config.gemini_api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("task.json"),
            scheduler: SchedulerConfig::default(),
            notifier: NotifierKind::Desktop,
            gemini_api_key: None,
        }
    }
}

fn parse_secs(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    List,
    Add(TaskDraft),
    Edit { original: TaskSelector, draft: TaskDraft },
    Delete(TaskSelector),
    Help,
}

pub const USAGE: &str = "\
usage: taskii <command>

  run                                          start the reminder scheduler
  list                                         show pending and completed tasks
  add NAME DESCRIPTION DD-MM-YYYY HH:MM:SS AM|PM [REPEAT]
  edit NAME DD-MM-YYYY HH:MM:SS AM|PM NEW_NAME DESCRIPTION DD-MM-YYYY HH:MM:SS AM|PM [REPEAT]
  delete NAME [DD-MM-YYYY HH:MM:SS AM|PM]      without a date every task named NAME goes

REPEAT is one of One-time, Daily, Weekly, Monthly, Yearly (default One-time).";

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        match name.as_str() {
            "run" => Ok(Command::Run),
            "list" => Ok(Command::List),
            "add" => parse_draft(rest).map(Command::Add),
            "edit" => {
                if rest.len() < 4 {
                    bail!("edit needs the current NAME DATE TIME AM|PM before the new fields");
                }
                let original = identity(&rest[0], &rest[1], &rest[2], &rest[3]);
                let draft = parse_draft(&rest[4..])?;
                Ok(Command::Edit { original, draft })
            }
            "delete" => match rest {
                [name] => Ok(Command::Delete(TaskSelector::by_name(name.clone()))),
                [name, date, time, meridiem] => {
                    Ok(Command::Delete(identity(name, date, time, meridiem)))
                }
                _ => bail!("delete takes NAME or NAME DATE TIME AM|PM"),
            },
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => Err(anyhow!("unknown command `{other}`")),
        }
    }
}

fn identity(name: &str, date: &str, time: &str, meridiem: &str) -> TaskSelector {
    TaskSelector {
        name: name.to_string(),
        date: Some(date.to_string()),
        time: Some(format!("{time} {}", meridiem.to_ascii_uppercase())),
    }
}

fn parse_draft(args: &[String]) -> Result<TaskDraft> {
    let (fields, repeat) = match args.len() {
        5 => (args, RepeatPolicy::OneTime),
        6 => (
            &args[..5],
            RepeatPolicy::from_label(&args[5])
                .ok_or_else(|| anyhow!("unknown repeat `{}`", args[5]))?,
        ),
        _ => bail!("expected NAME DESCRIPTION DD-MM-YYYY HH:MM:SS AM|PM [REPEAT]"),
    };
    Ok(TaskDraft {
        name: fields[0].clone(),
        description: fields[1].clone(),
        date: fields[2].clone(),
        time: format!("{} {}", fields[3], fields[4].to_ascii_uppercase()),
        repeat,
    })
}

pub async fn run(config: AppConfig, command: Command) -> Result<()> {
    let store = Arc::new(TaskStore::open(&config.store_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Run => run_scheduler(&config, store, clock).await,
        Command::List => {
            let editor = build_editor(&config, store, clock)?;
            print_rows("Pending Tasks", &editor.pending_rows());
            print_rows("Completed Tasks", &editor.completed_rows());
            Ok(())
        }
        Command::Add(draft) => {
            let editor = build_editor(&config, store, clock)?;
            let record = editor.create(draft).await?;
            println!("Task added: {} at {} {}", record.name, record.date, record.time);
            Ok(())
        }
        Command::Edit { original, draft } => {
            let editor = build_editor(&config, store, clock)?;
            let current = editor
                .store()
                .list()
                .into_iter()
                .find(|record| original.matches(record))
                .with_context(|| format!("no task `{}` at that date and time", original.name))?;
            let record = editor.edit(&current, draft).await?;
            println!("Task updated: {} at {} {}", record.name, record.date, record.time);
            Ok(())
        }
        Command::Delete(selector) => {
            let removed = store.delete(&selector)?;
            println!("Deleted {removed} task(s) named `{}`", selector.name);
            Ok(())
        }
    }
}

async fn run_scheduler(
    config: &AppConfig,
    store: Arc<TaskStore>,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Desktop => Arc::new(CommandNotifier),
        NotifierKind::Log => Arc::new(LogNotifier),
    };
    let scheduler = NotificationScheduler::new(store, notifier, clock, config.scheduler);
    let cancel = CancellationToken::new();
    let handle = scheduler.spawn(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    cancel.cancel();
    handle.await.context("scheduler task panicked")?;
    Ok(())
}

fn build_editor(config: &AppConfig, store: Arc<TaskStore>, clock: Arc<dyn Clock>) -> Result<TaskEditor> {
    let summarizer: Arc<dyn Summarizer> = match &config.gemini_api_key {
        Some(key) => Arc::new(GeminiSummarizer::new(key.clone())?),
        None => Arc::new(PassthroughSummarizer),
    };
    Ok(TaskEditor::new(store, summarizer, clock))
}

fn print_rows(heading: &str, rows: &[TaskRow]) {
    println!("{heading}");
    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    for row in rows {
        let record = &row.record;
        let mut line = format!(
            "  {}\t{}\t{}\t{}\t{}",
            record.name, record.description, record.date, record.time, record.repeat
        );
        if let Some(countdown) = &row.countdown {
            line.push('\t');
            line.push_str(countdown);
        }
        println!("{line}");
    }
}
