use std::process::Command;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tracing::info;

/// How long a desktop notification stays on screen.
pub const NOTIFICATION_TIMEOUT_SECS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
}

/// Delivery backends implement this trait.
///
/// Delivery is best-effort: the scheduler logs an `Err` and moves on.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log instead of the desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!(%title, %body, "reminder");
        Ok(())
    }
}

/// Hands notifications to the platform notifier command.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandNotifier;

impl CommandNotifier {
    #[cfg(target_os = "macos")]
    fn command(title: &str, body: &str) -> Command {
        let script = format!(
            "display notification {} with title {}",
            applescript_quote(body),
            applescript_quote(title)
        );
        let mut command = Command::new("osascript");
        command.arg("-e").arg(script);
        command
    }

    #[cfg(not(target_os = "macos"))]
    fn command(title: &str, body: &str) -> Command {
        let mut command = Command::new("notify-send");
        command
            .arg("--expire-time")
            .arg((NOTIFICATION_TIMEOUT_SECS * 1000).to_string())
            .arg("--")
            .arg(title)
            .arg(body);
        command
    }
}

#[cfg(target_os = "macos")]
fn applescript_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        let mut command = Self::command(title, body);
        let status = command
            .status()
            .with_context(|| format!("unable to launch {:?}", command.get_program()))?;
        if !status.success() {
            bail!("{:?} exited with {status}", command.get_program());
        }
        Ok(())
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<NotificationRequest>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<NotificationRequest> {
        self.delivered.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.delivered.lock().push(NotificationRequest {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
