use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::EditorError;
use crate::store::TaskStore;
use crate::summarize::{summarize_or_original, Summarizer};
use crate::task::{countdown_label, TaskRecord, TaskSelector, TaskStatus};
use crate::validation::{validate_draft, TaskDraft};

/// A task as the pending/completed tables display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub record: TaskRecord,
    pub countdown: Option<String>,
}

/// Foreground create/edit/delete surface over the shared store.
pub struct TaskEditor {
    store: Arc<TaskStore>,
    summarizer: Arc<dyn Summarizer>,
    clock: Arc<dyn Clock>,
}

impl TaskEditor {
    pub fn new(store: Arc<TaskStore>, summarizer: Arc<dyn Summarizer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            summarizer,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: TaskDraft) -> Result<TaskRecord, EditorError> {
        let record = self.prepare(&draft).await?;
        self.store.add(record.clone())?;
        info!(date = %record.date, time = %record.time, repeat = %record.repeat, "task created");
        Ok(record)
    }

    /// Replaces `original` with the edited task; the result always starts pending.
    #[instrument(skip(self, original, draft), fields(name = %original.name))]
    pub async fn edit(&self, original: &TaskRecord, draft: TaskDraft) -> Result<TaskRecord, EditorError> {
        let record = self.prepare(&draft).await?;
        let removed = self
            .store
            .replace(&TaskSelector::exact(original), record.clone())?;
        info!(removed, new_name = %record.name, "task updated");
        Ok(record)
    }

    pub fn delete(&self, record: &TaskRecord) -> Result<usize, EditorError> {
        let removed = self.store.delete(&TaskSelector::exact(record))?;
        info!(name = %record.name, removed, "task deleted");
        Ok(removed)
    }

    pub fn pending_rows(&self) -> Vec<TaskRow> {
        let now = self.clock.now();
        self.store
            .list_by_status(TaskStatus::Pending)
            .into_iter()
            .map(|record| {
                let countdown = match record.occurrence() {
                    Some(occurrence) => countdown_label(occurrence, now),
                    None => "Invalid date/time".to_string(),
                };
                TaskRow {
                    record,
                    countdown: Some(countdown),
                }
            })
            .collect()
    }

    pub fn completed_rows(&self) -> Vec<TaskRow> {
        self.store
            .list_by_status(TaskStatus::Completed)
            .into_iter()
            .map(|record| TaskRow {
                record,
                countdown: None,
            })
            .collect()
    }

    async fn prepare(&self, draft: &TaskDraft) -> Result<TaskRecord, EditorError> {
        let occurrence = validate_draft(draft, self.clock.now())?;
        let description =
            summarize_or_original(self.summarizer.as_ref(), draft.description.trim()).await;
        Ok(TaskRecord::new(
            draft.name.trim(),
            description,
            occurrence,
            draft.repeat,
        ))
    }
}
