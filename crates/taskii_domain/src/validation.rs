use chrono::NaiveDateTime;

use crate::error::ValidationError;
use crate::task::{parse_date_time, RepeatPolicy};

/// Raw editor input for a task, before validation and summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub repeat: RepeatPolicy,
}

pub fn parse_occurrence(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    parse_date_time(date, time).ok_or_else(|| ValidationError::Unparseable {
        date: date.trim().to_string(),
        time: time.trim().to_string(),
    })
}

/// Accepts an occurrence only if it is strictly after `now`.
pub fn ensure_future(occurrence: NaiveDateTime, now: NaiveDateTime) -> Result<(), ValidationError> {
    if occurrence > now {
        Ok(())
    } else {
        Err(ValidationError::NotInFuture)
    }
}

/// Checks a draft and returns its parsed occurrence.
pub fn validate_draft(draft: &TaskDraft, now: NaiveDateTime) -> Result<NaiveDateTime, ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if draft.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    let occurrence = parse_occurrence(&draft.date, &draft.time)?;
    ensure_future(occurrence, now)?;
    Ok(occurrence)
}
