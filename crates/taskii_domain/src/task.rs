use chrono::{Duration, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Persisted date layout, e.g. `31-01-2025`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";
/// Persisted time layout on a 12-hour clock, e.g. `09:30:00 PM`.
pub const TIME_FORMAT: &str = "%I:%M:%S %p";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum RepeatPolicy {
    #[serde(rename = "One-time")]
    OneTime,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatPolicy {
    pub const ALL: [RepeatPolicy; 5] = [
        RepeatPolicy::OneTime,
        RepeatPolicy::Daily,
        RepeatPolicy::Weekly,
        RepeatPolicy::Monthly,
        RepeatPolicy::Yearly,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RepeatPolicy::OneTime => "One-time",
            RepeatPolicy::Daily => "Daily",
            RepeatPolicy::Weekly => "Weekly",
            RepeatPolicy::Monthly => "Monthly",
            RepeatPolicy::Yearly => "Yearly",
        }
    }

    /// Accepts the persisted labels, case-insensitively, plus `onetime`/`once`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "one-time" | "onetime" | "once" => Some(RepeatPolicy::OneTime),
            "daily" => Some(RepeatPolicy::Daily),
            "weekly" => Some(RepeatPolicy::Weekly),
            "monthly" => Some(RepeatPolicy::Monthly),
            "yearly" => Some(RepeatPolicy::Yearly),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, RepeatPolicy::OneTime)
    }
}

// Reads any label `from_label` accepts so a hand-edited file keeps loading.
impl<'de> Deserialize<'de> for RepeatPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        RepeatPolicy::from_label(&label)
            .ok_or_else(|| de::Error::custom(format!("unknown repeat policy `{label}`")))
    }
}

impl fmt::Display for RepeatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Completed => f.write_str("completed"),
        }
    }
}

/// One scheduled reminder as it lives in the task file.
///
/// `date` and `time` stay in their persisted text form so a record whose
/// timestamp no longer parses is still carried through load and save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: String,
    pub description: String,
    pub time: String,
    pub date: String,
    pub repeat: RepeatPolicy,
    #[serde(default)]
    pub status: TaskStatus,
}

impl TaskRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        occurrence: NaiveDateTime,
        repeat: RepeatPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            time: occurrence.format(TIME_FORMAT).to_string(),
            date: occurrence.format(DATE_FORMAT).to_string(),
            repeat,
            status: TaskStatus::Pending,
        }
    }

    pub fn occurrence(&self) -> Option<NaiveDateTime> {
        parse_date_time(&self.date, &self.time)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// The pending sibling inserted when a recurring record fires.
    pub fn successor(&self, next: NaiveDateTime) -> Self {
        Self::new(self.name.clone(), self.description.clone(), next, self.repeat)
    }
}

pub fn parse_date_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    let combined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&combined, &format!("{DATE_FORMAT} {TIME_FORMAT}")).ok()
}

/// Matches records by name and, optionally, by the persisted date and time.
///
/// Leaving `date` or `time` unset widens the match; every matching record is
/// affected by store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelector {
    pub name: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl TaskSelector {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            time: None,
        }
    }

    pub fn exact(record: &TaskRecord) -> Self {
        Self {
            name: record.name.clone(),
            date: Some(record.date.clone()),
            time: Some(record.time.clone()),
        }
    }

    pub fn at(name: impl Into<String>, occurrence: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            date: Some(occurrence.format(DATE_FORMAT).to_string()),
            time: Some(occurrence.format(TIME_FORMAT).to_string()),
        }
    }

    pub fn matches(&self, record: &TaskRecord) -> bool {
        record.name == self.name
            && self.date.as_ref().map_or(true, |date| &record.date == date)
            && self.time.as_ref().map_or(true, |time| &record.time == time)
    }
}

/// Human readable time remaining until `occurrence`, as shown in the pending table.
pub fn countdown_label(occurrence: NaiveDateTime, now: NaiveDateTime) -> String {
    let diff = occurrence - now;
    if diff <= Duration::zero() {
        return "Due now".to_string();
    }
    let days = diff.num_days();
    let remainder = diff.num_seconds() - days * 86_400;
    let hours = remainder / 3600;
    let minutes = (remainder % 3600) / 60;
    if days > 0 {
        format!("{} {} left", plural(days, "day"), plural(hours, "hour"))
    } else if hours > 0 {
        format!("{} {} left", plural(hours, "hour"), plural(minutes, "minute"))
    } else {
        format!("{} left", plural(minutes, "minute"))
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}
