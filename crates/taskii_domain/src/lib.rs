pub mod clock;
pub mod editor;
pub mod error;
pub mod notifications;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod summarize;
pub mod task;
pub mod validation;

pub use crate::editor::TaskEditor;
pub use crate::scheduler::{NotificationScheduler, SchedulerConfig};
pub use crate::store::TaskStore;
pub use crate::task::{RepeatPolicy, TaskRecord, TaskSelector, TaskStatus};
