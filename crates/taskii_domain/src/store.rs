use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::task::{TaskRecord, TaskSelector, TaskStatus};

/// What reading the task file produced before fallbacks are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(Vec<TaskRecord>),
    Missing,
    Corrupt(String),
}

impl LoadOutcome {
    /// Missing and corrupt files both read as an empty collection.
    pub fn into_records(self) -> Vec<TaskRecord> {
        match self {
            LoadOutcome::Loaded(records) => records,
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => Vec::new(),
        }
    }
}

/// Durable collection of task records backed by a single JSON file.
///
/// Every operation re-reads the file, so edits made outside this process are
/// picked up. Mutations run load-modify-save under one lock; callers sharing a
/// store through `Arc` never interleave their writes.
pub struct TaskStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl TaskStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        let _lock = self.guard.lock();
        self.load()
    }

    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        self.list()
            .into_iter()
            .filter(|record| record.status == status)
            .collect()
    }

    /// Appends without checking identity; duplicates are allowed.
    pub fn add(&self, record: TaskRecord) -> Result<(), StoreError> {
        self.mutate(|records| records.push(record))
    }

    /// Removes every record matched by `selector`, returning how many went.
    pub fn delete(&self, selector: &TaskSelector) -> Result<usize, StoreError> {
        self.mutate(|records| remove_matching(records, selector))
    }

    /// Marks every record matched by `selector` completed, in place.
    pub fn mark_completed(&self, selector: &TaskSelector) -> Result<usize, StoreError> {
        self.mutate(|records| complete_matching(records, selector))
    }

    /// Swaps the records matched by `selector` for `replacement` in one write.
    pub fn replace(
        &self,
        selector: &TaskSelector,
        replacement: TaskRecord,
    ) -> Result<usize, StoreError> {
        self.mutate(|records| {
            let removed = remove_matching(records, selector);
            records.push(replacement);
            removed
        })
    }

    /// Marks the matched records completed and appends `successor` in one write.
    ///
    /// When nothing matches (the record was deleted or edited since it was
    /// read) the successor is dropped and `0` is returned.
    pub fn complete_and_add(
        &self,
        selector: &TaskSelector,
        successor: TaskRecord,
    ) -> Result<usize, StoreError> {
        self.mutate(|records| {
            let updated = complete_matching(records, selector);
            if updated > 0 {
                records.push(successor);
            }
            updated
        })
    }

    /// Reads the backing file and reports what was found, without fallbacks.
    pub fn inspect(&self) -> LoadOutcome {
        let _lock = self.guard.lock();
        read_collection(&self.path)
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut Vec<TaskRecord>) -> R) -> Result<R, StoreError> {
        let _lock = self.guard.lock();
        let mut records = self.load();
        let result = apply(&mut records);
        write_collection(&self.path, &records)?;
        Ok(result)
    }

    fn load(&self) -> Vec<TaskRecord> {
        let outcome = read_collection(&self.path);
        match &outcome {
            LoadOutcome::Loaded(records) => {
                debug!(path = %self.path.display(), count = records.len(), "loaded tasks");
            }
            LoadOutcome::Missing => {
                debug!(path = %self.path.display(), "task file absent; starting empty");
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(path = %self.path.display(), %reason, "task file unreadable; treating as empty");
            }
        }
        outcome.into_records()
    }
}

fn remove_matching(records: &mut Vec<TaskRecord>, selector: &TaskSelector) -> usize {
    let before = records.len();
    records.retain(|record| !selector.matches(record));
    before - records.len()
}

fn complete_matching(records: &mut [TaskRecord], selector: &TaskSelector) -> usize {
    let mut updated = 0;
    for record in records.iter_mut().filter(|record| selector.matches(record)) {
        record.status = TaskStatus::Completed;
        updated += 1;
    }
    updated
}

fn read_collection(path: &Path) -> LoadOutcome {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(err) => return LoadOutcome::Corrupt(err.to_string()),
    };
    match serde_json::from_slice::<Vec<TaskRecord>>(&bytes) {
        Ok(records) => LoadOutcome::Loaded(records),
        Err(err) => LoadOutcome::Corrupt(err.to_string()),
    }
}

fn write_collection(path: &Path, records: &[TaskRecord]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(records)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let staging = staging_path(path);
    fs::write(&staging, json).map_err(|source| StoreError::Write {
        path: staging.clone(),
        source,
    })?;
    fs::rename(&staging, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "tasks.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
