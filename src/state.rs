//! The immutable pipeline state.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use futures::future::join_all;

use crate::combinators::Merge;
use crate::record::FileRecord;
use crate::task::TaskError;

/// An immutable snapshot of in-memory file records keyed by relative path.
///
/// Every transform returns a new state and leaves the receiver untouched, so
/// snapshots can be shared freely across concurrent pipeline branches without
/// locking. The record map is copied per transform — O(n) in record count,
/// acceptable at typical batch sizes — while payload bytes are
/// reference-counted and shared between snapshots.
#[derive(Debug, Clone)]
pub struct PipelineState {
    root: PathBuf,
    files: HashMap<String, FileRecord>,
}

impl PipelineState {
    /// A fresh, empty state rooted at `root`.
    ///
    /// The root is the base directory for relative ingestion; it is fixed for
    /// the lifetime of the state and of everything derived from it.
    pub fn start_in(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    /// The ingestion base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The record stored under `path`, if any.
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// All records, in no significant order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Insert records, overwriting by path; within one call the last record
    /// for a given path wins.
    pub fn add(&self, records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut files = self.files.clone();
        for record in records {
            files.insert(record.path().to_string(), record);
        }
        Self {
            root: self.root.clone(),
            files,
        }
    }

    /// Replace the collection with exactly these records.
    pub fn set(&self, records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut files = HashMap::new();
        for record in records {
            files.insert(record.path().to_string(), record);
        }
        Self {
            root: self.root.clone(),
            files,
        }
    }

    /// Retain only records satisfying `predicate`.
    pub fn filter(&self, predicate: impl Fn(&FileRecord) -> bool) -> Self {
        let files = self
            .files
            .values()
            .filter(|record| predicate(record))
            .map(|record| (record.path().to_string(), record.clone()))
            .collect();
        Self {
            root: self.root.clone(),
            files,
        }
    }

    /// Transform every record synchronously.
    ///
    /// The result is keyed by each output record's path, so a transform that
    /// renames moves the record's slot; collisions follow the last-wins rule.
    pub fn map(&self, f: impl Fn(FileRecord) -> FileRecord) -> Self {
        let mut files = HashMap::with_capacity(self.files.len());
        for record in self.files.values() {
            let out = f(record.clone());
            files.insert(out.path().to_string(), out);
        }
        Self {
            root: self.root.clone(),
            files,
        }
    }

    /// Transform every record asynchronously.
    ///
    /// All transforms are started concurrently and the new state is assembled
    /// only once every one has settled. All-or-nothing: any failure fails the
    /// whole operation and no partial state is produced.
    pub async fn async_map<F, Fut>(&self, f: F) -> Result<Self, TaskError>
    where
        F: Fn(FileRecord) -> Fut,
        Fut: Future<Output = Result<FileRecord, TaskError>>,
    {
        let settled = join_all(self.files.values().cloned().map(f)).await;

        let mut files = HashMap::with_capacity(settled.len());
        let mut failures = Vec::new();
        for result in settled {
            match result {
                Ok(record) => {
                    files.insert(record.path().to_string(), record);
                }
                Err(e) => failures.push(e),
            }
        }
        if !failures.is_empty() {
            return Err(TaskError::collapse(failures));
        }
        Ok(Self {
            root: self.root.clone(),
            files,
        })
    }
}

impl Merge for PipelineState {
    /// Last-write-wins by path: on conflict the `later` branch's record
    /// supersedes this one's. The root is taken from `self`; branches of one
    /// parallel group share it by construction.
    fn merge(self, later: Self) -> Self {
        self.add(later.files.into_values())
    }
}
