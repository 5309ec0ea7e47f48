//! File records and per-record transforms.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::task::TaskError;

/// An immutable file-like value: a normalized relative path plus a byte
/// payload.
///
/// The path is the record's identity within a pipeline state; two records
/// with the same path are the same logical file and the later one supersedes
/// the earlier in any keyed collection. Records are never mutated in place —
/// [`with_path`](Self::with_path) and [`with_payload`](Self::with_payload)
/// derive new records. Payload bytes are reference-counted, so derived
/// records and state snapshots share storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: String,
    payload: Arc<[u8]>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
        }
    }

    /// Relative path, forward-slash separated.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The byte payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// A record with the same payload under a new path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: self.payload.clone(),
        }
    }

    /// A record with the same path and a new payload.
    pub fn with_payload(&self, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: self.path.clone(),
            payload: payload.into(),
        }
    }
}

/// An asynchronous 1:1 transform over file records.
///
/// The seam for per-file work inside a pipeline; lift one into a stage with
/// [`for_each_record`](crate::stages::for_each_record).
#[async_trait]
pub trait RecordTransform: Send + Sync {
    async fn apply(&self, record: FileRecord) -> Result<FileRecord, TaskError>;
}

/// Rename every record through `path_fn`; the payload is untouched.
///
/// Collisions among renamed paths follow the state's last-wins rule.
pub fn rename<F>(path_fn: F) -> impl RecordTransform
where
    F: Fn(&str) -> String + Send + Sync,
{
    Rename { path_fn }
}

struct Rename<F> {
    path_fn: F,
}

#[async_trait]
impl<F> RecordTransform for Rename<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    async fn apply(&self, record: FileRecord) -> Result<FileRecord, TaskError> {
        let path = (self.path_fn)(record.path());
        Ok(record.with_path(path))
    }
}

/// Decode the payload as JSON, apply `f` to the document, and re-encode
/// under the same path.
pub fn map_json<F>(f: F) -> impl RecordTransform
where
    F: Fn(Value) -> Value + Send + Sync,
{
    MapJson { f }
}

struct MapJson<F> {
    f: F,
}

#[async_trait]
impl<F> RecordTransform for MapJson<F>
where
    F: Fn(Value) -> Value + Send + Sync,
{
    async fn apply(&self, record: FileRecord) -> Result<FileRecord, TaskError> {
        let doc: Value =
            serde_json::from_slice(record.payload()).map_err(|source| TaskError::Decode {
                path: record.path().to_string(),
                source,
            })?;
        let doc = (self.f)(doc);
        let payload = serde_json::to_vec(&doc).map_err(|source| TaskError::Encode {
            path: record.path().to_string(),
            source,
        })?;
        Ok(record.with_payload(payload))
    }
}
