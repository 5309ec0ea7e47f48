//! Pipeline stage constructors.
//!
//! Each constructor returns a [`RunnableTask`] over [`PipelineState`], so
//! stages compose with [`series`](crate::series) and
//! [`parallel`](crate::parallel) exactly like plain tasks.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::record::{FileRecord, RecordTransform};
use crate::state::PipelineState;
use crate::task::{stage_fn, RunnableTask, TaskError};

fn compile_patterns(patterns: &[String]) -> Result<GlobSet, TaskError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| TaskError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| TaskError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// Relative paths of the files under `root` matching `set`.
fn matching_paths(root: &Path, set: &GlobSet) -> Result<Vec<String>, TaskError> {
    let mut matched = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            TaskError::Io {
                path,
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed")),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        if set.is_match(&rel) {
            matched.push(rel);
        }
    }
    Ok(matched)
}

/// Stage: expand `patterns` against the state's root, read every matched
/// file, and add the resulting records to the state.
///
/// Reads run concurrently; a failed read fails the stage (failures
/// aggregated) and nothing is added.
pub fn ingest<I, P>(patterns: I) -> RunnableTask<PipelineState>
where
    I: IntoIterator<Item = P>,
    P: Into<String>,
{
    let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
    stage_fn(move |state: PipelineState| {
        let patterns = patterns.clone();
        async move {
            let set = compile_patterns(&patterns)?;
            let root = state.root().to_path_buf();
            let matched = matching_paths(&root, &set)?;
            debug!(root = %root.display(), matched = matched.len(), "ingesting files");

            let reads = matched.into_iter().map(|rel| {
                let abs = root.join(&rel);
                async move {
                    let read = tokio::fs::read(&abs).await;
                    match read {
                        Ok(bytes) => Ok(FileRecord::new(rel, bytes)),
                        Err(source) => Err(TaskError::Io { path: abs, source }),
                    }
                }
            });
            let settled = join_all(reads).await;

            let mut records = Vec::with_capacity(settled.len());
            let mut failures = Vec::new();
            for result in settled {
                match result {
                    Ok(record) => records.push(record),
                    Err(e) => failures.push(e),
                }
            }
            if !failures.is_empty() {
                return Err(TaskError::collapse(failures));
            }
            Ok(state.add(records))
        }
    })
}

/// Stage: retain only records whose path matches any of `patterns`.
pub fn select<I, P>(patterns: I) -> RunnableTask<PipelineState>
where
    I: IntoIterator<Item = P>,
    P: Into<String>,
{
    let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
    stage_fn(move |state: PipelineState| {
        let patterns = patterns.clone();
        async move {
            let set = compile_patterns(&patterns)?;
            Ok(state.filter(|record| set.is_match(record.path())))
        }
    })
}

/// Stage: write every record to `target/<path>`, creating parent directories
/// as needed, and return the state unchanged.
///
/// A side-effecting sink, not a content transform. Writes run concurrently;
/// the stage fails if any write does, with failures aggregated.
pub fn persist(target: impl Into<PathBuf>) -> RunnableTask<PipelineState> {
    let target: PathBuf = target.into();
    stage_fn(move |state: PipelineState| {
        let target = target.clone();
        async move {
            let writes = state.records().map(|record| {
                let dest = target.join(record.path());
                async move {
                    if let Some(parent) = dest.parent() {
                        if let Err(source) = tokio::fs::create_dir_all(parent).await {
                            return Err(TaskError::Io {
                                path: parent.to_path_buf(),
                                source,
                            });
                        }
                    }
                    let written = tokio::fs::write(&dest, record.payload()).await;
                    match written {
                        Ok(()) => Ok(()),
                        Err(source) => Err(TaskError::Io { path: dest, source }),
                    }
                }
            });
            let settled = join_all(writes).await;

            let failures: Vec<TaskError> = settled.into_iter().filter_map(Result::err).collect();
            if !failures.is_empty() {
                return Err(TaskError::collapse(failures));
            }
            debug!(target = %target.display(), records = state.len(), "flushed pipeline state");
            Ok(state)
        }
    })
}

/// Stage: apply a [`RecordTransform`] to every record, via
/// [`PipelineState::async_map`].
pub fn for_each_record(transform: impl RecordTransform + 'static) -> RunnableTask<PipelineState> {
    let transform: Arc<dyn RecordTransform> = Arc::new(transform);
    stage_fn(move |state: PipelineState| {
        let transform = transform.clone();
        async move {
            state
                .async_map(|record| {
                    let transform = transform.clone();
                    async move { transform.apply(record).await }
                })
                .await
        }
    })
}
