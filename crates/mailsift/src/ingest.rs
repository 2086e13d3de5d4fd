//! Directory ingestion with a bounded number of parses in flight.

use crate::sink::Sink;
use anyhow::Context;
use mailsift_mime::{ParsedMessage, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome counts of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Files found.
    pub total: usize,
    /// Messages handed to the sink.
    pub stored: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
}

/// Parses every regular file in `dir` and stores the results in `sink`.
///
/// At most `jobs` files are read and parsed at once. Results reach the
/// sink in completion order, from this task only. A file that fails to
/// read or parse is logged and counted; a sink failure aborts the run.
pub async fn ingest_directory<S: Sink>(
    dir: &Path,
    parser: Arc<Parser>,
    jobs: usize,
    sink: &mut S,
) -> anyhow::Result<Summary> {
    let files = list_files(dir).await?;
    let total = files.len();
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    tracing::info!(dir = %dir.display(), total, jobs, "Starting ingestion");

    let mut tasks = JoinSet::new();
    for path in files {
        tasks.spawn(parse_file(path, semaphore.clone(), parser.clone()));
    }

    let mut summary = Summary {
        total,
        ..Summary::default()
    };
    while let Some(joined) = tasks.join_next().await {
        let (path, result) = joined.context("ingestion task panicked")?;
        let source = source_name(&path);

        match result {
            Ok(message) => {
                sink.store(&source, &message)
                    .with_context(|| format!("storing {source}"))?;
                summary.stored += 1;
            }
            Err(e) => {
                tracing::warn!(file = %source, error = %format!("{e:#}"), "Skipping message");
                summary.failed += 1;
            }
        }

        let done = summary.stored + summary.failed;
        tracing::info!(done, total, "Progress");
    }

    sink.finish()?;
    Ok(summary)
}

async fn parse_file(
    path: PathBuf,
    semaphore: Arc<Semaphore>,
    parser: Arc<Parser>,
) -> (PathBuf, anyhow::Result<ParsedMessage>) {
    let result = read_and_parse(&path, &semaphore, parser).await;
    (path, result)
}

/// Reads and parses one file once a worker permit is free.
async fn read_and_parse(
    path: &Path,
    semaphore: &Semaphore,
    parser: Arc<Parser>,
) -> anyhow::Result<ParsedMessage> {
    let _permit = semaphore.acquire().await.context("worker pool closed")?;

    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let message = tokio::task::spawn_blocking(move || parser.parse(&raw))
        .await
        .context("parser task panicked")??;

    Ok(message)
}

/// Regular files directly inside `dir`, sorted by path.
async fn list_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("listing {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    Ok(files)
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}
