// Download worker pool: runs contiguous link ranges concurrently, retrying
// each download and pacing requests per worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::MirrorError;
use crate::fetcher::ResourceFetcher;
use crate::partition::{TaskRange, partition};
use crate::progress::{aggregate_progress, completion_channel};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::rewrite::ResourceLink;

/// A link whose download failed on every attempt.
#[derive(Debug, Clone)]
pub struct FailedDownload {
    pub link: ResourceLink,
    pub destination: PathBuf,
    pub error: String,
}

/// Outcome of one worker's range.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker_index: usize,
    pub succeeded: usize,
    pub bytes: u64,
    pub failed: Vec<FailedDownload>,
}

/// Aggregated outcome of every worker.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub succeeded: usize,
    pub bytes: u64,
    pub failed: Vec<FailedDownload>,
    /// Worker indices in the order their completion signals arrived
    pub completion_order: Vec<usize>,
}

impl PoolReport {
    fn absorb(&mut self, report: WorkerReport) {
        self.succeeded += report.succeeded;
        self.bytes += report.bytes;
        self.failed.extend(report.failed);
    }
}

/// State shared read-only by every worker.
pub struct WorkerContext {
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
    pub request_delay: Duration,
}

/// Downloads the links in `range`, in order, then sends `worker_index` on
/// `completions` exactly once.
///
/// A link that still fails after the retry policy is exhausted is logged and
/// recorded in the report; the worker moves on to its next link.
pub async fn run_worker(
    worker_index: usize,
    links: Arc<[ResourceLink]>,
    range: TaskRange,
    context: Arc<WorkerContext>,
    completions: mpsc::Sender<usize>,
) -> WorkerReport {
    let mut report = WorkerReport {
        worker_index,
        ..WorkerReport::default()
    };

    debug!(worker = worker_index, start = range.start, end = range.end, "Worker started");

    for link in links.get(range.as_range()).unwrap_or_default() {
        let destination = context.output_dir.join(&link.local_path);

        let result = retry_with_backoff(&context.retry, |_| {
            context.fetcher.download_to(&link.absolute_url, &destination)
        })
        .await;

        match result {
            Ok(bytes) => {
                debug!(worker = worker_index, url = %link.absolute_url, bytes, "Downloaded");
                report.succeeded += 1;
                report.bytes += bytes;
            }
            Err(e) => {
                warn!(
                    worker = worker_index,
                    origin = %link.original_reference,
                    url = %link.absolute_url,
                    destination = %destination.display(),
                    error = %e,
                    "Download failed after {} attempts",
                    context.retry.max_attempts.max(1)
                );
                report.failed.push(FailedDownload {
                    link: link.clone(),
                    destination,
                    error: e.to_string(),
                });
            }
        }

        if !context.request_delay.is_zero() {
            tokio::time::sleep(context.request_delay).await;
        }
    }

    if completions.send(worker_index).await.is_err() {
        debug!(worker = worker_index, "Progress aggregator already gone");
    }

    report
}

/// Splits `links` over `worker_count` workers, runs them concurrently and
/// waits until every worker has finished its range.
pub async fn run_pool(
    links: Vec<ResourceLink>,
    worker_count: usize,
    context: Arc<WorkerContext>,
) -> Result<PoolReport, MirrorError> {
    let worker_count = worker_count.max(1);
    let links: Arc<[ResourceLink]> = links.into();
    let total = links.len();

    info!(tasks = total, workers = worker_count, "Dispatching download tasks");

    let (completion_tx, completion_rx) = completion_channel(worker_count);
    let aggregator = tokio::spawn(aggregate_progress(completion_rx, worker_count));

    let handles: Vec<_> = (1..=worker_count)
        .map(|worker_index| {
            let range = partition(total, worker_count, worker_index);
            tokio::spawn(run_worker(
                worker_index,
                Arc::clone(&links),
                range,
                Arc::clone(&context),
                completion_tx.clone(),
            ))
        })
        .collect();
    drop(completion_tx);

    let mut report = PoolReport::default();
    for joined in join_all(handles).await {
        match joined {
            Ok(worker_report) => report.absorb(worker_report),
            Err(e) => error!(error = %e, "Download worker panicked"),
        }
    }

    report.completion_order = aggregator
        .await
        .map_err(|e| MirrorError::internal(format!("progress aggregator failed: {e}")))?;

    Ok(report)
}
