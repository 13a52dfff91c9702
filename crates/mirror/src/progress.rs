// Progress aggregation: counts worker completion signals and logs running totals.

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Bounded channel with one slot per worker, so a completing worker never waits.
pub fn completion_channel(worker_count: usize) -> (mpsc::Sender<usize>, mpsc::Receiver<usize>) {
    mpsc::channel(worker_count.max(1))
}

/// Consumes exactly `worker_count` completion signals (worker indices) and
/// returns them in arrival order. Stops early if every sender is dropped
/// before all workers reported. The receiver is closed on return.
pub async fn aggregate_progress(
    mut completions: mpsc::Receiver<usize>,
    worker_count: usize,
) -> Vec<usize> {
    let width = worker_count.to_string().len();
    let mut arrivals = Vec::with_capacity(worker_count);

    while arrivals.len() < worker_count {
        let Some(worker_index) = completions.recv().await else {
            warn!(
                reported = arrivals.len(),
                expected = worker_count,
                "Completion channel closed before every worker reported"
            );
            break;
        };
        arrivals.push(worker_index);
        let done = arrivals.len();
        info!(
            worker = worker_index,
            done,
            total = worker_count,
            "Worker {worker_index:0width$} finished, progress {done:0width$}/{worker_count}"
        );
    }

    completions.close();
    arrivals
}
