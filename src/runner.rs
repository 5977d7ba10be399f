use chrono::{DateTime, SubsecRound, Utc};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use crate::config::{validate_pairs, DEFAULT_WORKERS};
use crate::domain::{QueryPair, ResultRow};
use crate::error::{MetricsError, Result};
use crate::search_client::CodeSearch;

type TaskQueue = Arc<Mutex<mpsc::Receiver<QueryPair>>>;

/// Runs query pairs on a fixed pool of workers and collects one
/// [`ResultRow`] per pair.
///
/// Rows come back in completion order, not input order. The first failing
/// count aborts the run; workers still busy finish their current pair and
/// then stop.
pub struct QueryRunner<S> {
    search: Arc<S>,
    workers: usize,
    progress: ProgressBar,
}

impl<S> QueryRunner<S>
where
    S: CodeSearch + Send + Sync + 'static,
{
    /// Create a runner with the default worker count.
    pub fn new(search: Arc<S>) -> Self {
        Self {
            search,
            workers: DEFAULT_WORKERS,
            progress: ProgressBar::hidden(),
        }
    }

    /// Set the number of workers; zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Progress bar advanced once per completed pair.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run all pairs, stamping every row with the same timestamp taken now.
    pub async fn run(&self, pairs: &[QueryPair]) -> Result<Vec<ResultRow>> {
        self.run_at(pairs, run_timestamp()).await
    }

    /// Run all pairs, stamping every row with `now`.
    pub async fn run_at(&self, pairs: &[QueryPair], now: DateTime<Utc>) -> Result<Vec<ResultRow>> {
        validate_pairs(pairs)?;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.workers.min(pairs.len());
        info!("Running {} query pairs on {} workers", pairs.len(), workers);

        let (task_tx, task_rx) = mpsc::channel::<QueryPair>(workers);
        let tasks: TaskQueue = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Result<ResultRow>>(workers);

        let queued = pairs.to_vec();
        tokio::spawn(async move {
            for pair in queued {
                if task_tx.send(pair).await.is_err() {
                    break;
                }
            }
        });

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    self.search.clone(),
                    tasks.clone(),
                    result_tx.clone(),
                    now,
                ))
            })
            .collect();

        // Barrier: the results channel only closes once every worker is done.
        tokio::spawn(async move {
            for outcome in join_all(handles).await {
                if let Err(e) = outcome {
                    error!("Query worker died: {}", e);
                    let _ = result_tx
                        .send(Err(MetricsError::Worker(e.to_string())))
                        .await;
                }
            }
            drop(result_tx);
        });

        let mut rows = Vec::with_capacity(pairs.len());
        while let Some(outcome) = result_rx.recv().await {
            let row = outcome?;
            self.progress.inc(1);
            rows.push(row);
        }

        if rows.len() != pairs.len() {
            return Err(MetricsError::Worker(format!(
                "expected {} results, got {}",
                pairs.len(),
                rows.len()
            )));
        }

        info!("All {} query pairs completed", rows.len());
        Ok(rows)
    }
}

/// Current time truncated to milliseconds, the precision rows are stored at.
pub fn run_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Pull pairs off the queue until it is empty, the run failed or the
/// caller stopped listening.
async fn worker<S>(
    id: usize,
    search: Arc<S>,
    tasks: TaskQueue,
    results: mpsc::Sender<Result<ResultRow>>,
    now: DateTime<Utc>,
) where
    S: CodeSearch + Send + Sync + 'static,
{
    loop {
        if results.is_closed() {
            break;
        }

        let next = tasks.lock().await.recv().await;
        let Some(pair) = next else {
            break;
        };

        debug!(worker = id, query = %pair.name, "running query pair");
        let outcome = count_pair(search.as_ref(), &pair, now).await;
        if let Err(e) = &outcome {
            error!(worker = id, query = %pair.name, "error querying code: {}", e);
        }

        let failed = outcome.is_err();
        if results.send(outcome).await.is_err() || failed {
            break;
        }
    }
    debug!(worker = id, "worker finished");
}

/// Count the old and new query of one pair concurrently.
async fn count_pair<S: CodeSearch>(
    search: &S,
    pair: &QueryPair,
    now: DateTime<Utc>,
) -> Result<ResultRow> {
    let old_search = pair.old_search();
    let new_search = pair.new_search();
    let (old_count, new_count) =
        tokio::try_join!(search.count(&old_search), search.count(&new_search))?;

    Ok(ResultRow {
        timestamp: now,
        project_id: pair.project_id,
        query_name: pair.name.clone(),
        old_count,
        new_count,
    })
}
