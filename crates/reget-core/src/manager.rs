//! Download orchestrator
//!
//! Owns the worker pool and the per-task stop signals, drives the transfer
//! engine and reconciles its outcomes with the store.

use crate::engine::{HttpDownloader, ProgressSink, StopSignal};
use crate::error::RegetError;
use crate::pager::TaskPages;
use crate::policy::BandwidthPolicy;
use crate::store::TaskStore;
use async_trait::async_trait;
use reget_types::TaskStatus;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Size of the fixed worker pool. Submissions beyond this queue on the
/// semaphore without bound.
const WORKER_COUNT: usize = 3;

/// Supervises transfer jobs and exposes the task lifecycle.
pub struct DownloadManager {
    store: TaskStore,
    http: HttpDownloader,
    policy: Arc<BandwidthPolicy>,
    /// Per-task stop signals, mutated only here on `resume`. Each running
    /// job holds a read-only clone of its own entry, never the map.
    signals: Arc<RwLock<HashMap<i64, Arc<StopSignal>>>>,
    handles: Arc<RwLock<Vec<JoinHandle<()>>>>,
    workers: Arc<Semaphore>,
}

impl DownloadManager {
    /// Open the store at `db_path` and stand up an idle pool.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, RegetError> {
        let store = TaskStore::open(db_path).await?;
        Ok(Self {
            store,
            http: HttpDownloader::new(),
            policy: Arc::new(BandwidthPolicy::new()),
            signals: Arc::new(RwLock::new(HashMap::new())),
            handles: Arc::new(RwLock::new(Vec::new())),
            workers: Arc::new(Semaphore::new(WORKER_COUNT)),
        })
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Create a task and immediately start downloading it.
    pub async fn add(&self, url: &str, target: &Path) -> Result<i64, RegetError> {
        url::Url::parse(url).map_err(|_| RegetError::InvalidUrl(url.to_string()))?;

        let id = self.store.create(url, target).await?;
        info!(id, url, "task created");
        self.resume(id).await?;
        Ok(id)
    }

    /// Start (or restart) the transfer for `id` from its persisted offset.
    ///
    /// The task is marked RUNNING before the job thread gets a worker permit,
    /// reflecting intent rather than observed progress.
    pub async fn resume(&self, id: i64) -> Result<(), RegetError> {
        let task = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(RegetError::NotFound(id))?;

        let stop = Arc::new(StopSignal::new());
        self.signals.write().await.insert(id, Arc::clone(&stop));

        self.store
            .update_status(id, TaskStatus::Running, task.last_byte)
            .await?;

        let store = self.store.clone();
        let http = self.http.clone();
        let policy = Arc::clone(&self.policy);
        let workers = Arc::clone(&self.workers);
        let start_at = task.last_byte;
        let url = task.url;
        let target = task.target;

        let handle = tokio::spawn(async move {
            let _permit = match workers.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            // Paused while still queued behind the pool.
            if stop.is_stopped() {
                return;
            }

            let sink = StoreProgress {
                store: store.clone(),
                id,
            };

            match http
                .download(&url, &target, start_at as u64, &sink, stop, policy)
                .await
            {
                Ok(outcome) if outcome.interrupted => {
                    info!(id, "transfer stopped; keeping the paused state");
                }
                Ok(outcome) => {
                    let last = if outcome.total_len > 0 {
                        outcome.total_len
                    } else {
                        start_at
                    };
                    if let Err(e) = store.update_status(id, TaskStatus::Completed, last).await {
                        error!(id, "failed to record completion: {e}");
                    } else {
                        info!(id, last_byte = last, "download completed");
                    }
                }
                Err(e) => {
                    error!(id, "transfer failed: {e}");
                    if let Err(e) = store.update_status(id, TaskStatus::Error, start_at).await {
                        error!(id, "failed to record error state: {e}");
                    }
                }
            }
        });

        let mut handles = self.handles.write().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);

        Ok(())
    }

    /// Signal the running job (if any) to stop and persist PAUSED.
    ///
    /// Fire-and-forget: the worker observes the flag at its next chunk
    /// boundary, so a little more progress may land after this returns.
    pub async fn pause(&self, id: i64) -> Result<(), RegetError> {
        if let Some(stop) = self.signals.read().await.get(&id) {
            stop.stop();
        }

        let task = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(RegetError::NotFound(id))?;

        self.store
            .update_status(id, TaskStatus::Paused, task.last_byte)
            .await?;
        info!(id, "task paused");
        Ok(())
    }

    pub fn set_limit(&self, bps: i64) {
        self.policy.set_limit(bps);
    }

    pub fn limit(&self) -> u64 {
        self.policy.limit()
    }

    /// Lazy, batch-fetching view over all stored tasks.
    pub fn pages(&self, batch_size: i64) -> TaskPages {
        TaskPages::new(self.store.clone(), batch_size)
    }

    /// Abort all in-flight jobs and close the store.
    ///
    /// Jobs are abandoned, not drained; a task RUNNING at this point may stay
    /// recorded as RUNNING with no worker behind it.
    pub async fn close(&self) {
        for handle in self.handles.write().await.drain(..) {
            handle.abort();
        }
        self.store.close().await;
    }
}

/// Persists engine progress reports, absorbing storage failures so a
/// transient database error never aborts an in-progress transfer.
struct StoreProgress {
    store: TaskStore,
    id: i64,
}

#[async_trait]
impl ProgressSink for StoreProgress {
    async fn on_progress(&self, bytes_written: u64, total_bytes: i64) {
        if let Err(e) = self
            .store
            .update_progress(self.id, bytes_written as i64, total_bytes)
            .await
        {
            warn!(id = self.id, "progress update dropped: {e}");
        }
    }
}
