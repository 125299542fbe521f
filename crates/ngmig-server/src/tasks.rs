//! Asynchronous task wrapper for long-running discovery and import runs.
//!
//! [`AsyncTaskHandler`] turns a blocking body into a persisted task:
//!
//! 1. `submit` checks the dedup cache for `"{account}:{request_type}"`. A hit
//!    returns the in-flight task id instead of starting new work.
//! 2. Otherwise a fresh id is cached and a `PROCESSING` record is stored. If
//!    that insert fails, the cache entry and any partial record are rolled
//!    back and the caller gets [`ServerError::Submission`].
//! 3. The body waits for a worker permit, then runs on the blocking pool.
//!    Its result moves the record to `DONE` or `ERROR` exactly once, and the
//!    cache entry is dropped so the next submission starts fresh.
//!
//! The check-cache / insert-record / spawn sequence runs under one async
//! mutex, so two concurrent submissions for the same key never both start.
//! A spawned task waits on a start signal sent after its handle is in
//! `running`, so a finished task never leaves a stale handle behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ngmig_core::{AsyncTaskRecord, TaskRequestType, TaskStatus};
use ngmig_storage::TaskStore;

use crate::config::TaskHandlerConfig;
use crate::error::ServerError;

/// Task record store shared between submitters and workers.
pub type SharedTaskStore = Arc<tokio::sync::Mutex<dyn TaskStore>>;

/// The blocking work a task performs. Its `Ok` value becomes the record's
/// response payload.
pub type TaskBody = Box<dyn FnOnce() -> Result<serde_json::Value, ServerError> + Send + 'static>;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct AsyncTaskHandler {
    config: TaskHandlerConfig,
    store: SharedTaskStore,
    dedup: Cache<String, String>,
    submit_lock: tokio::sync::Mutex<()>,
    permits: Arc<Semaphore>,
    running: DashMap<String, JoinHandle<()>>,
    accepting: AtomicBool,
}

impl std::fmt::Debug for AsyncTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTaskHandler")
            .field("config", &self.config)
            .field("in_flight", &self.running.len())
            .field("accepting", &self.accepting.load(Ordering::Acquire))
            .finish()
    }
}

fn dedup_key(account_id: &str, request_type: TaskRequestType) -> String {
    format!("{}:{}", account_id, request_type.as_str())
}

impl AsyncTaskHandler {
    pub fn start(config: TaskHandlerConfig, store: SharedTaskStore) -> Arc<Self> {
        let dedup = Cache::builder()
            .max_capacity(config.max_pending)
            .time_to_live(config.dedup_ttl)
            .build();
        let permits = Arc::new(Semaphore::new(config.workers.max(1)));
        info!(workers = config.workers, ttl_secs = config.dedup_ttl.as_secs(), "task handler started");
        Arc::new(AsyncTaskHandler {
            config,
            store,
            dedup,
            submit_lock: tokio::sync::Mutex::new(()),
            permits,
            running: DashMap::new(),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &TaskHandlerConfig {
        &self.config
    }

    /// Registers a task and schedules `body`, or returns the id of the task
    /// already in flight for the same account and request type.
    pub async fn submit(
        self: &Arc<Self>,
        account_id: &str,
        request_type: TaskRequestType,
        payload: serde_json::Value,
        body: TaskBody,
    ) -> Result<String, ServerError> {
        let _guard = self.submit_lock.lock().await;
        if !self.accepting.load(Ordering::Acquire) {
            return Err(ServerError::ShuttingDown);
        }

        let key = dedup_key(account_id, request_type);
        if let Some(existing) = self.dedup.get(&key).await {
            debug!(%key, task_id = %existing, "task already in flight");
            return Ok(existing);
        }

        let task_id = Uuid::new_v4().to_string();
        self.dedup.insert(key.clone(), task_id.clone()).await;

        let record = AsyncTaskRecord::processing(&task_id, account_id, request_type, payload);
        let inserted = self.store.lock().await.insert_task(&record);
        if let Err(err) = inserted {
            self.dedup.invalidate(&key).await;
            if let Err(cleanup) = self.store.lock().await.delete_task(&task_id) {
                debug!(%task_id, error = %cleanup, "no partial record to remove");
            }
            warn!(%key, error = %err, "task submission rolled back");
            return Err(ServerError::Submission(err.to_string()));
        }

        // The task only starts once its handle is registered, so its own
        // removal from `running` always comes after the insert.
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let handler = Arc::clone(self);
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            if start_rx.await.is_ok() {
                handler.run(id, key, body).await;
            }
        });
        self.running.insert(task_id.clone(), handle);
        let _ = start_tx.send(());

        info!(%task_id, account_id, request_type = request_type.as_str(), "task submitted");
        Ok(task_id)
    }

    async fn run(self: Arc<Self>, task_id: String, key: String, body: TaskBody) {
        let outcome = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => {
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    body()
                })
                .await;
                match joined {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(join) if join.is_panic() => Err("task panicked".to_string()),
                    Err(join) => Err(format!("task cancelled: {join}")),
                }
            }
            Err(_) => Err("task handler closed".to_string()),
        };

        self.finish(&task_id, outcome).await;
        self.dedup.invalidate(&key).await;
        self.running.remove(&task_id);
    }

    async fn finish(&self, task_id: &str, outcome: Result<serde_json::Value, String>) {
        let mut store = self.store.lock().await;
        let mut record = match store.get_task(task_id) {
            Ok(record) => record,
            Err(err) => {
                error!(task_id, error = %err, "task record vanished");
                return;
            }
        };
        if record.status.is_terminal() {
            return;
        }
        match outcome {
            Ok(response) => {
                record.mark_done(response);
                info!(task_id, "task done");
            }
            Err(message) => {
                warn!(task_id, error = %message, "task failed");
                record.mark_error(message);
            }
        }
        if let Err(err) = store.update_task(&record) {
            error!(task_id, error = %err, "failed to persist task outcome");
        }
    }

    /// Returns the record for `task_id` if it belongs to `account_id`.
    pub async fn poll(
        &self,
        account_id: &str,
        task_id: &str,
    ) -> Result<AsyncTaskRecord, ServerError> {
        let record = self.store.lock().await.get_task(task_id)?;
        if record.account_id != account_id {
            return Err(ServerError::NotFound(format!("task {task_id}")));
        }
        Ok(record)
    }

    pub async fn list(&self, account_id: &str) -> Result<Vec<AsyncTaskRecord>, ServerError> {
        Ok(self.store.lock().await.list_tasks(account_id)?)
    }

    /// Polls until the task reaches `DONE` or `ERROR`, or `timeout` passes.
    pub async fn wait_for(
        &self,
        account_id: &str,
        task_id: &str,
        timeout: Duration,
    ) -> Result<AsyncTaskRecord, ServerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record = self.poll(account_id, task_id).await?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ServerError::Internal(format!(
                    "task {task_id} still processing after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Stops accepting work and aborts everything in flight. Records still
    /// `PROCESSING` are closed as `ERROR`.
    ///
    /// A body already running on the blocking pool is not interrupted; its
    /// result is discarded.
    pub async fn shutdown(&self) {
        let _guard = self.submit_lock.lock().await;
        self.accepting.store(false, Ordering::Release);
        self.permits.close();

        let ids: Vec<String> = self.running.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            if let Some((_, handle)) = self.running.remove(id) {
                handle.abort();
                let _ = handle.await;
            }
        }

        let mut store = self.store.lock().await;
        for id in &ids {
            match store.get_task(id) {
                Ok(mut record) if record.status == TaskStatus::Processing => {
                    record.mark_error("task handler shut down");
                    if let Err(err) = store.update_task(&record) {
                        error!(task_id = %id, error = %err, "failed to close task record");
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(task_id = %id, error = %err, "task record missing at shutdown"),
            }
        }
        drop(store);

        self.dedup.invalidate_all();
        info!(aborted = ids.len(), "task handler stopped");
    }
}
