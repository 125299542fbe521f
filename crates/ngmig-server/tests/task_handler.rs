//! Task wrapper lifecycle and the discovery/import task handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use ngmig_core::{AsyncTaskRecord, EntityRef, EntityType, SourceEntity, TaskRequestType, TaskStatus};
use ngmig_engine::{
    EntityInput, InMemoryDestinationClient, InMemorySourceRepository, MigrationImportSummary,
    MigrationInput,
};
use ngmig_server::{
    AppState, AsyncTaskHandler, DiscoveryRequest, ImportRequest, ServerError, TaskBody,
    TaskHandlerConfig,
};
use ngmig_storage::{InMemoryStore, StorageError, TaskStore};

const WAIT: Duration = Duration::from_secs(5);

fn body(f: impl FnOnce() -> Result<serde_json::Value, ServerError> + Send + 'static) -> TaskBody {
    Box::new(f)
}

fn handler(workers: usize) -> Arc<AsyncTaskHandler> {
    let config = TaskHandlerConfig {
        workers,
        ..TaskHandlerConfig::default()
    };
    AsyncTaskHandler::start(config, Arc::new(tokio::sync::Mutex::new(InMemoryStore::new())))
}

/// Waits until every submitted task has released its dedup entry.
async fn settle(tasks: &AsyncTaskHandler) {
    let mut waited = Duration::ZERO;
    while tasks.in_flight() > 0 && waited < WAIT {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += Duration::from_millis(5);
    }
}

/// Returns a body that blocks until the sender is used or dropped.
fn gated(response: serde_json::Value) -> (mpsc::Sender<()>, TaskBody) {
    let (tx, rx) = mpsc::channel::<()>();
    let task = body(move || {
        let _ = rx.recv();
        Ok(response)
    });
    (tx, task)
}

/// A task store whose inserts fail while `fail_inserts` is set.
struct FlakyStore {
    inner: InMemoryStore,
    fail_inserts: Arc<AtomicBool>,
}

impl TaskStore for FlakyStore {
    fn insert_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Corrupt {
                reason: "disk full".into(),
            });
        }
        self.inner.insert_task(record)
    }

    fn get_task(&self, id: &str) -> Result<AsyncTaskRecord, StorageError> {
        self.inner.get_task(id)
    }

    fn update_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        self.inner.update_task(record)
    }

    fn delete_task(&mut self, id: &str) -> Result<(), StorageError> {
        self.inner.delete_task(id)
    }

    fn list_tasks(&self, account_id: &str) -> Result<Vec<AsyncTaskRecord>, StorageError> {
        self.inner.list_tasks(account_id)
    }
}

// ---------------------------------------------------------------------------
// AsyncTaskHandler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_flight_submission_returns_same_task() {
    let tasks = handler(2);
    let (release, first_body) = gated(json!({"ok": true}));

    let first = tasks
        .submit("acc", TaskRequestType::Discovery, json!({}), first_body)
        .await
        .unwrap();
    let second = tasks
        .submit(
            "acc",
            TaskRequestType::Discovery,
            json!({}),
            body(|| panic!("duplicate submission must not run")),
        )
        .await
        .unwrap();
    assert_eq!(first, second);

    let record = tasks.poll("acc", &first).await.unwrap();
    assert_eq!(record.status, TaskStatus::Processing);
    assert!(record.response_payload.is_none());

    release.send(()).unwrap();
    let done = tasks.wait_for("acc", &first, WAIT).await.unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.response_payload, Some(json!({"ok": true})));
    assert_eq!(tasks.list("acc").await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_record_insert_rolls_back_submission() {
    let fail = Arc::new(AtomicBool::new(true));
    let store = FlakyStore {
        inner: InMemoryStore::new(),
        fail_inserts: fail.clone(),
    };
    let tasks = AsyncTaskHandler::start(
        TaskHandlerConfig::default(),
        Arc::new(tokio::sync::Mutex::new(store)),
    );

    let err = tasks
        .submit(
            "acc",
            TaskRequestType::Import,
            json!({}),
            body(|| Ok(json!(null))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Submission(_)));
    assert!(tasks.list("acc").await.unwrap().is_empty());

    // The cache entry was rolled back too, so the retry gets a real task.
    fail.store(false, Ordering::SeqCst);
    let id = tasks
        .submit(
            "acc",
            TaskRequestType::Import,
            json!({}),
            body(|| Ok(json!(null))),
        )
        .await
        .unwrap();
    let record = tasks.wait_for("acc", &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Done);
}

#[tokio::test]
async fn body_error_is_recorded() {
    let tasks = handler(1);
    let id = tasks
        .submit(
            "acc",
            TaskRequestType::Import,
            json!({"entities": []}),
            body(|| Err(ServerError::BadRequest("unknown connector".into()))),
        )
        .await
        .unwrap();

    let record = tasks.wait_for("acc", &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .contains("unknown connector"));
    assert_eq!(record.request_payload, json!({"entities": []}));
}

#[tokio::test]
async fn panicking_body_is_recorded() {
    let tasks = handler(1);
    let id = tasks
        .submit(
            "acc",
            TaskRequestType::Discovery,
            json!({}),
            body(|| panic!("boom")),
        )
        .await
        .unwrap();

    let record = tasks.wait_for("acc", &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("task panicked"));
}

#[tokio::test]
async fn finished_task_allows_fresh_submission() {
    let tasks = handler(1);
    let first = tasks
        .submit("acc", TaskRequestType::Discovery, json!({}), body(|| Ok(json!(1))))
        .await
        .unwrap();
    tasks.wait_for("acc", &first, WAIT).await.unwrap();

    // The record is terminal before the cache entry is dropped.
    settle(&tasks).await;

    let second = tasks
        .submit("acc", TaskRequestType::Discovery, json!({}), body(|| Ok(json!(2))))
        .await
        .unwrap();
    assert_ne!(first, second);

    // The earlier record stays queryable.
    let old = tasks.poll("acc", &first).await.unwrap();
    assert_eq!(old.response_payload, Some(json!(1)));
}

#[tokio::test]
async fn other_account_cannot_poll() {
    let tasks = handler(1);
    let id = tasks
        .submit("acc", TaskRequestType::Discovery, json!({}), body(|| Ok(json!(null))))
        .await
        .unwrap();

    let err = tasks.poll("intruder", &id).await.unwrap_err();
    assert!(matches!(err, ServerError::NotFound(_)));
    let err = tasks.poll("acc", "no-such-task").await.unwrap_err();
    assert!(matches!(err, ServerError::NotFound(_)));
}

#[tokio::test]
async fn submissions_beyond_pool_capacity_queue() {
    let tasks = handler(1);
    let (release, blocking) = gated(json!("first"));
    let first = tasks
        .submit("acc-1", TaskRequestType::Import, json!({}), blocking)
        .await
        .unwrap();
    let second = tasks
        .submit("acc-2", TaskRequestType::Import, json!({}), body(|| Ok(json!("second"))))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = tasks.poll("acc-2", &second).await.unwrap();
    assert_eq!(queued.status, TaskStatus::Processing);

    release.send(()).unwrap();
    assert_eq!(
        tasks.wait_for("acc-1", &first, WAIT).await.unwrap().status,
        TaskStatus::Done
    );
    assert_eq!(
        tasks.wait_for("acc-2", &second, WAIT).await.unwrap().status,
        TaskStatus::Done
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn instant_tasks_leave_nothing_in_flight() {
    let tasks = handler(4);
    let mut ids = Vec::new();
    for n in 0..64 {
        let account = format!("acc-{n}");
        let id = tasks
            .submit(
                &account,
                TaskRequestType::Discovery,
                json!({}),
                body(|| Ok(json!(null))),
            )
            .await
            .unwrap();
        ids.push((account, id));
    }
    for (account, id) in &ids {
        let record = tasks.wait_for(account, id, WAIT).await.unwrap();
        assert_eq!(record.status, TaskStatus::Done);
    }
    settle(&tasks).await;
    assert_eq!(tasks.in_flight(), 0);
}

#[tokio::test]
async fn shutdown_closes_processing_records() {
    let tasks = handler(1);
    let (_release, blocking) = gated(json!(null));
    let id = tasks
        .submit("acc", TaskRequestType::Import, json!({}), blocking)
        .await
        .unwrap();

    tasks.shutdown().await;
    let record = tasks.poll("acc", &id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert_eq!(tasks.in_flight(), 0);
}

// ---------------------------------------------------------------------------
// Discovery and import handlers
// ---------------------------------------------------------------------------

const ACCOUNT: &str = "acc";
const APP: &str = "app1";

fn entity(kind: EntityType, id: &str, name: &str, refs: &[(EntityType, &str)]) -> SourceEntity {
    SourceEntity {
        id: id.into(),
        kind,
        name: name.into(),
        app_id: kind.is_app_scoped().then(|| APP.to_string()),
        spec: json!({}),
        references: refs.iter().map(|(k, i)| EntityRef::new(*k, *i)).collect(),
    }
}

/// Workflow `w` deploys service `s` (pulling through connector `c`) to
/// environment `e`.
fn state() -> (AppState, Arc<InMemoryDestinationClient>) {
    let mut repo = InMemorySourceRepository::new();
    repo.insert(
        ACCOUNT,
        entity(
            EntityType::Workflow,
            "w",
            "Deploy",
            &[(EntityType::Service, "s"), (EntityType::Environment, "e")],
        ),
    );
    repo.insert(
        ACCOUNT,
        entity(EntityType::Service, "s", "api", &[(EntityType::Connector, "c")]),
    );
    repo.insert(ACCOUNT, entity(EntityType::Environment, "e", "qa", &[]));
    repo.insert(ACCOUNT, entity(EntityType::Connector, "c", "registry", &[]));

    let client = Arc::new(InMemoryDestinationClient::new());
    let state = AppState::in_memory(Arc::new(repo), client.clone());
    (state, client)
}

fn workflow_root() -> Vec<EntityInput> {
    vec![EntityInput::new(EntityType::Workflow, "w", Some(APP))]
}

#[tokio::test]
async fn discovery_task_returns_graph_summary() {
    let (state, _) = state();
    let id = state
        .discovery
        .submit(
            ACCOUNT,
            DiscoveryRequest {
                entities: workflow_root(),
            },
        )
        .await
        .unwrap();

    let record = state.tasks.wait_for(ACCOUNT, &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Done);
    assert_eq!(record.request_type, TaskRequestType::Discovery);
    let response = record.response_payload.unwrap();
    assert_eq!(response["summary"]["entityCount"], json!(4));
    assert_eq!(response["summary"]["root"], json!("WORKFLOW:w"));
}

#[tokio::test]
async fn discovery_of_missing_root_ends_in_error() {
    let (state, _) = state();
    let id = state
        .discovery
        .submit(
            ACCOUNT,
            DiscoveryRequest {
                entities: vec![EntityInput::new(EntityType::Pipeline, "nope", Some(APP))],
            },
        )
        .await
        .unwrap();

    let record = state.tasks.wait_for(ACCOUNT, &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record.error_message.unwrap().contains("not found"));
}

#[tokio::test]
async fn import_task_creates_entities_and_records_mappings() {
    let (state, client) = state();
    let id = state
        .import
        .submit(
            ACCOUNT,
            ImportRequest {
                entities: workflow_root(),
                input: MigrationInput::new(ACCOUNT).with_project("default", "payments"),
            },
        )
        .await
        .unwrap();

    let record = state.tasks.wait_for(ACCOUNT, &id, WAIT).await.unwrap();
    assert_eq!(record.status, TaskStatus::Done, "{:?}", record.error_message);
    let summary: MigrationImportSummary =
        serde_json::from_value(record.response_payload.unwrap()).unwrap();
    assert_eq!(summary.successfully_migrated(), 4);
    assert!(summary.errors.is_empty());
    assert_eq!(client.created_count(), 4);
    settle(&state.tasks).await;

    // A second run finds everything already migrated.
    let rerun = state
        .import
        .submit(
            ACCOUNT,
            ImportRequest {
                entities: workflow_root(),
                input: MigrationInput::new(ACCOUNT).with_project("default", "payments"),
            },
        )
        .await
        .unwrap();
    assert_ne!(rerun, id);
    let record = state.tasks.wait_for(ACCOUNT, &rerun, WAIT).await.unwrap();
    let summary: MigrationImportSummary =
        serde_json::from_value(record.response_payload.unwrap()).unwrap();
    assert_eq!(summary.successfully_migrated(), 0);
    assert_eq!(summary.already_migrated(), 4);
    assert_eq!(client.created_count(), 4);
}

#[tokio::test]
async fn invalid_import_requests_are_rejected_up_front() {
    let (state, _) = state();

    let err = state
        .import
        .submit(
            ACCOUNT,
            ImportRequest {
                entities: workflow_root(),
                input: MigrationInput::new("someone-else"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::BadRequest(_)));

    let err = state
        .import
        .submit(
            ACCOUNT,
            ImportRequest {
                entities: Vec::new(),
                input: MigrationInput::new(ACCOUNT),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::BadRequest(_)));
    assert!(state.tasks.list(ACCOUNT).await.unwrap().is_empty());
}
