//! Discovery-only and full-import task handlers.
//!
//! Both validate the request up front, so malformed input fails the
//! submission instead of producing an `ERROR` record, then hand a blocking
//! body to the [`AsyncTaskHandler`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ngmig_core::{DiscoveryGraph, TaskRequestType};
use ngmig_engine::{
    DestinationClient, DiscoveryService, DiscoverySummary, EntityInput, MigrationEngine,
    MigrationInput,
};

use crate::error::ServerError;
use crate::tasks::AsyncTaskHandler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    pub entities: Vec<EntityInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub entities: Vec<EntityInput>,
    pub input: MigrationInput,
}

/// Response payload of a `DISCOVERY` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub summary: DiscoverySummary,
    pub graph: DiscoveryGraph,
}

/// One root goes through single-root discovery; several share a dummy head.
fn discover(
    discovery: &DiscoveryService,
    account_id: &str,
    entities: &[EntityInput],
) -> Result<DiscoveryGraph, ServerError> {
    let graph = match entities {
        [] => return Err(ServerError::BadRequest("no entities to discover".into())),
        [single] => discovery.discover_single(
            account_id,
            single.app_id.as_deref(),
            &single.id,
            single.kind,
        )?,
        many => discovery.discover_multi(account_id, many)?,
    };
    Ok(graph)
}

fn check_entities(entities: &[EntityInput]) -> Result<(), ServerError> {
    if entities.is_empty() {
        return Err(ServerError::BadRequest("no entities to discover".into()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DiscoveryTaskHandler {
    tasks: Arc<AsyncTaskHandler>,
    engine: MigrationEngine,
}

impl DiscoveryTaskHandler {
    pub fn new(tasks: Arc<AsyncTaskHandler>, engine: MigrationEngine) -> Self {
        DiscoveryTaskHandler { tasks, engine }
    }

    pub async fn submit(
        &self,
        account_id: &str,
        request: DiscoveryRequest,
    ) -> Result<String, ServerError> {
        check_entities(&request.entities)?;
        let payload = serde_json::to_value(&request)?;
        let engine = self.engine.clone();
        let account = account_id.to_string();
        let body = move || -> Result<serde_json::Value, ServerError> {
            let graph = discover(engine.discovery(), &account, &request.entities)?;
            let response = DiscoveryResponse {
                summary: DiscoverySummary::of(&graph),
                graph,
            };
            Ok(serde_json::to_value(response)?)
        };
        self.tasks
            .submit(account_id, TaskRequestType::Discovery, payload, Box::new(body))
            .await
    }
}

#[derive(Clone)]
pub struct ImportTaskHandler {
    tasks: Arc<AsyncTaskHandler>,
    engine: MigrationEngine,
    client: Arc<dyn DestinationClient>,
}

impl std::fmt::Debug for ImportTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportTaskHandler")
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl ImportTaskHandler {
    pub fn new(
        tasks: Arc<AsyncTaskHandler>,
        engine: MigrationEngine,
        client: Arc<dyn DestinationClient>,
    ) -> Self {
        ImportTaskHandler {
            tasks,
            engine,
            client,
        }
    }

    /// Submits a discover-then-import run. The response payload is the
    /// run's `MigrationImportSummary`.
    pub async fn submit(
        &self,
        account_id: &str,
        request: ImportRequest,
    ) -> Result<String, ServerError> {
        check_entities(&request.entities)?;
        if request.input.account_id != account_id {
            return Err(ServerError::BadRequest(format!(
                "input account {} does not match {}",
                request.input.account_id, account_id
            )));
        }
        if request.input.project_identifier.is_some() && request.input.org_identifier.is_none() {
            return Err(ServerError::BadRequest(
                "project identifier requires an org identifier".into(),
            ));
        }

        let payload = serde_json::to_value(&request)?;
        let engine = self.engine.clone();
        let client = self.client.clone();
        let account = account_id.to_string();
        let body = move || -> Result<serde_json::Value, ServerError> {
            let graph = discover(engine.discovery(), &account, &request.entities)?;
            let summary = engine.import(&graph, &request.input, client)?;
            Ok(serde_json::to_value(summary)?)
        };
        self.tasks
            .submit(account_id, TaskRequestType::Import, payload, Box::new(body))
            .await
    }
}
