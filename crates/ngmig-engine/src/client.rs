//! Destination (NG) system contract.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use ngmig_core::YamlArtifact;

use crate::error::EngineError;

/// Result of one create call. A rejected document is `success = false`
/// with the destination's messages in `errors`; `Err` is reserved for
/// transport failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CreateOutcome {
    pub fn created(identifier: impl Into<String>) -> Self {
        CreateOutcome {
            success: true,
            identifier: Some(identifier.into()),
            errors: Vec::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        CreateOutcome {
            success: false,
            identifier: None,
            errors: vec![message.into()],
        }
    }
}

pub trait DestinationClient: Send + Sync {
    fn create_entity(&self, artifact: &YamlArtifact) -> Result<CreateOutcome, EngineError>;
}

/// Destination that keeps created documents in memory.
#[derive(Debug, Default)]
pub struct InMemoryDestinationClient {
    created: Mutex<Vec<YamlArtifact>>,
    rejected: HashSet<String>,
}

impl InMemoryDestinationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every document whose NG identifier is `identifier`.
    pub fn reject_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.rejected.insert(identifier.into());
        self
    }

    pub fn created(&self) -> Vec<YamlArtifact> {
        self.created.lock().clone()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl DestinationClient for InMemoryDestinationClient {
    fn create_entity(&self, artifact: &YamlArtifact) -> Result<CreateOutcome, EngineError> {
        let identifier = &artifact.ng_detail.identifier;
        if self.rejected.contains(identifier) {
            return Ok(CreateOutcome::rejected(format!(
                "{} {identifier} was rejected by the destination",
                artifact.ng_kind
            )));
        }
        let mut created = self.created.lock();
        let duplicate = created.iter().any(|a| {
            a.ng_kind == artifact.ng_kind
                && a.ng_detail == artifact.ng_detail
        });
        if duplicate {
            return Ok(CreateOutcome::rejected(format!(
                "{} {identifier} already exists",
                artifact.ng_kind
            )));
        }
        created.push(artifact.clone());
        Ok(CreateOutcome::created(identifier.clone()))
    }
}
