//! Migration output types: generated YAML artifacts, skips, and errors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{CgBasicInfo, EntityType};
use crate::scope::NgEntityDetail;

/// One generated (or already existing) NG entity document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlArtifact {
    pub file_name: String,
    pub yaml: serde_yaml::Value,
    /// NG entity kind, e.g. `connector` or `pipeline`.
    pub ng_kind: String,
    pub ng_detail: NgEntityDetail,
    pub cg_basic_info: CgBasicInfo,
    /// True when the entity was found already migrated and is not re-created.
    pub exists: bool,
}

impl YamlArtifact {
    pub fn kind(&self) -> EntityType {
        self.cg_basic_info.kind
    }

    /// The YAML document as text.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.yaml)
    }
}

/// An entity the planner deliberately did not produce an artifact for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipDetail {
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub cg_basic_info: CgBasicInfo,
    pub reason: String,
}

/// Dotted expressions left in an artifact that need manual attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedExpressionDetail {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
    pub entity_type: EntityType,
    pub expressions: BTreeSet<String>,
}

/// A per-entity failure recorded during planning or import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportError {
    pub message: String,
    pub entity: CgBasicInfo,
}
