//! Source-system entity identity and node types.
//!
//! [`EntityRef`] is the `(type, id)` pair used as the key of every discovery
//! graph. [`EntityNode`] wraps a ref together with the loaded
//! [`SourceEntity`], and [`DiscoveryUnit`] is what a single type-specific
//! discovery call returns: one node plus the refs it directly depends on.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Type tag of a source-system entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Account,
    Application,
    Pipeline,
    Workflow,
    Service,
    Environment,
    Infra,
    Connector,
    Secret,
    SecretManager,
    SecretManagerTemplate,
    ArtifactStream,
    Manifest,
    ApplicationManifest,
    /// Synthetic fan-in root used when discovering several explicit entities.
    DummyHead,
}

impl EntityType {
    /// Every concrete (non-synthetic) type.
    pub const CONCRETE: [EntityType; 14] = [
        EntityType::Account,
        EntityType::Application,
        EntityType::Pipeline,
        EntityType::Workflow,
        EntityType::Service,
        EntityType::Environment,
        EntityType::Infra,
        EntityType::Connector,
        EntityType::Secret,
        EntityType::SecretManager,
        EntityType::SecretManagerTemplate,
        EntityType::ArtifactStream,
        EntityType::Manifest,
        EntityType::ApplicationManifest,
    ];

    /// The wire name, e.g. `SECRET_MANAGER_TEMPLATE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Account => "ACCOUNT",
            EntityType::Application => "APPLICATION",
            EntityType::Pipeline => "PIPELINE",
            EntityType::Workflow => "WORKFLOW",
            EntityType::Service => "SERVICE",
            EntityType::Environment => "ENVIRONMENT",
            EntityType::Infra => "INFRA",
            EntityType::Connector => "CONNECTOR",
            EntityType::Secret => "SECRET",
            EntityType::SecretManager => "SECRET_MANAGER",
            EntityType::SecretManagerTemplate => "SECRET_MANAGER_TEMPLATE",
            EntityType::ArtifactStream => "ARTIFACT_STREAM",
            EntityType::Manifest => "MANIFEST",
            EntityType::ApplicationManifest => "APPLICATION_MANIFEST",
            EntityType::DummyHead => "DUMMY_HEAD",
        }
    }

    /// Whether the source system partitions entities of this type by application.
    pub fn is_app_scoped(&self) -> bool {
        matches!(
            self,
            EntityType::Pipeline
                | EntityType::Workflow
                | EntityType::Service
                | EntityType::Environment
                | EntityType::Infra
                | EntityType::ArtifactStream
                | EntityType::Manifest
                | EntityType::ApplicationManifest
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::CONCRETE
            .iter()
            .chain(std::iter::once(&EntityType::DummyHead))
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CoreError::UnknownEntityType {
                name: s.to_string(),
            })
    }
}

/// Identity of a source entity within a discovery graph.
///
/// Equality and hashing are by `(kind, id)`. Serialized as the string
/// `KIND:id` so refs can be used as JSON object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EntityRef {
    pub kind: EntityType,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityType, id: impl Into<String>) -> Self {
        EntityRef {
            kind,
            id: id.into(),
        }
    }

    /// The synthetic root used by multi-entity discovery.
    pub fn dummy_head() -> Self {
        EntityRef::new(EntityType::DummyHead, DUMMY_HEAD_ID)
    }
}

/// Id of the synthetic [`EntityType::DummyHead`] node.
pub const DUMMY_HEAD_ID: &str = "__dummy_head__";

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for EntityRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| CoreError::InvalidEntityRef {
            text: s.to_string(),
        })?;
        if id.is_empty() {
            return Err(CoreError::InvalidEntityRef {
                text: s.to_string(),
            });
        }
        Ok(EntityRef::new(kind.parse()?, id))
    }
}

impl From<EntityRef> for String {
    fn from(r: EntityRef) -> Self {
        r.to_string()
    }
}

impl TryFrom<String> for EntityRef {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A loaded source-system object.
///
/// The variant is carried by `kind`; variant-specific fields stay opaque in
/// `spec`. `references` lists the entities this one directly depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntity {
    pub id: String,
    pub kind: EntityType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub references: Vec<EntityRef>,
}

impl SourceEntity {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone())
    }
}

/// A graph node: a ref plus the source entity it was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub entity_ref: EntityRef,
    /// `None` only for the synthetic dummy head.
    pub entity: Option<SourceEntity>,
    pub kind: EntityType,
}

impl EntityNode {
    pub fn from_entity(entity: SourceEntity) -> Self {
        EntityNode {
            entity_ref: entity.entity_ref(),
            kind: entity.kind,
            entity: Some(entity),
        }
    }

    pub fn dummy_head() -> Self {
        EntityNode {
            entity_ref: EntityRef::dummy_head(),
            entity: None,
            kind: EntityType::DummyHead,
        }
    }

    /// Display name of the backing entity, falling back to the id.
    pub fn name(&self) -> &str {
        self.entity
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or(&self.entity_ref.id)
    }

    pub fn app_id(&self) -> Option<&str> {
        self.entity.as_ref().and_then(|e| e.app_id.as_deref())
    }
}

/// Result of one type-specific discovery call.
#[derive(Debug, Clone)]
pub struct DiscoveryUnit {
    pub node: EntityNode,
    /// Direct dependencies, in declaration order.
    pub children: IndexSet<EntityRef>,
}

impl DiscoveryUnit {
    pub fn new(node: EntityNode, children: impl IntoIterator<Item = EntityRef>) -> Self {
        DiscoveryUnit {
            node,
            children: children.into_iter().collect(),
        }
    }
}

/// Source-side identity of an entity, as carried on artifacts and mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CgBasicInfo {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
    #[serde(default)]
    pub name: String,
}

impl CgBasicInfo {
    pub fn from_node(account_id: &str, node: &EntityNode) -> Self {
        CgBasicInfo {
            account_id: account_id.to_string(),
            app_id: node.app_id().map(str::to_string),
            id: node.entity_ref.id.clone(),
            kind: node.kind,
            name: node.name().to_string(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone())
    }
}
