//! Uniform capability used for every registered source type.
//!
//! Discovery reads the source repository and declares an entity's
//! `references` as its children. Account and Application roots list the
//! repository instead, so migrating an application pulls in everything
//! deployed from it.
//!
//! Generation emits one NG document per entity:
//!
//! ```yaml
//! connector:
//!   identifier: gitConn
//!   name: git-conn
//!   orgIdentifier: default
//!   spec: { ... }
//!   references:
//!     - type: SECRET
//!       ref: org.gitToken
//! ```
//!
//! Types without an NG form (ArtifactStream, Manifest, ApplicationManifest)
//! are inlined into the documents of the entities that reference them.

use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use ngmig_core::{
    CgBasicInfo, DiscoveryUnit, EntityNode, EntityRef, EntityType, MigratedEntityMapping,
    NgEntityDetail, SourceEntity, YamlArtifact,
};

use crate::capability::{GeneratedYaml, MigrationCapability};
use crate::context::MigrationContext;
use crate::error::EngineError;
use crate::source::SourceRepository;

/// Types an Account root lists directly.
const ACCOUNT_LEVEL: [EntityType; 5] = [
    EntityType::Application,
    EntityType::SecretManagerTemplate,
    EntityType::SecretManager,
    EntityType::Secret,
    EntityType::Connector,
];

/// Types an Application root lists directly.
const APPLICATION_LEVEL: [EntityType; 4] = [
    EntityType::Pipeline,
    EntityType::Workflow,
    EntityType::Service,
    EntityType::Environment,
];

const SUPPORTED_WORKFLOW_TYPE: &str = "ROLLING";
const SUPPORTED_INFRA_TYPE: &str = "DIRECT_KUBERNETES";

/// NG document kind for a source type, `None` when it has no NG form.
pub fn ng_kind(kind: EntityType) -> Option<&'static str> {
    match kind {
        EntityType::Pipeline => Some("pipeline"),
        EntityType::Workflow => Some("template"),
        EntityType::Service => Some("service"),
        EntityType::Environment => Some("environment"),
        EntityType::Infra => Some("infrastructureDefinition"),
        EntityType::Connector | EntityType::SecretManager => Some("connector"),
        EntityType::Secret => Some("secret"),
        EntityType::SecretManagerTemplate => Some("customSecretManagerTemplate"),
        EntityType::Account
        | EntityType::Application
        | EntityType::ArtifactStream
        | EntityType::Manifest
        | EntityType::ApplicationManifest
        | EntityType::DummyHead => None,
    }
}

pub struct GenericMigrator {
    kind: EntityType,
    repo: Arc<dyn SourceRepository>,
}

impl GenericMigrator {
    pub fn new(kind: EntityType, repo: Arc<dyn SourceRepository>) -> Self {
        GenericMigrator { kind, repo }
    }

    pub fn kind(&self) -> EntityType {
        self.kind
    }

    fn list_children(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        kinds: &[EntityType],
    ) -> Result<Vec<EntityRef>, EngineError> {
        let mut out = Vec::new();
        for &kind in kinds {
            out.extend(
                self.repo
                    .list(account_id, app_id, kind)?
                    .iter()
                    .map(SourceEntity::entity_ref),
            );
        }
        Ok(out)
    }

    fn check_supported(&self, entity: &SourceEntity) -> Result<(), EngineError> {
        let (field, supported) = match self.kind {
            EntityType::Workflow => ("workflowType", SUPPORTED_WORKFLOW_TYPE),
            EntityType::Infra => ("infraType", SUPPORTED_INFRA_TYPE),
            _ => return Ok(()),
        };
        match entity.spec.get(field).and_then(|v| v.as_str()) {
            Some(actual) if actual != supported => Err(EngineError::Unsupported {
                entity: entity.entity_ref(),
                reason: format!("{field} {actual} is not supported, only {supported}"),
            }),
            _ => Ok(()),
        }
    }
}

impl MigrationCapability for GenericMigrator {
    fn discover_from_source_id(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        entity_id: &str,
    ) -> Result<Option<DiscoveryUnit>, EngineError> {
        match self.kind {
            EntityType::Account => {
                let account = SourceEntity {
                    id: entity_id.to_string(),
                    kind: EntityType::Account,
                    name: entity_id.to_string(),
                    app_id: None,
                    spec: serde_json::Value::Null,
                    references: self.list_children(account_id, None, &ACCOUNT_LEVEL)?,
                };
                self.discover_from_loaded_entity(account).map(Some)
            }
            EntityType::Application => {
                let Some(mut app) =
                    self.repo
                        .load(account_id, None, EntityType::Application, entity_id)?
                else {
                    return Ok(None);
                };
                let listed = self.list_children(account_id, Some(entity_id), &APPLICATION_LEVEL)?;
                for child in listed {
                    if !app.references.contains(&child) {
                        app.references.push(child);
                    }
                }
                self.discover_from_loaded_entity(app).map(Some)
            }
            kind => {
                let scoped_app = if kind.is_app_scoped() { app_id } else { None };
                match self.repo.load(account_id, scoped_app, kind, entity_id)? {
                    Some(entity) => self.discover_from_loaded_entity(entity).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    fn discover_from_loaded_entity(
        &self,
        entity: SourceEntity,
    ) -> Result<DiscoveryUnit, EngineError> {
        let children = entity.references.clone();
        Ok(DiscoveryUnit::new(EntityNode::from_entity(entity), children))
    }

    fn already_exists(
        &self,
        ctx: &MigrationContext<'_>,
        entity_ref: &EntityRef,
    ) -> Result<Option<YamlArtifact>, EngineError> {
        let Some(doc_kind) = ng_kind(self.kind) else {
            return Ok(None);
        };
        let Some(node) = ctx.graph().node(entity_ref) else {
            return Ok(None);
        };
        let cg = CgBasicInfo::from_node(ctx.account_id(), node);
        let (org, project) = ctx.input().destination_scope(entity_ref);
        let candidates = ctx.mapping().find_candidate_mappings(
            &cg,
            ctx.account_id(),
            org.as_deref(),
            project.as_deref(),
        )?;
        let Some(found) = candidates.into_iter().next() else {
            return Ok(None);
        };

        debug!(entity = %entity_ref, fqn = %found.fully_qualified_identifier, "already migrated");
        let ng_detail = found.ng_detail();
        Ok(Some(YamlArtifact {
            file_name: file_name(doc_kind, &ng_detail),
            yaml: Value::Null,
            ng_kind: doc_kind.to_string(),
            ng_detail,
            cg_basic_info: cg,
            exists: true,
        }))
    }

    fn generate_yaml(
        &self,
        ctx: &MigrationContext<'_>,
        entity_ref: &EntityRef,
    ) -> Result<Option<GeneratedYaml>, EngineError> {
        let Some(doc_kind) = ng_kind(self.kind) else {
            return Ok(None);
        };
        let Some(node) = ctx.graph().node(entity_ref) else {
            return Ok(None);
        };
        let Some(entity) = node.entity.as_ref() else {
            return Ok(None);
        };
        self.check_supported(entity)?;

        let name = ctx.input().destination_name(entity_ref, &entity.name);
        let ng_detail = ctx.input().destination_for(entity_ref, &entity.name);
        let from_scope = ng_detail.scope();

        let mut references = Vec::new();
        let mut inlined = Vec::new();
        for child in ctx.graph().children(entity_ref) {
            if let Some(detail) = ctx.migrated_detail(child) {
                references.push(reference_entry(child.kind, detail.scoped_reference(from_scope)));
            } else if ng_kind_missing(child.kind) {
                if let Some(child_entity) = ctx.graph().node(child).and_then(|n| n.entity.as_ref())
                {
                    inlined.push(inlined_entry(child_entity)?);
                }
            }
        }
        // Infrastructure belongs to the environment that references it.
        if self.kind == EntityType::Infra {
            for parent in ctx.graph().incoming(entity_ref) {
                if parent.kind != EntityType::Environment {
                    continue;
                }
                if let Some(env) = ctx.migrated_detail(parent) {
                    references.push(reference_entry(
                        EntityType::Environment,
                        env.scoped_reference(from_scope),
                    ));
                }
            }
        }

        let mut body = Mapping::new();
        body.insert("identifier".into(), ng_detail.identifier.clone().into());
        body.insert("name".into(), name.into());
        if let Some(org) = &ng_detail.org_identifier {
            body.insert("orgIdentifier".into(), org.clone().into());
        }
        if let Some(project) = &ng_detail.project_identifier {
            body.insert("projectIdentifier".into(), project.clone().into());
        }
        body.insert("spec".into(), serde_yaml::to_value(&entity.spec)?);
        body.insert("references".into(), Value::Sequence(references));
        if !inlined.is_empty() {
            body.insert("inlined".into(), Value::Sequence(inlined));
        }
        let mut doc = Mapping::new();
        doc.insert(doc_kind.into(), Value::Mapping(body));

        Ok(Some(GeneratedYaml::single(YamlArtifact {
            file_name: file_name(doc_kind, &ng_detail),
            yaml: Value::Mapping(doc),
            ng_kind: doc_kind.to_string(),
            cg_basic_info: CgBasicInfo::from_node(ctx.account_id(), node),
            ng_detail,
            exists: false,
        })))
    }

    fn build_mapping_record(&self, artifact: &YamlArtifact) -> Option<MigratedEntityMapping> {
        ng_kind(self.kind).map(|_| MigratedEntityMapping::from_artifact(artifact))
    }
}

fn ng_kind_missing(kind: EntityType) -> bool {
    matches!(
        kind,
        EntityType::ArtifactStream | EntityType::Manifest | EntityType::ApplicationManifest
    )
}

/// `[org/][project/]kind/identifier.yaml`, so one identifier in two scopes
/// never shares a path.
fn file_name(ng_kind: &str, detail: &NgEntityDetail) -> String {
    let mut path = String::new();
    for part in [&detail.org_identifier, &detail.project_identifier]
        .into_iter()
        .flatten()
    {
        path.push_str(part);
        path.push('/');
    }
    format!("{path}{ng_kind}/{}.yaml", detail.identifier)
}

fn reference_entry(kind: EntityType, reference: String) -> Value {
    let mut entry = Mapping::new();
    entry.insert("type".into(), kind.as_str().into());
    entry.insert("ref".into(), reference.into());
    Value::Mapping(entry)
}

fn inlined_entry(entity: &SourceEntity) -> Result<Value, EngineError> {
    let mut entry = Mapping::new();
    entry.insert("type".into(), entity.kind.as_str().into());
    entry.insert("name".into(), entity.name.clone().into());
    entry.insert("spec".into(), serde_yaml::to_value(&entity.spec)?);
    Ok(Value::Mapping(entry))
}
