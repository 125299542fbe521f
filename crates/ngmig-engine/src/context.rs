//! Per-run migration input and the state shared with capabilities while a
//! plan is generated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ngmig_core::{
    entity_identifier, CaseFormat, DiscoveryGraph, EntityRef, EntityType, NgEntityDetail, Scope,
};

use crate::mapping::MappingService;

/// Destination settings for one migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInput {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
    #[serde(default)]
    pub identifier_case: CaseFormat,
    /// Per-entity name, identifier and scope overrides.
    #[serde(default)]
    pub overrides: HashMap<EntityRef, EntityOverride>,
    /// `${key}` expressions replaced with the given value in every artifact.
    #[serde(default)]
    pub custom_expressions: HashMap<String, String>,
}

/// User override for a single entity's destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

impl MigrationInput {
    pub fn new(account_id: impl Into<String>) -> Self {
        MigrationInput {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, org: impl Into<String>, project: impl Into<String>) -> Self {
        self.org_identifier = Some(org.into());
        self.project_identifier = Some(project.into());
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org_identifier = Some(org.into());
        self.project_identifier = None;
        self
    }

    /// The scope a run migrates into when nothing is overridden.
    pub fn scope(&self) -> Scope {
        Scope::resolve(
            self.org_identifier.as_deref(),
            self.project_identifier.as_deref(),
        )
    }

    /// Destination org and project for `entity_ref`, after overrides.
    ///
    /// Secret manager templates always live at account scope. An override
    /// can only narrow to scopes the run has identifiers for.
    pub fn destination_scope(&self, entity_ref: &EntityRef) -> (Option<String>, Option<String>) {
        if entity_ref.kind == EntityType::SecretManagerTemplate {
            return (None, None);
        }
        let scope = self
            .overrides
            .get(entity_ref)
            .and_then(|o| o.scope)
            .unwrap_or_else(|| self.scope());
        match scope {
            Scope::Account => (None, None),
            Scope::Org => (self.org_identifier.clone(), None),
            Scope::Project => (
                self.org_identifier.clone(),
                self.org_identifier
                    .as_ref()
                    .and(self.project_identifier.clone()),
            ),
        }
    }

    /// Destination name for `entity_ref`.
    pub fn destination_name(&self, entity_ref: &EntityRef, source_name: &str) -> String {
        self.overrides
            .get(entity_ref)
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| source_name.to_string())
    }

    /// Full destination identity for `entity_ref`.
    pub fn destination_for(&self, entity_ref: &EntityRef, source_name: &str) -> NgEntityDetail {
        let identifier = self
            .overrides
            .get(entity_ref)
            .and_then(|o| o.identifier.clone())
            .unwrap_or_else(|| {
                entity_identifier(
                    &self.destination_name(entity_ref, source_name),
                    &entity_ref.id,
                    self.identifier_case,
                )
            });
        let (org, project) = self.destination_scope(entity_ref);
        NgEntityDetail::new(identifier, org, project)
    }
}

/// Read-only view handed to capabilities during planning.
pub struct MigrationContext<'a> {
    input: &'a MigrationInput,
    graph: &'a DiscoveryGraph,
    mapping: &'a MappingService,
    migrated: HashMap<EntityRef, NgEntityDetail>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(
        input: &'a MigrationInput,
        graph: &'a DiscoveryGraph,
        mapping: &'a MappingService,
    ) -> Self {
        MigrationContext {
            input,
            graph,
            mapping,
            migrated: HashMap::new(),
        }
    }

    pub fn input(&self) -> &'a MigrationInput {
        self.input
    }

    pub fn account_id(&self) -> &str {
        &self.input.account_id
    }

    pub fn graph(&self) -> &'a DiscoveryGraph {
        self.graph
    }

    pub fn mapping(&self) -> &'a MappingService {
        self.mapping
    }

    /// Refs with a destination identity so far (generated or pre-existing).
    pub fn migrated(&self) -> &HashMap<EntityRef, NgEntityDetail> {
        &self.migrated
    }

    pub fn migrated_detail(&self, entity_ref: &EntityRef) -> Option<&NgEntityDetail> {
        self.migrated.get(entity_ref)
    }

    pub fn is_migrated(&self, entity_ref: &EntityRef) -> bool {
        self.migrated.contains_key(entity_ref)
    }

    pub(crate) fn record_migrated(&mut self, entity_ref: EntityRef, detail: NgEntityDetail) {
        self.migrated.insert(entity_ref, detail);
    }
}
