//! Read access to the source (CG) system.
//!
//! [`SourceRepository`] is the only way the engine loads source entities.
//! [`InMemorySourceRepository`] backs tests and the CLI; it can be loaded
//! from a JSON catalog and told to fail specific fetches.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ngmig_core::{EntityRef, EntityType, SourceEntity};

use crate::error::EngineError;

/// Source-system lookups, partitioned by account and (for app-scoped types)
/// application.
pub trait SourceRepository: Send + Sync {
    /// Loads one entity. `Ok(None)` means it does not exist in that scope.
    fn load(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        kind: EntityType,
        id: &str,
    ) -> Result<Option<SourceEntity>, EngineError>;

    /// Lists every entity of `kind`; `app_id` restricts app-scoped types.
    fn list(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        kind: EntityType,
    ) -> Result<Vec<SourceEntity>, EngineError>;
}

/// JSON catalog format: one account's entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCatalog {
    pub account_id: String,
    pub entities: Vec<SourceEntity>,
}

/// In-memory source system.
#[derive(Debug, Default)]
pub struct InMemorySourceRepository {
    entities: IndexMap<(String, EntityRef), SourceEntity>,
    failing: HashSet<EntityRef>,
}

impl InMemorySourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: SourceCatalog) -> Self {
        let mut repo = Self::new();
        for entity in catalog.entities {
            repo.insert(&catalog.account_id, entity);
        }
        repo
    }

    pub fn insert(&mut self, account_id: &str, entity: SourceEntity) {
        self.entities
            .insert((account_id.to_string(), entity.entity_ref()), entity);
    }

    /// Makes every subsequent fetch of `entity_ref` fail.
    pub fn fail_on(&mut self, entity_ref: EntityRef) {
        self.failing.insert(entity_ref);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn in_app(entity: &SourceEntity, app_id: Option<&str>) -> bool {
        match app_id {
            Some(app) if entity.kind.is_app_scoped() => entity.app_id.as_deref() == Some(app),
            _ => true,
        }
    }
}

impl SourceRepository for InMemorySourceRepository {
    fn load(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        kind: EntityType,
        id: &str,
    ) -> Result<Option<SourceEntity>, EngineError> {
        let key = (account_id.to_string(), EntityRef::new(kind, id));
        if self.failing.contains(&key.1) {
            return Err(EngineError::Fetch {
                entity: key.1,
                reason: "source unavailable".to_string(),
            });
        }
        Ok(self
            .entities
            .get(&key)
            .filter(|e| Self::in_app(e, app_id))
            .cloned())
    }

    fn list(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        kind: EntityType,
    ) -> Result<Vec<SourceEntity>, EngineError> {
        Ok(self
            .entities
            .iter()
            .filter(|((acc, r), e)| acc == account_id && r.kind == kind && Self::in_app(e, app_id))
            .map(|(_, e)| e.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityType, id: &str, app: Option<&str>) -> SourceEntity {
        SourceEntity {
            id: id.into(),
            kind,
            name: id.into(),
            app_id: app.map(str::to_string),
            spec: serde_json::Value::Null,
            references: Vec::new(),
        }
    }

    #[test]
    fn app_scoped_lookup() {
        let mut repo = InMemorySourceRepository::new();
        repo.insert("acc", entity(EntityType::Service, "s1", Some("app1")));
        repo.insert("acc", entity(EntityType::Connector, "c1", None));

        assert!(repo
            .load("acc", Some("app1"), EntityType::Service, "s1")
            .unwrap()
            .is_some());
        assert!(repo
            .load("acc", Some("app2"), EntityType::Service, "s1")
            .unwrap()
            .is_none());
        // Global types ignore the application.
        assert!(repo
            .load("acc", Some("app2"), EntityType::Connector, "c1")
            .unwrap()
            .is_some());
        assert!(repo
            .load("other", None, EntityType::Connector, "c1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn failing_fetch() {
        let mut repo = InMemorySourceRepository::new();
        repo.insert("acc", entity(EntityType::Secret, "s", None));
        repo.fail_on(EntityRef::new(EntityType::Secret, "s"));
        assert!(matches!(
            repo.load("acc", None, EntityType::Secret, "s"),
            Err(EngineError::Fetch { .. })
        ));
    }

    #[test]
    fn catalog_from_json() {
        let catalog: SourceCatalog = serde_json::from_str(
            r#"{"accountId":"acc","entities":[
                {"id":"app1","kind":"APPLICATION","name":"App"},
                {"id":"w1","kind":"WORKFLOW","name":"Deploy","appId":"app1",
                 "references":["SERVICE:s1"]}
            ]}"#,
        )
        .unwrap();
        let repo = InMemorySourceRepository::from_catalog(catalog);
        assert_eq!(repo.len(), 2);
        let wfs = repo.list("acc", Some("app1"), EntityType::Workflow).unwrap();
        assert_eq!(wfs.len(), 1);
        assert_eq!(wfs[0].references[0].to_string(), "SERVICE:s1");
    }
}
