//! Source-to-destination mapping records and the dedup checks built on them.
//!
//! A mapping says "CG entity X was migrated to NG identity Y". Planning asks
//! [`MappingService::find_candidate_mappings`] whether an entity already has
//! a destination visible from the run's scope; import records a mapping
//! after every successful creation.
//!
//! Uniqueness is enforced by the store (`StorageError::Duplicate`), so two
//! concurrent recorders of the same mapping both succeed and only one row is
//! written.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use ngmig_core::{CgBasicInfo, MigratedEntityMapping, NgEntityDetail, Scope, YamlArtifact};
use ngmig_storage::{MappingFilter, MappingStore, StorageError};

use crate::error::EngineError;
use crate::registry::MigratorRegistry;

/// Mapping store shared between planners, importers and task workers.
pub type SharedMappingStore = Arc<Mutex<dyn MappingStore>>;

pub struct MappingService {
    store: SharedMappingStore,
    registry: Arc<MigratorRegistry>,
}

impl MappingService {
    pub fn new(store: SharedMappingStore, registry: Arc<MigratorRegistry>) -> Self {
        MappingService { store, registry }
    }

    pub fn store(&self) -> &SharedMappingStore {
        &self.store
    }

    /// Persists the mapping for a created artifact.
    ///
    /// Returns `true` if a new row was written, `false` if the type is not
    /// tracked or an equivalent mapping already exists.
    pub fn record_mapping(&self, artifact: &YamlArtifact) -> Result<bool, EngineError> {
        let Ok(capability) = self.registry.get(artifact.kind()) else {
            return Ok(false);
        };
        let Some(mapping) = capability.build_mapping_record(artifact) else {
            return Ok(false);
        };
        if self.exists_mapping(&artifact.cg_basic_info, &artifact.ng_detail)? {
            return Ok(false);
        }

        match self.store.lock().insert_mapping(&mapping) {
            Ok(id) => {
                debug!(
                    mapping_id = id,
                    entity = %artifact.cg_basic_info.entity_ref(),
                    fqn = %mapping.fully_qualified_identifier,
                    "recorded mapping"
                );
                Ok(true)
            }
            Err(StorageError::Duplicate { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether exactly this source entity is already mapped to exactly this
    /// destination identity.
    pub fn exists_mapping(
        &self,
        cg: &CgBasicInfo,
        ng: &NgEntityDetail,
    ) -> Result<bool, EngineError> {
        let mut filter = MappingFilter::account(&cg.account_id)
            .cg_entity(cg.kind, &cg.id)
            .scope(ng.scope())
            .identifier(&ng.identifier)
            .fully_qualified_identifier(ng.fully_qualified_identifier(&cg.account_id));
        if let Some(app) = tracked_app(cg) {
            filter = filter.app(app);
        }
        Ok(!self.store.lock().find_mappings(&filter)?.is_empty())
    }

    /// Every mapping of this source entity visible from the given
    /// destination scope.
    ///
    /// A project-scoped lookup also matches org-level mappings in the same
    /// org and account-level mappings; an org-scoped lookup also matches
    /// account-level mappings. Results are ordered most specific first.
    pub fn find_candidate_mappings(
        &self,
        cg: &CgBasicInfo,
        account_id: &str,
        org: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<MigratedEntityMapping>, EngineError> {
        let mut filter = MappingFilter::account(account_id).cg_entity(cg.kind, &cg.id);
        if let Some(app) = tracked_app(cg) {
            filter = filter.app(app);
        }
        let mut found: Vec<MigratedEntityMapping> = self
            .store
            .lock()
            .find_mappings(&filter)?
            .into_iter()
            .filter(|m| visible_from(m, org, project))
            .collect();
        found.sort_by(|a, b| b.scope.cmp(&a.scope));
        Ok(found)
    }
}

impl std::fmt::Debug for MappingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingService")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Application id participates in identity only for app-scoped types.
fn tracked_app(cg: &CgBasicInfo) -> Option<&str> {
    if cg.kind.is_app_scoped() {
        cg.app_id.as_deref()
    } else {
        None
    }
}

/// Scope widening: a mapping is visible from `(org, project)` if it sits at
/// that scope or at any enclosing one.
pub fn visible_from(
    mapping: &MigratedEntityMapping,
    org: Option<&str>,
    project: Option<&str>,
) -> bool {
    let m_org = mapping.org_identifier.as_deref();
    let m_project = mapping.project_identifier.as_deref();
    let account_level = m_org.is_none() && m_project.is_none();
    let org_level = m_org.is_some() && m_org == org && m_project.is_none();

    match Scope::resolve(org, project) {
        Scope::Account => account_level,
        Scope::Org => account_level || org_level,
        Scope::Project => {
            account_level || org_level || (m_org == org && m_project.is_some() && m_project == project)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySourceRepository;
    use ngmig_core::EntityType;
    use ngmig_storage::InMemoryStore;

    fn service() -> (MappingService, Arc<Mutex<InMemoryStore>>) {
        let store = Arc::new(Mutex::new(InMemoryStore::new()));
        let registry = Arc::new(MigratorRegistry::with_generic_capabilities(Arc::new(
            InMemorySourceRepository::new(),
        )));
        (MappingService::new(store.clone(), registry), store)
    }

    fn cg(kind: EntityType, id: &str) -> CgBasicInfo {
        CgBasicInfo {
            account_id: "acc".into(),
            app_id: Some("app1".into()),
            id: id.into(),
            kind,
            name: id.into(),
        }
    }

    fn artifact(cg: CgBasicInfo, ng: NgEntityDetail) -> YamlArtifact {
        YamlArtifact {
            file_name: format!("{}.yaml", ng.identifier),
            yaml: serde_yaml::Value::Null,
            ng_kind: "secret".into(),
            ng_detail: ng,
            cg_basic_info: cg,
            exists: false,
        }
    }

    #[test]
    fn record_is_idempotent() {
        let (svc, store) = service();
        let a = artifact(
            cg(EntityType::Secret, "s1"),
            NgEntityDetail::new("dbPass", Some("o".into()), None),
        );
        assert!(svc.record_mapping(&a).unwrap());
        assert!(!svc.record_mapping(&a).unwrap());
        assert_eq!(store.lock().mapping_count(), 1);
        assert!(svc.exists_mapping(&a.cg_basic_info, &a.ng_detail).unwrap());
    }

    #[test]
    fn untracked_types_are_not_recorded() {
        let (svc, store) = service();
        let a = artifact(
            cg(EntityType::ArtifactStream, "as1"),
            NgEntityDetail::new("stream", None, None),
        );
        assert!(!svc.record_mapping(&a).unwrap());
        assert_eq!(store.lock().mapping_count(), 0);
    }

    #[test]
    fn scope_widening() {
        let (svc, _) = service();
        let secret = cg(EntityType::Secret, "s1");
        svc.record_mapping(&artifact(
            secret.clone(),
            NgEntityDetail::new("s1", Some("o1".into()), None),
        ))
        .unwrap();

        // Project in the same org sees the org-level mapping.
        let hits = svc
            .find_candidate_mappings(&secret, "acc", Some("o1"), Some("p1"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].scope, Scope::Org);

        // A different org does not.
        assert!(svc
            .find_candidate_mappings(&secret, "acc", Some("o2"), Some("p1"))
            .unwrap()
            .is_empty());

        // Account scope never sees narrower mappings.
        assert!(svc
            .find_candidate_mappings(&secret, "acc", None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn candidates_most_specific_first() {
        let (svc, _) = service();
        let secret = cg(EntityType::Secret, "s1");
        for ng in [
            NgEntityDetail::new("s1", None, None),
            NgEntityDetail::new("s1", Some("o1".into()), Some("p1".into())),
            NgEntityDetail::new("s1", Some("o1".into()), None),
        ] {
            svc.record_mapping(&artifact(secret.clone(), ng)).unwrap();
        }
        let hits = svc
            .find_candidate_mappings(&secret, "acc", Some("o1"), Some("p1"))
            .unwrap();
        let scopes: Vec<Scope> = hits.iter().map(|m| m.scope).collect();
        assert_eq!(scopes, vec![Scope::Project, Scope::Org, Scope::Account]);
    }

    #[test]
    fn app_scoped_identity_includes_app() {
        let (svc, _) = service();
        let svc_cg = cg(EntityType::Service, "svc");
        svc.record_mapping(&artifact(svc_cg.clone(), NgEntityDetail::new("svc", None, None)))
            .unwrap();
        let mut other_app = svc_cg.clone();
        other_app.app_id = Some("app2".into());
        assert!(svc
            .find_candidate_mappings(&other_app, "acc", None, None)
            .unwrap()
            .is_empty());
        assert_eq!(
            svc.find_candidate_mappings(&svc_cg, "acc", None, None)
                .unwrap()
                .len(),
            1
        );
    }
}
