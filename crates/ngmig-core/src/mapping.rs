//! Persisted source -> destination identity mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::YamlArtifact;
use crate::entity::{CgBasicInfo, EntityType};
use crate::scope::{NgEntityDetail, Scope};

/// Record asserting "source entity X was migrated to destination Y in scope Z".
///
/// Created once per successfully migrated entity and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedEntityMapping {
    /// Storage-assigned id; `None` until inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub cg_entity_id: String,
    pub entity_type: EntityType,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
    pub identifier: String,
    pub fully_qualified_identifier: String,
    pub created_at: DateTime<Utc>,
}

impl MigratedEntityMapping {
    /// Builds an unsaved mapping for `cg` migrated to `ng`.
    pub fn new(cg: &CgBasicInfo, ng: &NgEntityDetail) -> Self {
        MigratedEntityMapping {
            id: None,
            account_id: cg.account_id.clone(),
            app_id: if cg.kind.is_app_scoped() {
                cg.app_id.clone()
            } else {
                None
            },
            cg_entity_id: cg.id.clone(),
            entity_type: cg.kind,
            scope: ng.scope(),
            org_identifier: ng.org_identifier.clone(),
            project_identifier: ng.project_identifier.clone(),
            identifier: ng.identifier.clone(),
            fully_qualified_identifier: ng.fully_qualified_identifier(&cg.account_id),
            created_at: Utc::now(),
        }
    }

    pub fn from_artifact(artifact: &YamlArtifact) -> Self {
        Self::new(&artifact.cg_basic_info, &artifact.ng_detail)
    }

    pub fn ng_detail(&self) -> NgEntityDetail {
        NgEntityDetail::new(
            self.identifier.clone(),
            self.org_identifier.clone(),
            self.project_identifier.clone(),
        )
    }

    /// Whether two records describe the same source -> destination pair.
    pub fn is_equivalent(&self, other: &MigratedEntityMapping) -> bool {
        self.account_id == other.account_id
            && self.cg_entity_id == other.cg_entity_id
            && self.entity_type == other.entity_type
            && self.fully_qualified_identifier == other.fully_qualified_identifier
            && self.scope == other.scope
            && (!self.entity_type.is_app_scoped() || self.app_id == other.app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cg(kind: EntityType, app: Option<&str>) -> CgBasicInfo {
        CgBasicInfo {
            account_id: "acc".into(),
            app_id: app.map(str::to_string),
            id: "e1".into(),
            kind,
            name: "E1".into(),
        }
    }

    #[test]
    fn global_types_drop_app_id() {
        let ng = NgEntityDetail::new("c", None, None);
        let m = MigratedEntityMapping::new(&cg(EntityType::Connector, Some("app")), &ng);
        assert!(m.app_id.is_none());
        assert_eq!(m.scope, Scope::Account);
        assert_eq!(m.fully_qualified_identifier, "acc/c");
    }

    #[test]
    fn equivalence_respects_app_for_app_scoped_types() {
        let ng = NgEntityDetail::new("svc", Some("o".into()), Some("p".into()));
        let a = MigratedEntityMapping::new(&cg(EntityType::Service, Some("app1")), &ng);
        let b = MigratedEntityMapping::new(&cg(EntityType::Service, Some("app2")), &ng);
        assert!(!a.is_equivalent(&b));
        assert!(a.is_equivalent(&a.clone()));
    }
}
