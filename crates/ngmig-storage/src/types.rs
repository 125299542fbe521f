//! Storage-layer query types.

use ngmig_core::{EntityType, Scope};

/// Conjunctive filter over stored mappings. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingFilter {
    pub account_id: String,
    pub app_id: Option<String>,
    pub cg_entity_id: Option<String>,
    pub entity_type: Option<EntityType>,
    pub scope: Option<Scope>,
    pub identifier: Option<String>,
    pub fully_qualified_identifier: Option<String>,
}

impl MappingFilter {
    pub fn account(account_id: impl Into<String>) -> Self {
        MappingFilter {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    pub fn app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn cg_entity(mut self, kind: EntityType, id: impl Into<String>) -> Self {
        self.entity_type = Some(kind);
        self.cg_entity_id = Some(id.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn fully_qualified_identifier(mut self, fqn: impl Into<String>) -> Self {
        self.fully_qualified_identifier = Some(fqn.into());
        self
    }

    /// In-process evaluation, shared by backends that cannot push the
    /// filter down.
    pub fn matches(&self, m: &ngmig_core::MigratedEntityMapping) -> bool {
        m.account_id == self.account_id
            && self
                .app_id
                .as_ref()
                .map_or(true, |a| m.app_id.as_ref() == Some(a))
            && self
                .cg_entity_id
                .as_ref()
                .map_or(true, |id| &m.cg_entity_id == id)
            && self.entity_type.map_or(true, |t| m.entity_type == t)
            && self.scope.map_or(true, |s| m.scope == s)
            && self
                .identifier
                .as_ref()
                .map_or(true, |i| &m.identifier == i)
            && self
                .fully_qualified_identifier
                .as_ref()
                .map_or(true, |f| &m.fully_qualified_identifier == f)
    }
}
