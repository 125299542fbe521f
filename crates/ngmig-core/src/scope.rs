//! Destination-side scope resolution and identity.
//!
//! NG entities live at ACCOUNT, ORG, or PROJECT level. [`Scope::resolve`]
//! and [`fully_qualified_identifier`] are pure functions; everything that
//! compares destination identities goes through them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Destination namespace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Account,
    Org,
    Project,
}

impl Scope {
    /// PROJECT if a project is given, else ORG if an org is given, else ACCOUNT.
    pub fn resolve(org: Option<&str>, project: Option<&str>) -> Scope {
        if project.is_some() {
            Scope::Project
        } else if org.is_some() {
            Scope::Org
        } else {
            Scope::Account
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Account => "ACCOUNT",
            Scope::Org => "ORG",
            Scope::Project => "PROJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Scope> {
        match s {
            "ACCOUNT" => Some(Scope::Account),
            "ORG" => Some(Scope::Org),
            "PROJECT" => Some(Scope::Project),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `account[/org][/project]/identifier`, omitting absent segments.
pub fn fully_qualified_identifier(
    account_id: &str,
    org: Option<&str>,
    project: Option<&str>,
    identifier: &str,
) -> String {
    let mut parts = vec![account_id];
    parts.extend(org);
    parts.extend(project);
    parts.push(identifier);
    parts.join("/")
}

/// Destination identity of a migrated entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgEntityDetail {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_identifier: Option<String>,
}

impl NgEntityDetail {
    pub fn new(
        identifier: impl Into<String>,
        org_identifier: Option<String>,
        project_identifier: Option<String>,
    ) -> Self {
        NgEntityDetail {
            identifier: identifier.into(),
            org_identifier,
            project_identifier,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::resolve(
            self.org_identifier.as_deref(),
            self.project_identifier.as_deref(),
        )
    }

    pub fn fully_qualified_identifier(&self, account_id: &str) -> String {
        fully_qualified_identifier(
            account_id,
            self.org_identifier.as_deref(),
            self.project_identifier.as_deref(),
            &self.identifier,
        )
    }

    /// How another NG entity refers to this one: `identifier` when both sit
    /// at the same scope, otherwise prefixed with `account.` or `org.`.
    pub fn scoped_reference(&self, from: Scope) -> String {
        match (self.scope(), from) {
            (Scope::Account, Scope::Account) => self.identifier.clone(),
            (Scope::Account, _) => format!("account.{}", self.identifier),
            (Scope::Org, Scope::Project) => format!("org.{}", self.identifier),
            _ => self.identifier.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_resolution() {
        assert_eq!(Scope::resolve(None, None), Scope::Account);
        assert_eq!(Scope::resolve(Some("o"), None), Scope::Org);
        assert_eq!(Scope::resolve(Some("o"), Some("p")), Scope::Project);
        assert_eq!(Scope::resolve(None, Some("p")), Scope::Project);
    }

    #[test]
    fn fqn_omits_absent_segments() {
        assert_eq!(fully_qualified_identifier("acc", None, None, "id"), "acc/id");
        assert_eq!(
            fully_qualified_identifier("acc", Some("o"), None, "id"),
            "acc/o/id"
        );
        assert_eq!(
            fully_qualified_identifier("acc", Some("o"), Some("p"), "id"),
            "acc/o/p/id"
        );
    }

    #[test]
    fn scoped_reference_prefixes() {
        let account = NgEntityDetail::new("sec", None, None);
        let org = NgEntityDetail::new("sec", Some("o".into()), None);
        assert_eq!(account.scoped_reference(Scope::Project), "account.sec");
        assert_eq!(account.scoped_reference(Scope::Account), "sec");
        assert_eq!(org.scoped_reference(Scope::Project), "org.sec");
        assert_eq!(org.scoped_reference(Scope::Org), "sec");
    }

    #[test]
    fn scope_text_roundtrip() {
        for s in [Scope::Account, Scope::Org, Scope::Project] {
            assert_eq!(Scope::parse(s.as_str()), Some(s));
        }
        assert_eq!(Scope::parse("TEAM"), None);
    }
}
