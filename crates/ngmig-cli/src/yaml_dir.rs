//! Destination that writes each created document as a YAML file.

use std::fs;
use std::path::{Path, PathBuf};

use ngmig_core::YamlArtifact;
use ngmig_engine::{CreateOutcome, DestinationClient, EngineError};

/// Writes documents under `root`, one file per `YamlArtifact::file_name`.
/// Existing files are never overwritten.
pub struct YamlDirClient {
    root: PathBuf,
}

impl YamlDirClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        YamlDirClient { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DestinationClient for YamlDirClient {
    fn create_entity(&self, artifact: &YamlArtifact) -> Result<CreateOutcome, EngineError> {
        let path = self.root.join(&artifact.file_name);
        if path.exists() {
            return Ok(CreateOutcome::rejected(format!(
                "{} already exists",
                path.display()
            )));
        }
        let text = artifact.to_yaml_string()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Client {
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }
        fs::write(&path, text).map_err(|e| EngineError::Client {
            reason: format!("cannot write {}: {}", path.display(), e),
        })?;
        tracing::debug!(path = %path.display(), "wrote document");
        Ok(CreateOutcome::created(artifact.ng_detail.identifier.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ngmig_core::{CgBasicInfo, EntityType, NgEntityDetail, SourceEntity};
    use ngmig_engine::{InMemorySourceRepository, MigrationEngine, MigrationInput};
    use ngmig_storage::InMemoryStore;

    fn artifact() -> YamlArtifact {
        YamlArtifact {
            file_name: "connector/dockerHub.yaml".into(),
            yaml: serde_yaml::from_str("connector:\n  identifier: dockerHub\n").unwrap(),
            ng_kind: "connector".into(),
            ng_detail: NgEntityDetail::new("dockerHub", None, None),
            cg_basic_info: CgBasicInfo {
                account_id: "acc".into(),
                app_id: None,
                id: "c".into(),
                kind: EntityType::Connector,
                name: "docker hub".into(),
            },
            exists: false,
        }
    }

    #[test]
    fn writes_once_then_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let client = YamlDirClient::new(dir.path());

        let first = client.create_entity(&artifact()).unwrap();
        assert!(first.success);
        let written = fs::read_to_string(dir.path().join("connector/dockerHub.yaml")).unwrap();
        assert!(written.contains("identifier: dockerHub"));

        let second = client.create_entity(&artifact()).unwrap();
        assert!(!second.success);
    }

    #[test]
    fn two_projects_share_one_output_dir() {
        let source = || {
            let mut repo = InMemorySourceRepository::new();
            repo.insert(
                "acc",
                SourceEntity {
                    id: "c".into(),
                    kind: EntityType::Connector,
                    name: "docker hub".into(),
                    app_id: None,
                    spec: serde_json::json!({}),
                    references: Vec::new(),
                },
            );
            Arc::new(repo)
        };
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(YamlDirClient::new(dir.path()));

        for project in ["p1", "p2"] {
            // Fresh mapping store per run so the second project is not deduped.
            let store = Arc::new(parking_lot::Mutex::new(InMemoryStore::new()));
            let engine = MigrationEngine::generic(source(), store);
            let graph = engine
                .discovery()
                .discover_single("acc", None, "c", EntityType::Connector)
                .unwrap();
            let input = MigrationInput::new("acc").with_project("o", project);
            let summary = engine.import(&graph, &input, client.clone()).unwrap();
            assert!(summary.errors.is_empty(), "{:?}", summary.errors);
            assert_eq!(summary.successfully_migrated(), 1);
        }

        assert!(dir.path().join("o/p1/connector/dockerHub.yaml").exists());
        assert!(dir.path().join("o/p2/connector/dockerHub.yaml").exists());
    }
}
