// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! Filesystem document store
//!
//! Stores each resource as a JSON file at `<state_dir>/<kind>/<name>.json`.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{DocumentStore, ResourceKind};
use crate::errors::{WaterworksError, WaterworksResult};

/// Filesystem-based document store
pub struct FilesystemStore {
    state_dir: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at `state_dir`, creating it if needed
    pub fn new(state_dir: PathBuf) -> WaterworksResult<Self> {
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| WaterworksError::FileWriteError {
                path: state_dir.clone(),
                error: format!("Failed to create state directory: {}", e),
            })?;
        }

        Ok(Self { state_dir })
    }

    /// Store rooted at `<base_dir>/.waterworks/state`
    pub fn default_store(base_dir: PathBuf) -> WaterworksResult<Self> {
        Self::new(base_dir.join(".waterworks").join("state"))
    }

    pub fn state_dir(&self) -> &PathBuf {
        &self.state_dir
    }

    fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.state_dir.join(kind.dir_name())
    }

    fn document_path(&self, kind: ResourceKind, name: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", sanitize(name)))
    }
}

// Resource names become file names; keep them to a portable character set.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

#[async_trait]
impl DocumentStore for FilesystemStore {
    async fn load(&self, kind: ResourceKind, name: &str) -> WaterworksResult<Option<serde_json::Value>> {
        let path = self.document_path(kind, name);

        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| WaterworksError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, kind: ResourceKind, name: &str, doc: serde_json::Value) -> WaterworksResult<()> {
        let path = self.document_path(kind, name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| WaterworksError::FileWriteError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }

        let json = serde_json::to_string_pretty(&doc)?;

        tokio::fs::write(&path, json).await.map_err(|e| WaterworksError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        })
    }

    async fn remove(&self, kind: ResourceKind, name: &str) -> WaterworksResult<bool> {
        let path = self.document_path(kind, name);

        if !path.exists() {
            return Ok(false);
        }

        tokio::fs::remove_file(&path).await.map_err(|e| WaterworksError::FileWriteError {
            path: path.clone(),
            error: format!("Failed to remove document: {}", e),
        })?;

        Ok(true)
    }

    async fn list(&self, kind: ResourceKind) -> WaterworksResult<Vec<serde_json::Value>> {
        let dir = self.kind_dir(kind);
        let mut docs = Vec::new();

        if !dir.exists() {
            return Ok(docs);
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| WaterworksError::FileReadError {
                path: path.clone(),
                error: e.to_string(),
            })?;
            docs.push(serde_json::from_str(&content)?);
        }

        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FilesystemProvider, PipelineApi, PipelineDeclaration};

    #[tokio::test]
    async fn test_round_trip_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("state")).unwrap();

        store
            .save(ResourceKind::Role, "app/Build Role", serde_json::json!({"name": "x"}))
            .await
            .unwrap();

        let loaded = store.load(ResourceKind::Role, "app/Build Role").await.unwrap();
        assert_eq!(loaded, Some(serde_json::json!({"name": "x"})));
        assert!(dir.path().join("state/roles/app_Build_Role.json").exists());

        assert_eq!(store.list(ResourceKind::Role).await.unwrap().len(), 1);
        assert!(store.remove(ResourceKind::Role, "app/Build Role").await.unwrap());
        assert!(!store.remove(ResourceKind::Role, "app/Build Role").await.unwrap());
        assert!(store.load(ResourceKind::Role, "app/Build Role").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineDeclaration {
            name: "app-prd".into(),
            role_arn: "arn".into(),
            artifact_bucket: "bucket".into(),
            version: 1,
            stages: vec![],
        };

        let first = FilesystemProvider::new(FilesystemStore::default_store(dir.path().to_path_buf()).unwrap());
        first.create_pipeline(pipeline.clone()).await.unwrap();

        let second = FilesystemProvider::new(FilesystemStore::default_store(dir.path().to_path_buf()).unwrap());
        assert_eq!(second.get_pipeline("app-prd").await.unwrap(), Some(pipeline));
        assert!(second.delete_pipeline("app-prd").await.unwrap());
        assert!(!second.delete_pipeline("app-prd").await.unwrap());
    }
}
