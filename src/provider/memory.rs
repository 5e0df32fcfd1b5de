// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! In-memory document store

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DocumentStore, ResourceKind};
use crate::errors::WaterworksResult;

/// Document store held in process memory
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<(&'static str, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, kind: ResourceKind, name: &str) -> WaterworksResult<Option<serde_json::Value>> {
        Ok(self.docs.read().await.get(&(kind.dir_name(), name.to_string())).cloned())
    }

    async fn save(&self, kind: ResourceKind, name: &str, doc: serde_json::Value) -> WaterworksResult<()> {
        self.docs.write().await.insert((kind.dir_name(), name.to_string()), doc);
        Ok(())
    }

    async fn remove(&self, kind: ResourceKind, name: &str) -> WaterworksResult<bool> {
        Ok(self
            .docs
            .write()
            .await
            .remove(&(kind.dir_name(), name.to_string()))
            .is_some())
    }

    async fn list(&self, kind: ResourceKind) -> WaterworksResult<Vec<serde_json::Value>> {
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter(|((k, _), _)| *k == kind.dir_name())
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
