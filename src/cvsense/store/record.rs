// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::StoreError;
use crate::cvsense::mapper::ExternalRecord;

/// Persistence boundary for mapped CV records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a record and return its id
    async fn save(&self, record: ExternalRecord) -> Result<String, StoreError>;

    async fn load(&self, id: &str) -> Result<ExternalRecord, StoreError>;
}

/// Process-local record store. Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, ExternalRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save(&self, record: ExternalRecord) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut records = self.records.write().await;
        records.insert(id.clone(), record);
        log::debug!("Saved record {}", id);
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<ExternalRecord, StoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
