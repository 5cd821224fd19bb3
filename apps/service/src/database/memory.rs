use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::repository::{RecordStore, StoreError, validate_key};

/// In-process record store, used for dry runs and tests
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_key(collection: &str, key: &str) -> Result<(String, String), StoreError> {
    validate_key(collection)?;
    validate_key(key)?;
    Ok((collection.to_string(), key.to_string()))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        let id = record_key(collection, key)?;
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StoreError::already_exists(collection, key));
        }
        records.insert(id, record.clone());
        Ok(())
    }

    async fn read(&self, collection: &str, key: &str) -> Result<Value, StoreError> {
        let id = record_key(collection, key)?;
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        let id = record_key(collection, key)?;
        match self.records.write().await.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(collection, key)),
        }
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let id = record_key(collection, key)?;
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        validate_key(collection)?;
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, key)| key.clone())
            .collect())
    }
}
