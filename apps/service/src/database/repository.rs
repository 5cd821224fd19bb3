use async_trait::async_trait;
use chrono::Utc;
use libsql::params;
use serde_json::Value;
use thiserror::Error;

use crate::pool::{LibsqlManager, LibsqlPool};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {collection}/{key} not found")]
    NotFound { collection: String, key: String },

    #[error("record {collection}/{key} already exists")]
    AlreadyExists { collection: String, key: String },

    #[error("invalid record key '{0}'")]
    InvalidKey(String),

    #[error("database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound { collection: collection.to_string(), key: key.to_string() }
    }

    pub fn already_exists(collection: &str, key: &str) -> Self {
        Self::AlreadyExists { collection: collection.to_string(), key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Durable keyed storage for users, tokens and checks
///
/// Each call is atomic on its own. Nothing is atomic across calls, so a
/// read followed by an update can overwrite a concurrent edit.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record, failing if the key is taken
    async fn create(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError>;

    /// Fetch a record
    async fn read(&self, collection: &str, key: &str) -> Result<Value, StoreError>;

    /// Replace an existing record
    async fn update(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError>;

    /// Remove an existing record
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// Keys of every record in a collection, in no particular order
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;
}

/// Keys and collection names end up in file paths, so keep them to a plain
/// file-name alphabet.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid { Ok(()) } else { Err(StoreError::InvalidKey(key.to_string())) }
}

/// LibSQL-backed record store
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    /// Create a store from an already migrated pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for LibsqlStore {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        validate_key(collection)?;
        validate_key(key)?;
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;

        let inserted = conn
            .execute(
                "INSERT INTO records (collection, key, body, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT (collection, key) DO NOTHING",
                params![collection.to_string(), key.to_string(), body, Utc::now().timestamp()],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::already_exists(collection, key));
        }
        Ok(())
    }

    async fn read(&self, collection: &str, key: &str) -> Result<Value, StoreError> {
        validate_key(collection)?;
        validate_key(key)?;
        let conn = self.get_conn().await?;

        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ? AND key = ?",
                params![collection.to_string(), key.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(serde_json::from_str(&body)?)
            }
            None => Err(StoreError::not_found(collection, key)),
        }
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        validate_key(collection)?;
        validate_key(key)?;
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;

        let updated = conn
            .execute(
                "UPDATE records SET body = ?, updated_at = ? WHERE collection = ? AND key = ?",
                params![body, Utc::now().timestamp(), collection.to_string(), key.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::not_found(collection, key));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        validate_key(collection)?;
        validate_key(key)?;
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND key = ?",
                params![collection.to_string(), key.to_string()],
            )
            .await?;

        if deleted == 0 {
            return Err(StoreError::not_found(collection, key));
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        validate_key(collection)?;
        let conn = self.get_conn().await?;

        let mut rows = conn
            .query("SELECT key FROM records WHERE collection = ?", params![collection.to_string()])
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }
}
