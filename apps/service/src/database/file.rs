//! Record store keeping one JSON file per record.
//!
//! Layout is `<root>/<collection>/<key>.json`. Updates go through a temporary
//! file that is renamed over the record, so readers never observe a partial
//! write. Mutations are serialized within the process, so an update cannot
//! bring back a record deleted while it was being written.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repository::{RecordStore, StoreError, validate_key};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

pub struct FileStore {
    root: PathBuf,
    writes: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), writes: Mutex::new(()) }
    }

    /// Create the root if needed and remove temp files left by interrupted
    /// writes
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await?;

        let removed = store.remove_stale_temp_files().await?;
        if removed > 0 {
            warn!(removed, root = %store.root.display(), "Removed temp files from interrupted writes");
        }
        Ok(store)
    }

    async fn remove_stale_temp_files(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut collections = fs::read_dir(&self.root).await?;

        while let Some(collection) = collections.next_entry().await? {
            if !collection.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(collection.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some(TEMP_EXTENSION) {
                    debug!(path = %path.display(), "Removing stale temp file");
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        validate_key(collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.collection_dir(collection)?.join(format!("{key}.{RECORD_EXTENSION}")))
    }

    /// Write `bytes` to a sibling temp file and move it into place
    async fn replace(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension(format!("{}.{TEMP_EXTENSION}", Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, path).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        Ok(written?)
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let bytes = serde_json::to_vec(record)?;
        let _writes = self.writes.lock().await;
        fs::create_dir_all(self.collection_dir(collection)?).await?;

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::already_exists(collection, key));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn read(&self, collection: &str, key: &str) -> Result<Value, StoreError> {
        let path = self.record_path(collection, key)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(collection, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let bytes = serde_json::to_vec(record)?;

        // Held from the existence check until the rename lands
        let _writes = self.writes.lock().await;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::not_found(collection, key));
        }
        self.replace(&path, &bytes).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let _writes = self.writes.lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(collection, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(collection)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}
