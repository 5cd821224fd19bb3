/// Record store abstraction and its backends
///
/// Records are JSON documents addressed by collection and key. The engine
/// only reads and updates the `checks` collection; `users` and `tokens` are
/// maintained by the account layer.
pub mod file;
pub mod memory;
pub mod migrations;
pub mod repository;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{LibsqlStore, RecordStore, StoreError};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::{StoreBackend, StoreSection};
use crate::pool::{LibsqlManager, LibsqlPool};

pub const USERS: &str = "users";
pub const TOKENS: &str = "tokens";
pub const CHECKS: &str = "checks";

/// Open a libsql database file and run migrations
pub async fn open_libsql(path: &Path) -> Result<LibsqlStore> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let db = libsql::Builder::new_local(path).build().await?;
    let pool: LibsqlPool = deadpool::managed::Pool::builder(LibsqlManager::new(db)).build()?;

    let conn = pool.get().await.map_err(|e| anyhow::anyhow!("failed to get connection: {e}"))?;
    migrations::run_migrations(&conn).await?;
    drop(conn);

    Ok(LibsqlStore::new_from_pool(pool))
}

/// Open the store selected in the configuration
pub async fn open_store(section: &StoreSection) -> Result<Arc<dyn RecordStore>> {
    info!("Opening {} record store at {}", section.backend, section.path.display());

    Ok(match section.backend {
        StoreBackend::File => Arc::new(FileStore::open(&section.path).await?),
        StoreBackend::Libsql => Arc::new(open_libsql(&section.path).await?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_store_libsql_backend() -> Result<()> {
        let temp_dir = tempdir()?;
        let section = StoreSection {
            backend: StoreBackend::Libsql,
            path: temp_dir.path().join("nested/records.db"),
        };

        let store = open_store(&section).await?;
        store.create(CHECKS, "abc", &json!({"id": "abc"})).await?;
        assert_eq!(store.list(CHECKS).await?, vec!["abc".to_string()]);
        assert!(section.path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_store_file_backend_creates_root() -> Result<()> {
        let temp_dir = tempdir()?;
        let section = StoreSection { backend: StoreBackend::File, path: temp_dir.path().join("data") };

        let store = open_store(&section).await?;
        assert!(store.list(CHECKS).await?.is_empty());
        assert!(section.path.is_dir());
        Ok(())
    }
}
