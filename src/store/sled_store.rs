use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::Store;
use crate::constants::SLED_RESPONSE_TREE;
use crate::StoreError;

/// Store backed by an embedded sled database, so cached responses survive restarts
#[derive(Debug, Clone)]
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened sled response store");
        Self::with_db(&db)
    }

    pub fn with_db(db: &sled::Db) -> std::result::Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree(SLED_RESPONSE_TREE)?,
        })
    }

    /// Flushes dirty buffers; returns the number of bytes flushed
    pub async fn flush(&self) -> std::result::Result<usize, StoreError> {
        Ok(self.tree.flush_async().await?)
    }
}

#[async_trait]
impl Store for SledStore {
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), StoreError> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }
}
