use async_trait::async_trait;
use dashmap::DashMap;

use super::Store;
use crate::StoreError;

/// In-process store. Survives query teardown, not process restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
