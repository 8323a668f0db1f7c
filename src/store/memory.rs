use super::{Document, DocumentStore, Filter, Patch, Tables};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// 进程内存 Store，不持久化，适合测试和短生命周期使用
///
/// # 示例
///
/// ```rust,no_run
/// use crm_hub::store::{DocumentStore, InMemoryStore};
/// use std::sync::Arc;
///
/// # async fn example() -> crm_hub::error::Result<()> {
/// let store = Arc::new(InMemoryStore::new());
/// store.insert("tasks", "t1", serde_json::json!({"title": "hello"})).await?;
/// let doc = store.get("tasks", "t1").await?;
/// # Ok(())
/// # }
/// ```
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, id: &str, body: Value) -> Result<Document> {
        Ok(self.tables.write().await.insert(collection, id, body)?)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.tables.read().await.get(collection, id))
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> Result<Document> {
        Ok(self
            .tables
            .write()
            .await
            .replace(collection, id, body, expected_version)?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.tables.write().await.delete(collection, id))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        Ok(self.tables.read().await.find(collection, filter))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize> {
        Ok(self.tables.read().await.count(collection, filter))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Patch<'_>,
    ) -> Result<usize> {
        Ok(self
            .tables
            .write()
            .await
            .update_many(collection, filter, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CrmError, StoreError};
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = InMemoryStore::new();
        store.insert("tasks", "t1", json!({"a": 1})).await.unwrap();
        let doc = store.get("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(doc.body["a"], 1);
        assert!(store.get("tasks", "t2").await.unwrap().is_none());

        let removed = store.delete("tasks", "t1").await.unwrap();
        assert!(removed.is_some());
        assert!(store.delete("tasks", "t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_replace_maps_to_conflict() {
        let store = InMemoryStore::new();
        store.insert("tasks", "t1", json!({"a": 1})).await.unwrap();
        store
            .replace("tasks", "t1", json!({"a": 2}), Some(1))
            .await
            .unwrap();
        let err = store
            .replace("tasks", "t1", json!({"a": 3}), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Conflict(_)));

        let err = store
            .insert("tasks", "t1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Store(StoreError::DuplicateKey { .. })));
    }
}
