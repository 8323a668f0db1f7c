use super::{Document, DocumentStore, Filter, Patch, Tables};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 基于 JSON 文件的持久化 Store
///
/// 存储格式：
/// ```json
/// {
///   "collections": {
///     "tasks": {
///       "<id>": { "collection": "tasks", "id": "<id>", "version": 3, "body": {...}, "seq": 1, "created_at": 123, "updated_at": 456 }
///     }
///   },
///   "next_seq": 1
/// }
/// ```
///
/// 每次写入后先写临时文件再 rename，避免进程中断留下半截文件。
/// 落盘期间持有写锁；落盘失败时内存状态回滚到写入前。
pub struct FileStore {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl FileStore {
    /// 打开或创建 Store 文件，自动建父目录
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::IoError(format!("创建目录失败: {e}")))?;
        }
        let tables = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::IoError(format!("读取 store 文件失败: {e}")))?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Store 文件解析失败，从空状态开始: {e}");
                Tables::default()
            })
        } else {
            Tables::default()
        };
        info!(
            path = %path.display(),
            collections = tables.collection_count(),
            documents = tables.document_count(),
            "🗄️ FileStore 初始化"
        );
        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, tables: &Tables) -> Result<()> {
        let json = serde_json::to_string_pretty(tables)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::IoError(format!("写入 store 文件失败: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::IoError(format!("替换 store 文件失败: {e}")))?;
        debug!(path = %self.path.display(), "💾 Store 已持久化");
        Ok(())
    }

    /// 落盘；失败则把内存恢复成 `snapshot`
    async fn commit(&self, tables: &mut Tables, snapshot: Tables) -> Result<()> {
        if let Err(e) = self.flush(tables).await {
            warn!(path = %self.path.display(), error = %e, "⚠️ Store 落盘失败，内存状态已回滚");
            *tables = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn insert(&self, collection: &str, id: &str, body: Value) -> Result<Document> {
        let mut tables = self.tables.write().await;
        let snapshot = tables.clone();
        let doc = tables.insert(collection, id, body)?;
        self.commit(&mut tables, snapshot).await?;
        Ok(doc)
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
        let mut tables = self.tables.write().await;
        let snapshot = tables.clone();
        let doc = tables.replace(collection, id, body, expected_version)?;
        self.commit(&mut tables, snapshot).await?;
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut tables = self.tables.write().await;
        let snapshot = tables.clone();
        let removed = tables.delete(collection, id);
        if removed.is_some() {
            self.commit(&mut tables, snapshot).await?;
        }
        Ok(removed)
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
        let mut tables = self.tables.write().await;
        let snapshot = tables.clone();
        let modified = tables.update_many(collection, filter, patch);
        if modified > 0 {
            self.commit(&mut tables, snapshot).await?;
        }
        Ok(modified)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}
