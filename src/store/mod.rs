//! 文档存储
//!
//! 以 `collection / id / body` 组织 JSON 文档，每个文档带单调递增的
//! `version`，用于任务写入时的乐观并发校验。单个文档的写入是原子的；
//! 多文档序列（例如任务更新 + 若干通知插入）不构成事务。
//!
//! ## 内置实现
//!
//! - [`InMemoryStore`]：进程内存，适合测试
//! - [`FileStore`]：JSON 文件持久化，每次写入后整体落盘
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use crm_hub::store::{DocumentStore, Filter, InMemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> crm_hub::error::Result<()> {
//! let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
//! store.insert("tasks", "t1", serde_json::json!({"title": "hello"})).await?;
//! let hits = store.find("tasks", &Filter::eq("title", "hello")).await?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

mod file;
mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

// ── Document ─────────────────────────────────────────────────────────────────

/// 存储中的单个文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub id: String,
    /// 每次写入 +1，首次插入为 1
    pub version: u64,
    pub body: Value,
    /// 全局插入序号，`find` 按此排序
    pub seq: u64,
    /// 创建时间（Unix 秒）
    pub created_at: u64,
    /// 最后更新时间（Unix 秒）
    pub updated_at: u64,
}

// ── Filter ───────────────────────────────────────────────────────────────────

/// 文档过滤条件
///
/// `Eq` 的路径用 `.` 分隔；路径途经数组时只要任一元素命中即算匹配，
/// 路径终点是数组时判断是否包含该值。
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut clauses) => {
                clauses.push(other);
                Filter::And(clauses)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => {
                let segments: Vec<&str> = path.split('.').collect();
                path_matches(body, &segments, expected)
            }
            Filter::And(clauses) => clauses.iter().all(|f| f.matches(body)),
            Filter::Or(clauses) => clauses.iter().any(|f| f.matches(body)),
        }
    }
}

fn path_matches(value: &Value, segments: &[&str], expected: &Value) -> bool {
    match segments.split_first() {
        None => match value {
            Value::Array(items) => value == expected || items.contains(expected),
            _ => value == expected,
        },
        Some((head, rest)) => match value {
            Value::Object(map) => map
                .get(*head)
                .is_some_and(|child| path_matches(child, rest, expected)),
            Value::Array(items) => items
                .iter()
                .any(|item| path_matches(item, segments, expected)),
            _ => false,
        },
    }
}

/// `update_many` 的补丁函数：就地修改文档体，返回是否发生了修改
pub type Patch<'a> = &'a (dyn Fn(&mut Value) -> bool + Send + Sync);

// ── DocumentStore trait ──────────────────────────────────────────────────────

/// 文档数据库的统一存储接口
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 插入新文档，主键已存在时返回 `DuplicateKey`
    async fn insert(&self, collection: &str, id: &str, body: Value) -> Result<Document>;

    /// 按 ID 精确获取
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// 整体替换文档体
    ///
    /// `expected_version` 为 `Some(v)` 时做比较交换，版本不一致返回
    /// `VersionConflict`。
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> Result<Document>;

    /// 删除文档，返回被删除的文档（若存在）
    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// 按过滤条件查询，结果按插入顺序排列
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize>;

    /// 对所有命中文档逐个应用补丁，返回被修改的文档数
    async fn update_many(&self, collection: &str, filter: &Filter, patch: Patch<'_>)
    -> Result<usize>;
}

// ── Tables：两个后端共用的内存状态 ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    collections: HashMap<String, HashMap<String, Document>>,
    #[serde(default)]
    next_seq: u64,
}

impl Tables {
    pub(crate) fn document_count(&self) -> usize {
        self.collections.values().map(|c| c.len()).sum()
    }

    pub(crate) fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub(crate) fn insert(
        &mut self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> std::result::Result<Document, StoreError> {
        let bucket = self.collections.entry(collection.to_string()).or_default();
        if bucket.contains_key(id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        let now = now_secs();
        let doc = Document {
            collection: collection.to_string(),
            id: id.to_string(),
            version: 1,
            body,
            seq,
            created_at: now,
            updated_at: now,
        };
        bucket.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    pub(crate) fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|b| b.get(id))
            .cloned()
    }

    pub(crate) fn replace(
        &mut self,
        collection: &str,
        id: &str,
        body: Value,
        expected_version: Option<u64>,
    ) -> std::result::Result<Document, StoreError> {
        let Some(doc) = self
            .collections
            .get_mut(collection)
            .and_then(|b| b.get_mut(id))
        else {
            return Err(StoreError::Missing {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        if let Some(expected) = expected_version
            && expected != doc.version
        {
            return Err(StoreError::VersionConflict {
                collection: collection.to_string(),
                id: id.to_string(),
                expected,
                actual: doc.version,
            });
        }
        doc.body = body;
        doc.version += 1;
        doc.updated_at = now_secs();
        Ok(doc.clone())
    }

    pub(crate) fn delete(&mut self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get_mut(collection)
            .and_then(|b| b.remove(id))
    }

    pub(crate) fn find(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        let Some(bucket) = self.collections.get(collection) else {
            return vec![];
        };
        let mut hits: Vec<Document> = bucket
            .values()
            .filter(|doc| filter.matches(&doc.body))
            .cloned()
            .collect();
        hits.sort_by_key(|doc| doc.seq);
        hits
    }

    pub(crate) fn count(&self, collection: &str, filter: &Filter) -> usize {
        self.collections
            .get(collection)
            .map(|b| b.values().filter(|doc| filter.matches(&doc.body)).count())
            .unwrap_or(0)
    }

    pub(crate) fn update_many(&mut self, collection: &str, filter: &Filter, patch: Patch<'_>) -> usize {
        let Some(bucket) = self.collections.get_mut(collection) else {
            return 0;
        };
        let now = now_secs();
        let mut modified = 0;
        for doc in bucket.values_mut() {
            if !filter.matches(&doc.body) {
                continue;
            }
            if patch(&mut doc.body) {
                doc.version += 1;
                doc.updated_at = now;
                modified += 1;
            }
        }
        modified
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
