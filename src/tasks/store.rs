//! 任务存储

use super::aggregator::{ProgressAggregator, reconcile};
use crate::error::{CrmError, Result};
use crate::model::{ObjectRef, Task};
use crate::store::{DocumentStore, Filter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const COLLECTION: &str = "tasks";

/// 带存储版本号的任务，写回时用于乐观并发校验
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedTask {
    pub version: u64,
    pub task: Task,
}

/// 任务查询条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub mentor_id: Option<ObjectRef>,
    /// 命中 `memberIds` 或 `memberProgress.memberId`
    pub member_id: Option<ObjectRef>,
    pub task_id: Option<ObjectRef>,
}

impl TaskFilter {
    pub fn for_mentor(mentor: ObjectRef) -> Self {
        Self {
            mentor_id: Some(mentor),
            ..Default::default()
        }
    }

    pub fn for_member(member: ObjectRef) -> Self {
        Self {
            member_id: Some(member),
            ..Default::default()
        }
    }

    fn to_filter(&self) -> Filter {
        let mut filter = Filter::All;
        if let Some(id) = &self.task_id {
            filter = filter.and(Filter::eq("id", id.as_str()));
        }
        if let Some(mentor) = &self.mentor_id {
            filter = filter.and(Filter::eq("mentorId", mentor.as_str()));
        }
        if let Some(member) = &self.member_id {
            filter = filter.and(member_filter(member));
        }
        filter
    }
}

fn member_filter(member: &ObjectRef) -> Filter {
    Filter::Or(vec![
        Filter::eq("memberIds", member.as_str()),
        Filter::eq("memberProgress.memberId", member.as_str()),
    ])
}

/// 任务存储接口
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<()>;

    async fn get(&self, id: &ObjectRef) -> Result<Option<VersionedTask>>;

    /// 以比较交换方式写回，返回新版本号
    async fn replace(&self, task: &Task, expected_version: u64) -> Result<u64>;

    async fn delete(&self, id: &ObjectRef) -> Result<Option<Task>>;

    async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    async fn count(&self, filter: &TaskFilter) -> Result<usize>;

    /// 从所有任务中移除该导师引用，返回受影响任务数
    async fn detach_mentor(&self, mentor: &ObjectRef) -> Result<usize>;

    /// 从所有任务中移除该成员及其进度条目并重新聚合，返回受影响任务数
    async fn detach_member(&self, member: &ObjectRef, aggregator: &ProgressAggregator)
    -> Result<usize>;
}

/// 基于 [`DocumentStore`] 的任务存储
pub struct DocumentTaskStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentTaskStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn decode(body: Value) -> Result<Task> {
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl TaskStore for DocumentTaskStore {
    async fn insert(&self, task: &Task) -> Result<()> {
        let body = serde_json::to_value(task)?;
        self.store.insert(COLLECTION, task.id.as_str(), body).await?;
        debug!(task_id = %task.id, "📝 任务已写入");
        Ok(())
    }

    async fn get(&self, id: &ObjectRef) -> Result<Option<VersionedTask>> {
        let Some(doc) = self.store.get(COLLECTION, id.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(VersionedTask {
            version: doc.version,
            task: decode(doc.body)?,
        }))
    }

    async fn replace(&self, task: &Task, expected_version: u64) -> Result<u64> {
        let body = serde_json::to_value(task)?;
        let doc = self
            .store
            .replace(COLLECTION, task.id.as_str(), body, Some(expected_version))
            .await
            .map_err(|e| match e {
                CrmError::Store(crate::error::StoreError::Missing { .. }) => {
                    CrmError::NotFound("Task not found.".to_string())
                }
                other => other,
            })?;
        Ok(doc.version)
    }

    async fn delete(&self, id: &ObjectRef) -> Result<Option<Task>> {
        match self.store.delete(COLLECTION, id.as_str()).await? {
            Some(doc) => Ok(Some(decode(doc.body)?)),
            None => Ok(None),
        }
    }

    async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store
            .find(COLLECTION, &filter.to_filter())
            .await?
            .into_iter()
            .map(|doc| decode(doc.body))
            .collect()
    }

    async fn count(&self, filter: &TaskFilter) -> Result<usize> {
        self.store.count(COLLECTION, &filter.to_filter()).await
    }

    async fn detach_mentor(&self, mentor: &ObjectRef) -> Result<usize> {
        let target = mentor.clone();
        let patch = move |body: &mut Value| {
            let Ok(mut task) = serde_json::from_value::<Task>(body.clone()) else {
                return false;
            };
            if task.mentor_id.as_ref() != Some(&target) {
                return false;
            }
            task.mentor_id = None;
            write_back(body, &task)
        };
        let modified = self
            .store
            .update_many(COLLECTION, &Filter::eq("mentorId", mentor.as_str()), &patch)
            .await?;
        info!(mentor_id = %mentor, tasks = modified, "🧹 已从任务中移除导师引用");
        Ok(modified)
    }

    async fn detach_member(
        &self,
        member: &ObjectRef,
        aggregator: &ProgressAggregator,
    ) -> Result<usize> {
        let target = member.clone();
        let aggregator = *aggregator;
        let patch = move |body: &mut Value| {
            let Ok(mut task) = serde_json::from_value::<Task>(body.clone()) else {
                return false;
            };
            let before = (task.member_ids.len(), task.member_progress.len());
            task.member_ids.retain(|id| id != &target);
            task.member_progress.retain(|mp| mp.member_id != target);
            if before == (task.member_ids.len(), task.member_progress.len()) {
                return false;
            }
            task.member_progress = reconcile(&task.member_ids, &task.member_progress);
            match aggregator.aggregate(&task.member_ids, &task.member_progress, None) {
                Some(agg) => {
                    task.member_progress = agg.member_progress;
                    task.progress = agg.progress;
                    task.status = agg.status;
                }
                None => task.progress = task.status.progress(),
            }
            write_back(body, &task)
        };
        let modified = self
            .store
            .update_many(COLLECTION, &member_filter(member), &patch)
            .await?;
        info!(member_id = %member, tasks = modified, "🧹 已从任务中移除成员引用");
        Ok(modified)
    }
}

fn write_back(body: &mut Value, task: &Task) -> bool {
    match serde_json::to_value(task) {
        Ok(value) => {
            *body = value;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberProgress, TaskStatus};
    use crate::store::InMemoryStore;

    fn store() -> DocumentTaskStore {
        DocumentTaskStore::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_find_by_member_covers_stale_progress_entries() {
        let tasks = store();
        let a = ObjectRef::generate();
        let b = ObjectRef::generate();

        let mut t1 = Task::new("t1", "d", TaskStatus::Pending).with_members(vec![a.clone()]);
        t1.member_progress = vec![MemberProgress::pending(a.clone())];
        let mut t2 = Task::new("t2", "d", TaskStatus::Pending);
        t2.member_progress = vec![MemberProgress::pending(a.clone())];
        let t3 = Task::new("t3", "d", TaskStatus::Pending).with_members(vec![b.clone()]);
        for t in [&t1, &t2, &t3] {
            tasks.insert(t).await.unwrap();
        }

        let found = tasks.find(&TaskFilter::for_member(a.clone())).await.unwrap();
        let titles: Vec<&str> = found.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t1", "t2"]);

        let narrowed = TaskFilter {
            task_id: Some(t2.id.clone()),
            ..TaskFilter::for_member(a)
        };
        assert_eq!(tasks.count(&narrowed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_rejects_stale_version() {
        let tasks = store();
        let task = Task::new("t", "d", TaskStatus::Pending);
        tasks.insert(&task).await.unwrap();

        let loaded = tasks.get(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        let v2 = tasks.replace(&loaded.task, loaded.version).await.unwrap();
        assert_eq!(v2, 2);

        let err = tasks.replace(&loaded.task, loaded.version).await.unwrap_err();
        assert!(matches!(err, CrmError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_detach_mentor_keeps_task() {
        let tasks = store();
        let mentor = ObjectRef::generate();
        let task = Task::new("t", "d", TaskStatus::InProgress).with_mentor(Some(mentor.clone()));
        tasks.insert(&task).await.unwrap();

        assert_eq!(tasks.detach_mentor(&mentor).await.unwrap(), 1);
        let loaded = tasks.get(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.task.mentor_id, None);
        assert_eq!(loaded.task.title, "t");
        assert_eq!(tasks.detach_mentor(&mentor).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_detach_member_reaggregates() {
        let tasks = store();
        let a = ObjectRef::generate();
        let b = ObjectRef::generate();
        let mut task = Task::new("t", "d", TaskStatus::InProgress)
            .with_members(vec![a.clone(), b.clone()]);
        task.member_progress = vec![
            MemberProgress::new(a.clone(), TaskStatus::Completed),
            MemberProgress::pending(b.clone()),
        ];
        task.progress = 50;
        tasks.insert(&task).await.unwrap();

        let n = tasks
            .detach_member(&b, &ProgressAggregator::default())
            .await
            .unwrap();
        assert_eq!(n, 1);

        let loaded = tasks.get(&task.id).await.unwrap().unwrap().task;
        assert_eq!(loaded.member_ids, vec![a.clone()]);
        assert_eq!(loaded.member_progress.len(), 1);
        assert_eq!(loaded.progress, 100);
        assert_eq!(loaded.status, TaskStatus::Completed);

        tasks
            .detach_member(&a, &ProgressAggregator::default())
            .await
            .unwrap();
        let loaded = tasks.get(&task.id).await.unwrap().unwrap().task;
        assert!(loaded.member_ids.is_empty());
        assert_eq!(loaded.progress, TaskStatus::Completed.progress());
    }
}
