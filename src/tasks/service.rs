//! 任务编排
//!
//! 每个变更接口的流程：校验 → 读取 → 修改 → 聚合 → 带版本号写回 → 传播通知。
//! 校验在任何写入之前完成；写入失败时不会发出通知；通知结果不影响返回值。

use super::aggregator::{MemberUpdate, ProgressAggregator, reconcile};
use super::store::{TaskFilter, TaskStore};
use crate::error::{CrmError, Result, ValidationError};
use crate::model::{Credential, MemberProgress, ObjectRef, Task, TaskStatus};
use crate::notifications::NotificationPropagator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// `POST /task/create` 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: Option<String>,
    /// 派生字段，只为兼容旧客户端而接受
    pub progress: Option<Value>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub mentor_id: Option<String>,
    #[serde(alias = "memberIds")]
    pub member_id: Option<Vec<String>>,
    pub created_by: Option<String>,
}

/// `PUT /task/edit/:id` 请求体，所有字段可选
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTask {
    pub title: Option<String>,
    /// 派生字段：接受但从不生效
    pub progress: Option<Value>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    /// 空字符串表示解除导师
    pub mentor_id: Option<String>,
    #[serde(alias = "memberIds")]
    pub member_id: Option<Vec<String>>,
}

/// `PUT /task/updateStatus` 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatusUpdate {
    pub task_id: Option<String>,
    pub member_id: Option<String>,
    pub status: Option<String>,
}

/// `POST /task/memberTask` 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTaskQuery {
    pub member_id: Option<String>,
    pub task_id: Option<String>,
}

/// `POST /task/list` 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub mentor_id: Option<String>,
    pub member_id: Option<String>,
}

/// 成员视角的任务条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTaskView {
    pub task_id: ObjectRef,
    pub title: String,
    pub due_date: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub member_status: TaskStatus,
    pub member_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<ObjectRef>,
}

impl MemberTaskView {
    fn new(task: &Task, member: &ObjectRef) -> Self {
        let entry = task
            .member_entry(member)
            .cloned()
            .unwrap_or_else(|| MemberProgress::pending(member.clone()));
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            due_date: task.due_date.clone(),
            status: task.status,
            progress: task.progress,
            member_status: entry.status,
            member_progress: entry.progress,
            mentor_id: task.mentor_id.clone(),
        }
    }
}

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    propagator: Arc<NotificationPropagator>,
    aggregator: ProgressAggregator,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        propagator: Arc<NotificationPropagator>,
        aggregator: ProgressAggregator,
    ) -> Self {
        Self {
            tasks,
            propagator,
            aggregator,
        }
    }

    pub async fn create(&self, credential: &Credential, req: CreateTask) -> Result<Task> {
        let title = required(req.title, "title")?;
        let due_date = required(req.due_date, "dueDate")?;
        let status = match req.status.as_deref() {
            Some(raw) => parse_status(raw)?,
            None => TaskStatus::Pending,
        };
        let mentor = optional_ref(req.mentor_id.as_deref(), "mentorId")?;
        let members = ObjectRef::parse_set(&req.member_id.unwrap_or_default(), "memberId")?;
        let created_by = optional_ref(req.created_by.as_deref(), "createdBy")?;

        let actor = self.propagator.resolve_actor(credential).await;
        let mut task = Task::new(title, due_date, status)
            .with_mentor(mentor)
            .with_members(members)
            .with_creator(created_by.or(actor.id.clone()));
        task.member_progress = reconcile(&task.member_ids, &task.member_progress);
        self.recompute(&mut task, None);

        self.tasks.insert(&task).await?;
        info!(
            task_id = %task.id,
            members = task.member_ids.len(),
            status = %task.status,
            "📋 任务已创建"
        );

        let report = self.propagator.task_created(&task).await;
        debug!(task_id = %task.id, sent = report.sent, failed = report.failed, "新建任务通知完成");
        Ok(task)
    }

    pub async fn list(&self, query: TaskListQuery) -> Result<Vec<Task>> {
        let filter = TaskFilter {
            mentor_id: optional_ref(query.mentor_id.as_deref(), "mentorId")?,
            member_id: optional_ref(query.member_id.as_deref(), "memberId")?,
            task_id: None,
        };
        self.tasks.find(&filter).await
    }

    pub async fn edit(&self, credential: &Credential, id: &str, req: EditTask) -> Result<Task> {
        let id = ObjectRef::parse(id, "task ID")?;
        let title = non_empty(req.title);
        let due_date = non_empty(req.due_date);
        let status = req.status.as_deref().map(parse_status).transpose()?;
        let mentor = match req.mentor_id.as_deref() {
            Some(raw) => Some(optional_ref(Some(raw), "mentorId")?),
            None => None,
        };
        let members = req
            .member_id
            .as_deref()
            .map(|raw| ObjectRef::parse_set(raw, "memberId"))
            .transpose()?;

        let nothing_to_apply = title.is_none()
            && due_date.is_none()
            && status.is_none()
            && mentor.is_none()
            && members.is_none();
        if nothing_to_apply {
            return Err(ValidationError::NoFieldsToUpdate.into());
        }

        let loaded = self
            .tasks
            .get(&id)
            .await?
            .ok_or_else(|| CrmError::NotFound("Task not found.".to_string()))?;
        let before = loaded.task.clone();
        let mut task = loaded.task;

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(due_date) = due_date {
            task.due_date = due_date;
        }
        if let Some(mentor) = mentor {
            task.mentor_id = mentor;
        }
        if let Some(members) = members {
            task.member_ids = members;
            task.member_progress = reconcile(&task.member_ids, &task.member_progress);
        }
        if let Some(status) = status {
            if task.is_member_tracked() {
                // 直接指定状态时覆盖所有成员的进度
                task.member_progress = task
                    .member_ids
                    .iter()
                    .map(|m| MemberProgress::new(m.clone(), status))
                    .collect();
            }
            task.status = status;
        }
        self.recompute(&mut task, None);

        self.tasks.replace(&task, loaded.version).await?;
        info!(task_id = %task.id, status = %task.status, progress = task.progress, "✏️ 任务已更新");

        let actor = self.propagator.resolve_actor(credential).await;
        self.propagator.task_edited(&before, &task, &actor).await;
        Ok(task)
    }

    pub async fn delete(&self, id: &str) -> Result<Task> {
        let id = ObjectRef::parse(id, "task ID")?;
        let removed = self
            .tasks
            .delete(&id)
            .await?
            .ok_or_else(|| CrmError::NotFound("Task not found.".to_string()))?;
        info!(task_id = %id, "🗑️ 任务已删除");
        Ok(removed)
    }

    /// 更新单个成员的状态，并重新聚合整体进度
    pub async fn update_member_status(
        &self,
        credential: &Credential,
        req: MemberStatusUpdate,
    ) -> Result<Task> {
        let task_id = required(req.task_id, "taskId")?;
        let member_id = required(req.member_id, "memberId")?;
        let raw_status = required(req.status, "status")?;
        let status = parse_status(&raw_status)?;
        let task_id = ObjectRef::parse(&task_id, "task ID")?;
        let member = ObjectRef::parse(&member_id, "member ID")?;

        let loaded = self
            .tasks
            .get(&task_id)
            .await?
            .ok_or_else(|| CrmError::NotFound("Task not found.".to_string()))?;
        let mut task = loaded.task;
        if !task.is_member_tracked() {
            return Err(CrmError::InvalidState(
                "This task has no assigned members to track.".to_string(),
            ));
        }
        if !task.has_member(&member) {
            return Err(CrmError::NotFound(
                "Member not assigned to this task.".to_string(),
            ));
        }

        let update = MemberUpdate {
            member_id: member.clone(),
            status,
        };
        self.recompute(&mut task, Some(&update));
        self.tasks.replace(&task, loaded.version).await?;
        info!(
            task_id = %task.id,
            member_id = %member,
            member_status = %status,
            progress = task.progress,
            status = %task.status,
            "📈 成员进度已更新"
        );

        let actor = self.propagator.resolve_actor(credential).await;
        self.propagator
            .member_status_updated(&task, status, &actor)
            .await;
        Ok(task)
    }

    pub async fn member_tasks(&self, query: MemberTaskQuery) -> Result<Vec<MemberTaskView>> {
        let member_id = required(query.member_id, "memberId")?;
        let member = ObjectRef::parse(&member_id, "member ID")?;
        let filter = TaskFilter {
            member_id: Some(member.clone()),
            task_id: optional_ref(query.task_id.as_deref(), "task ID")?,
            mentor_id: None,
        };
        let tasks = self.tasks.find(&filter).await?;
        Ok(tasks
            .iter()
            .map(|task| MemberTaskView::new(task, &member))
            .collect())
    }

    /// 有成员时按聚合结果覆盖状态/进度，否则进度取状态映射值
    fn recompute(&self, task: &mut Task, update: Option<&MemberUpdate>) {
        match self
            .aggregator
            .aggregate(&task.member_ids, &task.member_progress, update)
        {
            Some(agg) => {
                task.member_progress = agg.member_progress;
                task.progress = agg.progress;
                task.status = agg.status;
            }
            None => task.progress = task.status.progress(),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required(raw: Option<String>, field: &str) -> Result<String> {
    non_empty(raw).ok_or_else(|| ValidationError::MissingField(field.to_string()).into())
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    TaskStatus::parse(raw).ok_or_else(|| ValidationError::InvalidStatus(raw.to_string()).into())
}

/// 缺省或空字符串视为未提供
fn optional_ref(raw: Option<&str>, field: &str) -> Result<Option<ObjectRef>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Ok(Some(ObjectRef::parse(s, field)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::notifications::{ADMIN_TO_MEMBER, ADMIN_TO_MENTOR, MENTOR_TO_MEMBER};
    use crate::store::InMemoryStore;
    use crate::tasks::DocumentTaskStore;
    use crate::testing::{MockIdentityDirectory, MockNotificationSink};
    use std::time::Duration;

    struct Fixture {
        service: TaskService,
        sink: Arc<MockNotificationSink>,
        tasks: Arc<dyn TaskStore>,
        mentor: ObjectRef,
        alice: ObjectRef,
        bob: ObjectRef,
    }

    fn fixture_with(sink: MockNotificationSink) -> Fixture {
        let mentor = ObjectRef::generate();
        let alice = ObjectRef::generate();
        let bob = ObjectRef::generate();
        let directory = MockIdentityDirectory::new()
            .with_person(&mentor, "Jane", "Doe", Role::Mentor)
            .with_person(&alice, "Alice", "Smith", Role::Member)
            .with_person(&bob, "Bob", "Brown", Role::Member);
        let sink = Arc::new(sink);
        let propagator = Arc::new(NotificationPropagator::new(
            sink.clone(),
            Arc::new(directory),
            Duration::from_secs(1),
        ));
        let tasks: Arc<dyn TaskStore> =
            Arc::new(DocumentTaskStore::new(Arc::new(InMemoryStore::new())));
        Fixture {
            service: TaskService::new(tasks.clone(), propagator, ProgressAggregator::default()),
            sink,
            tasks,
            mentor,
            alice,
            bob,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockNotificationSink::new())
    }

    fn admin() -> Credential {
        Credential::new("root@example.com", Role::Admin)
    }

    fn mentor_credential() -> Credential {
        Credential::new("jane@example.com", Role::Mentor)
    }

    impl Fixture {
        fn create_request(&self) -> CreateTask {
            CreateTask {
                title: Some("Launch plan".to_string()),
                status: Some("pending".to_string()),
                due_date: Some("2026-12-01".to_string()),
                mentor_id: Some(self.mentor.to_string()),
                member_id: Some(vec![self.alice.to_string(), self.bob.to_string()]),
                ..Default::default()
            }
        }

        async fn seeded(&self) -> Task {
            self.service
                .create(&admin(), self.create_request())
                .await
                .unwrap()
        }

        async fn set(&self, task: &Task, member: &ObjectRef, status: &str) -> Result<Task> {
            self.set_as(&admin(), task, member, status).await
        }

        async fn set_as(
            &self,
            credential: &Credential,
            task: &Task,
            member: &ObjectRef,
            status: &str,
        ) -> Result<Task> {
            self.service
                .update_member_status(
                    credential,
                    MemberStatusUpdate {
                        task_id: Some(task.id.to_string()),
                        member_id: Some(member.to_string()),
                        status: Some(status.to_string()),
                    },
                )
                .await
        }
    }

    #[tokio::test]
    async fn test_create_by_admin_notifies_three() {
        let f = fixture();
        let task = f.seeded().await;

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert_eq!(task.member_progress.len(), 2);
        assert_eq!(task.created_by, None);

        let calls = f.sink.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].message, ADMIN_TO_MENTOR);
        assert!(calls[1..].iter().all(|n| n.message == ADMIN_TO_MEMBER));
    }

    #[tokio::test]
    async fn test_create_by_mentor_falls_back_to_actor_identity() {
        let f = fixture();
        let task = f
            .service
            .create(&mentor_credential(), f.create_request())
            .await
            .unwrap();

        assert_eq!(task.created_by, Some(f.mentor.clone()));
        let calls = f.sink.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|n| n.message == MENTOR_TO_MEMBER));
    }

    #[tokio::test]
    async fn test_create_without_members_uses_status_mapping() {
        let f = fixture();
        let task = f
            .service
            .create(
                &admin(),
                CreateTask {
                    title: Some("Solo".to_string()),
                    status: Some("in progress".to_string()),
                    due_date: Some("2026-12-01".to_string()),
                    progress: Some(serde_json::json!(7)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, 50);
        assert!(f.sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_reference() {
        let f = fixture();
        let mut req = f.create_request();
        req.mentor_id = Some("not-an-id".to_string());
        let err = f.service.create(&admin(), req).await.unwrap_err();
        assert!(matches!(
            err,
            CrmError::Validation(ValidationError::InvalidReference { .. })
        ));
        assert!(f.tasks.find(&TaskFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_member_updates_drive_aggregate() {
        let f = fixture();
        let task = f.seeded().await;

        let after_a = f.set(&task, &f.alice, "completed").await.unwrap();
        assert_eq!(
            after_a.member_progress,
            vec![
                MemberProgress::new(f.alice.clone(), TaskStatus::Completed),
                MemberProgress::pending(f.bob.clone()),
            ]
        );
        assert_eq!(after_a.progress, 50);
        assert_eq!(after_a.status, TaskStatus::InProgress);

        let again = f.set(&task, &f.alice, "completed").await.unwrap();
        assert_eq!(again.member_progress, after_a.member_progress);
        assert_eq!(again.progress, after_a.progress);

        let after_b = f.set(&task, &f.bob, "completed").await.unwrap();
        assert_eq!(after_b.progress, 100);
        assert_eq!(after_b.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_member_update_notifies_everyone_but_the_actor() {
        let f = fixture();
        let task = f.seeded().await;
        let alice = Credential::new("alice@example.com", Role::Member);
        let bob = Credential::new("bob@example.com", Role::Member);

        let before = f.sink.call_count();
        f.set_as(&alice, &task, &f.alice, "in_progress").await.unwrap();
        let calls = &f.sink.calls()[before..];
        let recipients: Vec<&ObjectRef> = calls.iter().map(|n| &n.recipient_id).collect();
        assert_eq!(recipients, vec![&f.mentor, &f.bob]);
        assert_eq!(
            calls[0].message,
            "Alice Smith updated task status to \"in_progress\""
        );
        assert_eq!(calls[0].status, "in_progress");

        // Bob 改 Alice 的状态：Bob 不收通知，消息署 Bob 的名字
        let before = f.sink.call_count();
        f.set_as(&bob, &task, &f.alice, "completed").await.unwrap();
        let calls = &f.sink.calls()[before..];
        let recipients: Vec<&ObjectRef> = calls.iter().map(|n| &n.recipient_id).collect();
        assert_eq!(recipients, vec![&f.mentor, &f.alice]);
        assert!(
            calls
                .iter()
                .all(|n| n.message == "Bob Brown updated task status to \"completed\"")
        );
    }

    #[tokio::test]
    async fn test_member_update_validation_order() {
        let f = fixture();
        let task = f.seeded().await;

        let err = f
            .service
            .update_member_status(&admin(), MemberStatusUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(ValidationError::MissingField(_))));

        let err = f.set(&task, &f.alice, "done").await.unwrap_err();
        assert!(matches!(err, CrmError::Validation(ValidationError::InvalidStatus(_))));

        let stranger = ObjectRef::generate();
        let err = f.set(&task, &stranger, "completed").await.unwrap_err();
        assert_eq!(err.to_string(), "Member not assigned to this task.");

        let mut ghost = task.clone();
        ghost.id = ObjectRef::generate();
        let err = f.set(&ghost, &f.alice, "completed").await.unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));

        let solo = f
            .service
            .create(
                &admin(),
                CreateTask {
                    title: Some("Solo".to_string()),
                    due_date: Some("d".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = f.set(&solo, &f.alice, "completed").await.unwrap_err();
        assert!(matches!(err, CrmError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_sink_outage_does_not_fail_mutations() {
        let f = fixture_with(MockNotificationSink::new().always_failing());
        let task = f.seeded().await;
        let updated = f.set(&task, &f.alice, "completed").await.unwrap();
        assert_eq!(updated.progress, 50);
        assert!(f.sink.delivered().is_empty());
        assert!(f.sink.call_count() > 0);
    }

    #[tokio::test]
    async fn test_edit_requires_applicable_field() {
        let f = fixture();
        let task = f.seeded().await;
        let err = f
            .service
            .edit(
                &admin(),
                task.id.as_str(),
                EditTask {
                    progress: Some(serde_json::json!(80)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(ValidationError::NoFieldsToUpdate)));

        let err = f
            .service
            .edit(
                &admin(),
                ObjectRef::generate().as_str(),
                EditTask {
                    title: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_edit_status_on_member_task_applies_to_everyone() {
        let f = fixture();
        let task = f.seeded().await;
        let before = f.sink.call_count();

        let edited = f
            .service
            .edit(
                &admin(),
                task.id.as_str(),
                EditTask {
                    status: Some("completed".to_string()),
                    progress: Some(serde_json::json!(3)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, TaskStatus::Completed);
        assert_eq!(edited.progress, 100);
        assert!(edited
            .member_progress
            .iter()
            .all(|mp| mp.status == TaskStatus::Completed));

        let calls = &f.sink.calls()[before..];
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|n| n.message
            == "root@example.com (Admin) updated task status to \"completed\""));
    }

    #[tokio::test]
    async fn test_edit_members_reconciles_and_notifies_new_only() {
        let f = fixture();
        let task = f.seeded().await;
        f.set(&task, &f.alice, "completed").await.unwrap();
        let carol = ObjectRef::generate();
        let before = f.sink.call_count();

        let edited = f
            .service
            .edit(
                &mentor_credential(),
                task.id.as_str(),
                EditTask {
                    member_id: Some(vec![f.alice.to_string(), carol.to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.member_ids, vec![f.alice.clone(), carol.clone()]);
        assert_eq!(
            edited.member_progress,
            vec![
                MemberProgress::new(f.alice.clone(), TaskStatus::Completed),
                MemberProgress::pending(carol.clone()),
            ]
        );
        assert_eq!(edited.progress, 50);

        let calls = &f.sink.calls()[before..];
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].recipient_id, carol);
        assert_eq!(calls[0].message, MENTOR_TO_MEMBER);
    }

    #[tokio::test]
    async fn test_member_tasks_and_delete() {
        let f = fixture();
        let task = f.seeded().await;
        f.set(&task, &f.bob, "in_progress").await.unwrap();

        let views = f
            .service
            .member_tasks(MemberTaskQuery {
                member_id: Some(f.bob.to_string()),
                task_id: None,
            })
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].member_status, TaskStatus::InProgress);
        assert_eq!(views[0].member_progress, 50);
        assert_eq!(views[0].progress, 25);

        let listed = f
            .service
            .list(TaskListQuery {
                mentor_id: Some(f.mentor.to_string()),
                member_id: None,
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        f.service.delete(task.id.as_str()).await.unwrap();
        let err = f.service.delete(task.id.as_str()).await.unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));
    }
}
