//! 通知传播
//!
//! 先用纯函数算出本次任务变更要发给谁、发什么（`plan_*`），再由
//! [`NotificationPropagator`] 并发投递。投递发生在任务写入成功之后；
//! 单条失败或超时只记日志，不影响其它投递，也不影响接口响应。

use super::sink::NotificationSink;
use crate::identity::IdentityDirectory;
use crate::model::{Credential, NewNotification, ObjectRef, Role, Task, TaskStatus};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MENTOR_TO_MEMBER: &str = "Mentor Assigned Task to Member!";
pub const ADMIN_TO_MENTOR: &str = "Admin Assigned Task to Mentor!";
pub const ADMIN_TO_MEMBER: &str = "Admin Assigned Task to Member!";

/// 已解析的操作人
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    /// 身份库中找不到时为 `None`
    pub id: Option<ObjectRef>,
    pub name: String,
    pub role: Role,
}

/// 一批投递的结果统计，只用于日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

fn notice(task: &Task, recipient: &ObjectRef, message: impl Into<String>) -> NewNotification {
    NewNotification {
        recipient_id: recipient.clone(),
        task_id: task.id.clone(),
        title: task.title.clone(),
        status: task.status.as_str().to_string(),
        message: message.into(),
    }
}

/// 新建任务：通知导师（不是创建者本人时）和每个成员
pub fn plan_created(task: &Task) -> Vec<NewNotification> {
    let created_by_mentor =
        task.mentor_id.is_some() && task.mentor_id.as_ref() == task.created_by.as_ref();

    let mut out = Vec::new();
    if let Some(mentor) = &task.mentor_id
        && !created_by_mentor
    {
        out.push(notice(task, mentor, ADMIN_TO_MENTOR));
    }
    let member_message = if created_by_mentor {
        MENTOR_TO_MEMBER
    } else {
        ADMIN_TO_MEMBER
    };
    for member in &task.member_ids {
        out.push(notice(task, member, member_message));
    }
    out
}

/// 编辑任务：新导师、新增成员、状态变化三类通知
pub fn plan_edited(before: &Task, after: &Task, actor: &ActingUser) -> Vec<NewNotification> {
    let mut out = Vec::new();

    if let Some(mentor) = &after.mentor_id
        && before.mentor_id.as_ref() != Some(mentor)
    {
        out.push(notice(after, mentor, ADMIN_TO_MENTOR));
    }

    let actor_is_mentor = actor.id.is_some() && actor.id.as_ref() == after.mentor_id.as_ref();
    let member_message = if actor_is_mentor {
        MENTOR_TO_MEMBER
    } else {
        ADMIN_TO_MEMBER
    };
    for member in after.member_ids.iter().filter(|m| !before.has_member(m)) {
        out.push(notice(after, member, member_message));
    }

    if before.status != after.status {
        let message = format!(
            "{} ({}) updated task status to \"{}\"",
            actor.name, actor.role, after.status
        );
        for recipient in after.assignees() {
            out.push(notice(after, &recipient, message.clone()));
        }
    }
    out
}

/// 单个成员进度更新：以操作人名义通知导师和其他成员，操作人自己不收
pub fn plan_member_update(
    task: &Task,
    member_status: TaskStatus,
    actor: &ActingUser,
) -> Vec<NewNotification> {
    let message = format!("{} updated task status to \"{member_status}\"", actor.name);
    let is_actor = |id: &ObjectRef| actor.id.as_ref() == Some(id);
    let mut out = Vec::new();
    if let Some(mentor) = &task.mentor_id
        && !is_actor(mentor)
    {
        out.push(notice(task, mentor, message.clone()));
    }
    for member in task.member_ids.iter().filter(|m| !is_actor(m)) {
        out.push(notice(task, member, message.clone()));
    }
    out
}

/// 通知传播器
pub struct NotificationPropagator {
    sink: Arc<dyn NotificationSink>,
    identities: Arc<dyn IdentityDirectory>,
    timeout: Duration,
}

impl NotificationPropagator {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        identities: Arc<dyn IdentityDirectory>,
        timeout: Duration,
    ) -> Self {
        Self {
            sink,
            identities,
            timeout,
        }
    }

    /// 按凭证邮箱解析操作人；找不到或查询失败时以邮箱作为名字
    pub async fn resolve_actor(&self, credential: &Credential) -> ActingUser {
        match self.identities.find_by_email(&credential.email).await {
            Ok(Some(identity)) => ActingUser {
                name: identity.display_name(),
                id: Some(identity.id),
                role: credential.role,
            },
            Ok(None) => ActingUser {
                id: None,
                name: credential.email.clone(),
                role: credential.role,
            },
            Err(e) => {
                warn!(email = %credential.email, error = %e, "⚠️ 操作人身份查询失败");
                ActingUser {
                    id: None,
                    name: credential.email.clone(),
                    role: credential.role,
                }
            }
        }
    }

    pub async fn task_created(&self, task: &Task) -> DispatchReport {
        self.dispatch(plan_created(task)).await
    }

    pub async fn task_edited(&self, before: &Task, after: &Task, actor: &ActingUser) -> DispatchReport {
        self.dispatch(plan_edited(before, after, actor)).await
    }

    pub async fn member_status_updated(
        &self,
        task: &Task,
        member_status: TaskStatus,
        actor: &ActingUser,
    ) -> DispatchReport {
        self.dispatch(plan_member_update(task, member_status, actor)).await
    }

    /// 并发投递，全部结束（成功、失败或超时）后返回
    pub async fn dispatch(&self, notices: Vec<NewNotification>) -> DispatchReport {
        if notices.is_empty() {
            return DispatchReport::default();
        }

        let attempts = notices.into_iter().map(|notice| {
            let sink = self.sink.clone();
            let timeout = self.timeout;
            async move {
                let recipient = notice.recipient_id.clone();
                let task_id = notice.task_id.clone();
                match tokio::time::timeout(timeout, sink.create(notice)).await {
                    Ok(Ok(created)) => {
                        debug!(recipient = %recipient, notification_id = %created.id, "📨 通知已投递");
                        true
                    }
                    Ok(Err(e)) => {
                        warn!(recipient = %recipient, task_id = %task_id, error = %e, "❌ 通知投递失败");
                        false
                    }
                    Err(_) => {
                        warn!(
                            recipient = %recipient,
                            task_id = %task_id,
                            timeout_ms = timeout.as_millis() as u64,
                            "⏱️ 通知投递超时"
                        );
                        false
                    }
                }
            }
        });

        let outcomes = join_all(attempts).await;
        let sent = outcomes.iter().filter(|ok| **ok).count();
        let report = DispatchReport {
            sent,
            failed: outcomes.len() - sent,
        };
        info!(sent = report.sent, failed = report.failed, "🔔 通知批次完成");
        report
    }
}
