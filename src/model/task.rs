//! 任务定义

use super::reference::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 待处理
    Pending,
    /// 进行中
    #[serde(alias = "in progress")]
    InProgress,
    /// 已完成
    Completed,
}

impl TaskStatus {
    /// 解析状态字符串，兼容旧写法 `"in progress"`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" | "in progress" | "in-progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    /// 固定的状态 → 进度映射
    pub fn progress(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 50,
            TaskStatus::Completed => 100,
        }
    }

    /// 按进度阈值推导状态：0 → pending，100 → completed，其余 → in_progress
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => TaskStatus::Pending,
            p if p >= 100 => TaskStatus::Completed,
            _ => TaskStatus::InProgress,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个成员在任务上的进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProgress {
    pub member_id: ObjectRef,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
}

impl MemberProgress {
    pub fn new(member_id: ObjectRef, status: TaskStatus) -> Self {
        Self {
            member_id,
            status,
            progress: status.progress(),
        }
    }

    pub fn pending(member_id: ObjectRef) -> Self {
        Self::new(member_id, TaskStatus::Pending)
    }
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// 任务 ID
    pub id: ObjectRef,
    pub title: String,
    pub due_date: String,
    /// 整体状态（派生值）
    pub status: TaskStatus,
    /// 整体进度 0-100（派生值）
    pub progress: u8,
    /// 负责导师（弱引用，导师删除后由清理流程置空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<ObjectRef>,
    /// 参与成员（有序集合）
    #[serde(default, alias = "memberId")]
    pub member_ids: Vec<ObjectRef>,
    /// 成员进度明细，可能与 `member_ids` 不同步
    #[serde(default)]
    pub member_progress: Vec<MemberProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectRef>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, due_date: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: ObjectRef::generate(),
            title: title.into(),
            due_date: due_date.into(),
            status,
            progress: status.progress(),
            mentor_id: None,
            member_ids: Vec::new(),
            member_progress: Vec::new(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_mentor(mut self, mentor: Option<ObjectRef>) -> Self {
        self.mentor_id = mentor;
        self
    }

    pub fn with_members(mut self, members: Vec<ObjectRef>) -> Self {
        self.member_ids = members;
        self
    }

    pub fn with_creator(mut self, creator: Option<ObjectRef>) -> Self {
        self.created_by = creator;
        self
    }

    /// 是否按成员跟踪进度
    pub fn is_member_tracked(&self) -> bool {
        !self.member_ids.is_empty()
    }

    pub fn has_member(&self, member: &ObjectRef) -> bool {
        self.member_ids.contains(member)
    }

    pub fn member_entry(&self, member: &ObjectRef) -> Option<&MemberProgress> {
        self.member_progress.iter().find(|mp| &mp.member_id == member)
    }

    /// 当前被分配的全部人员：导师在前，成员按顺序
    pub fn assignees(&self) -> Vec<ObjectRef> {
        let mut all: Vec<ObjectRef> = self.mentor_id.iter().cloned().collect();
        for member in &self.member_ids {
            if !all.contains(member) {
                all.push(member.clone());
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progress_mapping() {
        assert_eq!(TaskStatus::Pending.progress(), 0);
        assert_eq!(TaskStatus::InProgress.progress(), 50);
        assert_eq!(TaskStatus::Completed.progress(), 100);
    }

    #[test]
    fn test_status_from_progress_thresholds() {
        assert_eq!(TaskStatus::from_progress(0), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_progress(1), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_progress(99), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_progress(100), TaskStatus::Completed);
    }

    #[test]
    fn test_status_accepts_legacy_spelling() {
        assert_eq!(TaskStatus::parse("in progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("In_Progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("done"), None);
        let s: TaskStatus = serde_json::from_str("\"in progress\"").unwrap();
        assert_eq!(s, TaskStatus::InProgress);
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"in_progress\"");
    }

    #[test]
    fn test_task_json_shape() {
        let member = ObjectRef::generate();
        let task = Task::new("Write docs", "2026-01-01", TaskStatus::Pending)
            .with_members(vec![member.clone()]);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["dueDate"], "2026-01-01");
        assert_eq!(json["memberIds"][0], member.as_str());
        assert!(json.get("mentorId").is_none());

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_assignees_mentor_first() {
        let mentor = ObjectRef::generate();
        let a = ObjectRef::generate();
        let task = Task::new("t", "d", TaskStatus::Pending)
            .with_mentor(Some(mentor.clone()))
            .with_members(vec![a.clone()]);
        assert_eq!(task.assignees(), vec![mentor, a]);
    }
}
