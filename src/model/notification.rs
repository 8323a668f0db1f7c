//! 通知定义

use super::reference::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已落库的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: ObjectRef,
    /// 接收人
    #[serde(alias = "userId")]
    pub recipient_id: ObjectRef,
    pub task_id: ObjectRef,
    pub title: String,
    /// 发送时的任务状态标签（自由文本）
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 待写入的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: ObjectRef,
    pub task_id: ObjectRef,
    pub title: String,
    pub status: String,
    pub message: String,
}

impl NewNotification {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: ObjectRef::generate(),
            recipient_id: self.recipient_id,
            task_id: self.task_id,
            title: self.title,
            status: self.status,
            message: self.message,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
