//! Mock 通知存储，实现 [`NotificationSink`] trait，用于测试通知传播的容错路径。
//!
//! # 示例
//!
//! ```rust
//! use crm_hub::model::{NewNotification, ObjectRef};
//! use crm_hub::notifications::NotificationSink;
//! use crm_hub::testing::MockNotificationSink;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = MockNotificationSink::new().fail_for_calls(&[0]);
//! let notice = NewNotification {
//!     recipient_id: ObjectRef::generate(),
//!     task_id: ObjectRef::generate(),
//!     title: "Weekly sync".to_string(),
//!     status: "pending".to_string(),
//!     message: "hello".to_string(),
//! };
//!
//! assert!(sink.create(notice.clone()).await.is_err());
//! assert!(sink.create(notice).await.is_ok());
//! assert_eq!(sink.call_count(), 2);
//! assert_eq!(sink.delivered().len(), 1);
//! # }
//! ```

use super::lock;
use crate::error::{CrmError, Result, StoreError};
use crate::model::{NewNotification, Notification, ObjectRef};
use crate::notifications::NotificationSink;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 可脚本化的 Mock 通知存储。
///
/// 所有 `create` 调用按到达顺序编号（从 0 开始）并记录；编号命中
/// [`fail_for_calls`](MockNotificationSink::fail_for_calls) 时返回存储错误，
/// [`always_failing`](MockNotificationSink::always_failing) 模拟整体宕机。
/// 成功写入的通知可通过 [`delivered()`](MockNotificationSink::delivered) 检查。
#[derive(Default)]
pub struct MockNotificationSink {
    calls: Arc<Mutex<Vec<NewNotification>>>,
    delivered: Arc<Mutex<Vec<Notification>>>,
    failing_calls: HashSet<usize>,
    always_fail: bool,
    delay: Option<Duration>,
}

impl MockNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定编号的调用返回错误
    pub fn fail_for_calls(mut self, calls: &[usize]) -> Self {
        self.failing_calls.extend(calls.iter().copied());
        self
    }

    /// 每次 `create` 都返回错误
    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// 每次 `create` 前先等待，用于测试超时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `create` 调用总次数（含失败）
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// 所有 `create` 调用的入参（按到达顺序）
    pub fn calls(&self) -> Vec<NewNotification> {
        lock(&self.calls).clone()
    }

    /// 成功写入的通知
    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.delivered).clone()
    }

    fn outage() -> CrmError {
        CrmError::Store(StoreError::Unavailable("mock sink outage".to_string()))
    }

    fn matches(n: &Notification, recipient: Option<&ObjectRef>) -> bool {
        recipient.is_none_or(|r| &n.recipient_id == r)
    }
}

#[async_trait]
impl NotificationSink for MockNotificationSink {
    async fn create(&self, notice: NewNotification) -> Result<Notification> {
        let index = {
            let mut calls = lock(&self.calls);
            calls.push(notice.clone());
            calls.len() - 1
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail || self.failing_calls.contains(&index) {
            return Err(Self::outage());
        }
        let notification = notice.into_notification();
        lock(&self.delivered).push(notification.clone());
        Ok(notification)
    }

    async fn list(&self, recipient: Option<&ObjectRef>) -> Result<Vec<Notification>> {
        if self.always_fail {
            return Err(Self::outage());
        }
        Ok(lock(&self.delivered)
            .iter()
            .rev()
            .filter(|n| Self::matches(n, recipient))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &ObjectRef) -> Result<Option<Notification>> {
        let mut delivered = lock(&self.delivered);
        Ok(delivered.iter_mut().find(|n| &n.id == id).map(|n| {
            n.is_read = true;
            n.clone()
        }))
    }

    async fn mark_all_read(&self, recipient: Option<&ObjectRef>) -> Result<usize> {
        let mut delivered = lock(&self.delivered);
        let mut count = 0;
        for n in delivered
            .iter_mut()
            .filter(|n| !n.is_read && Self::matches(n, recipient))
        {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn unread_count(&self, recipient: Option<&ObjectRef>) -> Result<usize> {
        Ok(lock(&self.delivered)
            .iter()
            .filter(|n| !n.is_read && Self::matches(n, recipient))
            .count())
    }

    async fn delete(&self, id: &ObjectRef) -> Result<Option<Notification>> {
        let mut delivered = lock(&self.delivered);
        let pos = delivered.iter().position(|n| &n.id == id);
        Ok(pos.map(|i| delivered.remove(i)))
    }
}
