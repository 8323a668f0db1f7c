use crate::error::Result;
use crate::model::{NewNotification, Notification, ObjectRef};
use crate::store::{DocumentStore, Filter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const COLLECTION: &str = "notifications";

/// 通知存储接口
///
/// 通知只追加；唯一允许的修改是 `isRead` 从 false 变为 true。
/// `recipient` 为 `None` 的查询作用于全部接收人。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, notice: NewNotification) -> Result<Notification>;

    /// 按创建时间倒序返回
    async fn list(&self, recipient: Option<&ObjectRef>) -> Result<Vec<Notification>>;

    /// 标记单条已读，不存在时返回 `None`
    async fn mark_read(&self, id: &ObjectRef) -> Result<Option<Notification>>;

    /// 返回被标记的条数
    async fn mark_all_read(&self, recipient: Option<&ObjectRef>) -> Result<usize>;

    async fn unread_count(&self, recipient: Option<&ObjectRef>) -> Result<usize>;

    async fn delete(&self, id: &ObjectRef) -> Result<Option<Notification>>;
}

/// 基于 [`DocumentStore`] 的通知存储
pub struct DocumentNotificationSink {
    store: Arc<dyn DocumentStore>,
}

impl DocumentNotificationSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

fn recipient_filter(recipient: Option<&ObjectRef>) -> Filter {
    match recipient {
        Some(id) => Filter::eq("recipientId", id.as_str()),
        None => Filter::All,
    }
}

fn unread_filter(recipient: Option<&ObjectRef>) -> Filter {
    recipient_filter(recipient).and(Filter::eq("isRead", false))
}

fn set_read(body: &mut Value) -> bool {
    match body.get_mut("isRead") {
        Some(flag) if flag == &Value::Bool(false) => {
            *flag = Value::Bool(true);
            true
        }
        _ => false,
    }
}

#[async_trait]
impl NotificationSink for DocumentNotificationSink {
    async fn create(&self, notice: NewNotification) -> Result<Notification> {
        let notification = notice.into_notification();
        let body = serde_json::to_value(&notification)?;
        self.store
            .insert(COLLECTION, notification.id.as_str(), body)
            .await?;
        debug!(
            notification_id = %notification.id,
            recipient = %notification.recipient_id,
            "🔔 通知已写入"
        );
        Ok(notification)
    }

    async fn list(&self, recipient: Option<&ObjectRef>) -> Result<Vec<Notification>> {
        let docs = self
            .store
            .find(COLLECTION, &recipient_filter(recipient))
            .await?;
        let mut out = docs
            .into_iter()
            .map(|doc| serde_json::from_value::<Notification>(doc.body))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        out.reverse();
        Ok(out)
    }

    async fn mark_read(&self, id: &ObjectRef) -> Result<Option<Notification>> {
        let Some(doc) = self.store.get(COLLECTION, id.as_str()).await? else {
            return Ok(None);
        };
        let mut notification: Notification = serde_json::from_value(doc.body)?;
        if !notification.is_read {
            notification.is_read = true;
            let body = serde_json::to_value(&notification)?;
            self.store
                .replace(COLLECTION, id.as_str(), body, None)
                .await?;
        }
        Ok(Some(notification))
    }

    async fn mark_all_read(&self, recipient: Option<&ObjectRef>) -> Result<usize> {
        self.store
            .update_many(COLLECTION, &unread_filter(recipient), &set_read)
            .await
    }

    async fn unread_count(&self, recipient: Option<&ObjectRef>) -> Result<usize> {
        self.store
            .count(COLLECTION, &unread_filter(recipient))
            .await
    }

    async fn delete(&self, id: &ObjectRef) -> Result<Option<Notification>> {
        match self.store.delete(COLLECTION, id.as_str()).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn notice(recipient: &ObjectRef, message: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient.clone(),
            task_id: ObjectRef::generate(),
            title: "Quarterly report".to_string(),
            status: "pending".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_and_scoped() {
        let sink = DocumentNotificationSink::new(Arc::new(InMemoryStore::new()));
        let alice = ObjectRef::generate();
        let bob = ObjectRef::generate();
        sink.create(notice(&alice, "first")).await.unwrap();
        sink.create(notice(&bob, "other")).await.unwrap();
        sink.create(notice(&alice, "second")).await.unwrap();

        let mine = sink.list(Some(&alice)).await.unwrap();
        let messages: Vec<&str> = mine.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(sink.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_read_flags_and_counts() {
        let sink = DocumentNotificationSink::new(Arc::new(InMemoryStore::new()));
        let alice = ObjectRef::generate();
        let bob = ObjectRef::generate();
        let n1 = sink.create(notice(&alice, "a1")).await.unwrap();
        sink.create(notice(&alice, "a2")).await.unwrap();
        sink.create(notice(&bob, "b1")).await.unwrap();

        assert_eq!(sink.unread_count(Some(&alice)).await.unwrap(), 2);
        let read = sink.mark_read(&n1.id).await.unwrap().unwrap();
        assert!(read.is_read);
        assert_eq!(sink.unread_count(Some(&alice)).await.unwrap(), 1);
        assert!(sink.mark_read(&ObjectRef::generate()).await.unwrap().is_none());

        assert_eq!(sink.mark_all_read(Some(&alice)).await.unwrap(), 1);
        assert_eq!(sink.unread_count(Some(&alice)).await.unwrap(), 0);
        assert_eq!(sink.unread_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let sink = DocumentNotificationSink::new(Arc::new(InMemoryStore::new()));
        let alice = ObjectRef::generate();
        let n = sink.create(notice(&alice, "bye")).await.unwrap();
        assert!(sink.delete(&n.id).await.unwrap().is_some());
        assert!(sink.delete(&n.id).await.unwrap().is_none());
        assert!(sink.list(Some(&alice)).await.unwrap().is_empty());
    }
}
