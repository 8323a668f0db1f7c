use super::AppState;
use super::error::ApiJson;
use crate::error::{CrmError, Result, ValidationError};
use crate::identity::IdentityDirectory;
use crate::model::{Credential, NewNotification, ObjectRef};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub user_id: Option<String>,
    pub task_id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// 查询可见范围
enum Scope {
    Everyone,
    User(ObjectRef),
    /// 非管理员且身份库中查不到自己
    Nobody,
}

impl Scope {
    /// 管理员可以查看任意用户或全部；其他角色只能看自己的
    async fn resolve(
        state: &AppState,
        credential: &Credential,
        requested: Option<&str>,
    ) -> Result<Self> {
        if credential.is_admin() {
            return match requested.map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => Ok(Scope::User(ObjectRef::parse(raw, "user ID")?)),
                None => Ok(Scope::Everyone),
            };
        }
        Ok(match state.people.find_by_email(&credential.email).await? {
            Some(identity) => Scope::User(identity.id),
            None => Scope::Nobody,
        })
    }

    fn recipient(&self) -> Option<&ObjectRef> {
        match self {
            Scope::User(id) => Some(id),
            _ => None,
        }
    }
}

fn required(raw: Option<String>, field: &str) -> Result<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::MissingField(field.to_string()).into())
}

pub async fn create(
    State(state): State<AppState>,
    _credential: Credential,
    ApiJson(req): ApiJson<CreateNotification>,
) -> Result<(StatusCode, Json<Value>)> {
    let recipient = ObjectRef::parse(&required(req.user_id, "userId")?, "user ID")?;
    let task_id = ObjectRef::parse(&required(req.task_id, "taskId")?, "task ID")?;
    let notice = NewNotification {
        recipient_id: recipient,
        task_id,
        title: required(req.title, "title")?,
        status: required(req.status, "status")?,
        message: req.message.unwrap_or_default(),
    };
    let notification = state.notifications.create(notice).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Notification created successfully.",
            "notification": notification,
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(query): ApiJson<UserQuery>,
) -> Result<Json<Value>> {
    let scope = Scope::resolve(&state, &credential, query.user_id.as_deref()).await?;
    if let Scope::Nobody = scope {
        return Ok(Json(json!({ "notifications": [], "unreadCount": 0 })));
    }
    let notifications = state.notifications.list(scope.recipient()).await?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();
    Ok(Json(json!({
        "notifications": notifications,
        "unreadCount": unread,
    })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = ObjectRef::parse(&id, "notification ID")?;
    let notification = state
        .notifications
        .mark_read(&id)
        .await?
        .ok_or_else(|| CrmError::NotFound("Notification not found.".to_string()))?;
    Ok(Json(json!({
        "message": "Notification marked as read.",
        "notification": notification,
    })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(query): ApiJson<UserQuery>,
) -> Result<Json<Value>> {
    let scope = Scope::resolve(&state, &credential, query.user_id.as_deref()).await?;
    let count = match scope {
        Scope::Nobody => 0,
        _ => state.notifications.unread_count(scope.recipient()).await?,
    };
    Ok(Json(json!({ "unreadCount": count })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(query): ApiJson<UserQuery>,
) -> Result<Json<Value>> {
    let scope = Scope::resolve(&state, &credential, query.user_id.as_deref()).await?;
    let updated = match scope {
        Scope::Nobody => 0,
        _ => state.notifications.mark_all_read(scope.recipient()).await?,
    };
    Ok(Json(json!({
        "message": "All notifications marked as read.",
        "updatedCount": updated,
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = ObjectRef::parse(&id, "notification ID")?;
    state
        .notifications
        .delete(&id)
        .await?
        .ok_or_else(|| CrmError::NotFound("Notification not found.".to_string()))?;
    Ok(Json(json!({
        "message": "Notification deleted successfully.",
        "_id": id,
    })))
}
