use super::AppState;
use super::error::ApiJson;
use crate::error::Result;
use crate::model::Credential;
use crate::tasks::{CreateTask, EditTask, MemberStatusUpdate, MemberTaskQuery, TaskListQuery};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

pub async fn create(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(req): ApiJson<CreateTask>,
) -> Result<(StatusCode, Json<Value>)> {
    let task = state.tasks.create(&credential, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Task created successfully.",
            "taskId": task.id,
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    _credential: Credential,
    ApiJson(query): ApiJson<TaskListQuery>,
) -> Result<Json<Value>> {
    let tasks = state.tasks.list(query).await?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn edit(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<EditTask>,
) -> Result<Json<Value>> {
    let task = state.tasks.edit(&credential, &id, req).await?;
    let mut body = serde_json::to_value(&task)?;
    if let Some(map) = body.as_object_mut() {
        map.insert("message".to_string(), json!("Task updated successfully."));
    }
    Ok(Json(body))
}

pub async fn delete(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let task = state.tasks.delete(&id).await?;
    Ok(Json(json!({
        "message": "Task deleted successfully.",
        "_id": task.id,
    })))
}

pub async fn update_status(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(req): ApiJson<MemberStatusUpdate>,
) -> Result<Json<Value>> {
    let task = state.tasks.update_member_status(&credential, req).await?;
    Ok(Json(json!({
        "message": "Task status updated successfully.",
        "progress": task.progress,
        "status": task.status,
        "memberProgress": task.member_progress,
    })))
}

pub async fn member_tasks(
    State(state): State<AppState>,
    _credential: Credential,
    ApiJson(query): ApiJson<MemberTaskQuery>,
) -> Result<Json<Value>> {
    let views = state.tasks.member_tasks(query).await?;
    Ok(Json(serde_json::to_value(views)?))
}
