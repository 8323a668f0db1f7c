//! `/mentor/*` 与 `/member/*`，两组路由共用同一套处理逻辑

use super::AppState;
use super::error::ApiJson;
use crate::error::{CrmError, Result};
use crate::identity::{NewPerson, PersonUpdate};
use crate::model::{Credential, ObjectRef, Role};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

fn key(role: Role) -> &'static str {
    match role {
        Role::Mentor => "mentor",
        _ => "member",
    }
}

async fn create(state: AppState, role: Role, req: NewPerson) -> Result<(StatusCode, Json<Value>)> {
    let person = state.people.register(role, req).await?;
    let mut body = json!({ "message": format!("{role} created successfully.") });
    body[format!("{}Id", key(role))] = json!(person.id);
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list(state: AppState, role: Role) -> Result<Json<Value>> {
    let people = state.people.list(role).await?;
    let mut body = json!({});
    body[format!("{}s", key(role))] = serde_json::to_value(people)?;
    Ok(Json(body))
}

async fn edit(state: AppState, role: Role, id: String, req: PersonUpdate) -> Result<Json<Value>> {
    let id = ObjectRef::parse(&id, &format!("{} ID", key(role)))?;
    let person = state.people.edit(role, &id, req).await?;
    let mut body = json!({ "message": format!("{role} updated successfully.") });
    body[key(role)] = serde_json::to_value(person)?;
    Ok(Json(body))
}

async fn delete(state: AppState, role: Role, id: String) -> Result<Json<Value>> {
    let id = ObjectRef::parse(&id, &format!("{} ID", key(role)))?;
    let removal = state.people.remove(role, &id).await?;
    if !removal.existed {
        return Err(CrmError::NotFound(format!("{role} not found.")));
    }
    Ok(Json(json!({
        "message": format!("{role} deleted successfully."),
        "tasksUpdated": removal.tasks_updated,
    })))
}

pub async fn create_mentor(
    State(state): State<AppState>,
    _credential: Credential,
    ApiJson(req): ApiJson<NewPerson>,
) -> Result<(StatusCode, Json<Value>)> {
    create(state, Role::Mentor, req).await
}

pub async fn list_mentors(
    State(state): State<AppState>,
    _credential: Credential,
) -> Result<Json<Value>> {
    list(state, Role::Mentor).await
}

pub async fn edit_mentor(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PersonUpdate>,
) -> Result<Json<Value>> {
    edit(state, Role::Mentor, id, req).await
}

pub async fn delete_mentor(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    delete(state, Role::Mentor, id).await
}

pub async fn create_member(
    State(state): State<AppState>,
    _credential: Credential,
    ApiJson(req): ApiJson<NewPerson>,
) -> Result<(StatusCode, Json<Value>)> {
    create(state, Role::Member, req).await
}

pub async fn list_members(
    State(state): State<AppState>,
    _credential: Credential,
) -> Result<Json<Value>> {
    list(state, Role::Member).await
}

pub async fn edit_member(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PersonUpdate>,
) -> Result<Json<Value>> {
    edit(state, Role::Member, id, req).await
}

pub async fn delete_member(
    State(state): State<AppState>,
    _credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    delete(state, Role::Member, id).await
}
