//! `/profile/*`：调用方按凭证邮箱查看和修改本人资料

use super::AppState;
use super::error::ApiJson;
use crate::error::Result;
use crate::identity::{POSITIONS, ProfileUpdate};
use crate::model::{Credential, Profile};
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

pub async fn show(State(state): State<AppState>, credential: Credential) -> Result<Json<Profile>> {
    Ok(Json(state.people.profile_for(&credential.email).await?))
}

pub async fn edit(
    State(state): State<AppState>,
    credential: Credential,
    ApiJson(req): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>> {
    let profile = state.people.edit_profile(&credential.email, req).await?;
    let mut body = serde_json::to_value(profile)?;
    body["message"] = json!("Profile updated successfully.");
    Ok(Json(body))
}

pub async fn positions(_credential: Credential) -> Json<Value> {
    Json(json!({ "positions": POSITIONS }))
}
