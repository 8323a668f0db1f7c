//! 调用方凭证提取
//!
//! 认证在上游完成，这里只读取上游写入的两个请求头。

use crate::error::CrmError;
use crate::model::{Credential, Role};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const EMAIL_HEADER: &str = "x-user-email";
pub const ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = CrmError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = header(parts, EMAIL_HEADER)
            .ok_or_else(|| CrmError::Unauthorized("missing credential".to_string()))?;
        let role = header(parts, ROLE_HEADER)
            .and_then(Role::parse)
            .ok_or_else(|| CrmError::Unauthorized("missing or unknown role".to_string()))?;
        Ok(Credential::new(email, role))
    }
}
