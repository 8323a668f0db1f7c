//! `CrmError` → HTTP 响应
//!
//! | 错误 | 状态码 |
//! |------|--------|
//! | `Validation` / `InvalidState` | 400 |
//! | `Unauthorized` | 401 |
//! | `NotFound` | 404 |
//! | `Conflict`、重复主键 | 409 |
//! | 其余 | 500，原始信息放在 `error` 字段 |

use crate::error::{CrmError, StoreError, ValidationError};
use axum::Json;
use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrmError::Validation(_) | CrmError::InvalidState(_) => StatusCode::BAD_REQUEST,
            CrmError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CrmError::NotFound(_) => StatusCode::NOT_FOUND,
            CrmError::Conflict(_) | CrmError::Store(StoreError::DuplicateKey { .. }) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            error!(error = %self, "💥 请求处理失败");
            ErrorBody {
                message: "Internal server error.".to_string(),
                error: Some(self.to_string()),
            }
        } else {
            ErrorBody {
                message: self.to_string(),
                error: None,
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for CrmError {
    fn from(rejection: JsonRejection) -> Self {
        CrmError::Validation(ValidationError::InvalidValue {
            field: "body".to_string(),
            message: rejection.body_text(),
        })
    }
}

/// 请求体提取器，解析失败时返回统一的 `{message}` 错误体
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(CrmError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                CrmError::from(ValidationError::NoFieldsToUpdate),
                StatusCode::BAD_REQUEST,
            ),
            (
                CrmError::InvalidState("no members".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CrmError::Unauthorized("x".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (CrmError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (CrmError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (
                CrmError::Store(StoreError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_server_error_body_carries_detail() {
        let response =
            CrmError::Store(StoreError::IoError("disk full".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
