use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

pub const MSG_FORBIDDEN: &str = "Forbidden";
pub const MSG_READ_FAILED: &str = "Failed to read post body";
pub const MSG_FORWARDING_FAILED: &str = "Forwarding Failed";

/// 调用方可见的失败结果
///
/// 鉴权失败返回纯文本，其余返回 `{"error": "..."}`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    Forbidden,
    ReadFailed,
    ForwardingFailed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => (StatusCode::FORBIDDEN, MSG_FORBIDDEN).into_response(),
            Self::ReadFailed => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(error_json(MSG_READ_FAILED)),
            )
                .into_response(),
            Self::ForwardingFailed => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(error_json(MSG_FORWARDING_FAILED)),
            )
                .into_response(),
        }
    }
}

pub fn error_json(message: &str) -> Value {
    serde_json::json!({ "error": message })
}
