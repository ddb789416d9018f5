use crate::common::payload::{decode_payload, read_body, DecodeError};
use crate::web::state::AppState;
use crate::web::utils::errors::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

/// GitLab Webhook 接口
///
/// 读取请求体 → 解析 JSON → 构造事件并提交 sink → 返回结果。
/// 解析失败时仍提交携带 `error` 字段的事件。
pub async fn webhook_handler(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let settings = &state.handler;
    let deadline = Duration::from_millis(settings.body_read_timeout_ms);

    let raw = match read_body(body, settings.max_body_bytes, deadline).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("[Gitlab] Failed to read post body: {}", e);
            if settings.forward_on_read_failure {
                if let Err(e) = forward(&state, &[]) {
                    tracing::debug!("[Gitlab] Forwarded unreadable body as error event: {}", e);
                }
            }
            return ApiError::ReadFailed.into_response();
        }
    };

    match forward(&state, &raw) {
        Ok(()) => (StatusCode::OK, Json("OK")).into_response(),
        Err(e) => {
            tracing::warn!("[Gitlab] Forwarding failed: {}", e);
            ApiError::ForwardingFailed.into_response()
        }
    }
}

/// 每次调用恰好提交一个事件，解析结果原样返回给调用方
fn forward(state: &AppState, raw: &[u8]) -> Result<(), DecodeError> {
    let (event, outcome) = match decode_payload(raw) {
        Ok(payload) => (state.builder.from_payload(payload), Ok(())),
        Err(e) => (state.builder.from_error(&e), Err(e)),
    };

    tracing::debug!("[Gitlab] Sending event {}", event.metadata);
    // sink 层失败不影响响应
    if let Err(e) = state.sink.submit(event) {
        tracing::error!("[Gitlab] Event submission failed: {}", e);
    }
    outcome
}
