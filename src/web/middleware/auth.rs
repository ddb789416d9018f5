use crate::config::AuthSettings;
use crate::web::state::AppState;
use crate::web::utils::errors::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const GITLAB_AUTH_HEADER: &str = "x-gitlab-auth";

/// GitLab 共享密钥鉴权中间件
///
/// 职责：比对请求头 `X-Gitlab-Auth` 与配置密钥，不一致时直接返回 403，
/// 不进入后续 Handler。
pub async fn gitlab_auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req.headers().get(GITLAB_AUTH_HEADER).map(|v| v.as_bytes());

    if !token_matches(&state.auth, provided) {
        tracing::warn!(
            "[Auth] Denied {} {} (header present={})",
            req.method(),
            req.uri().path(),
            provided.is_some()
        );
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// 逐字节比较；缺失的请求头按空值处理
///
/// 配置密钥为空时，仅在 `allow_empty_token` 打开后才可能匹配。
pub fn token_matches(auth: &AuthSettings, provided: Option<&[u8]>) -> bool {
    let expected = auth.gitlab_token.as_bytes();
    if expected.is_empty() && !auth.allow_empty_token {
        return false;
    }
    let provided = provided.unwrap_or_default();
    if auth.constant_time {
        bool::from(provided.ct_eq(expected))
    } else {
        provided == expected
    }
}
