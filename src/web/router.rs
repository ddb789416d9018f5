use crate::web::{api::gitlab, middleware::auth::gitlab_auth_middleware, state::AppState};
use axum::{routing::post, Router};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// 路由定义
///
/// 鉴权挂在 POST 处理器上：未知路径返回 404，错误方法返回 405，均不经过鉴权。
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/gitlab",
            post(gitlab::webhook_handler).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                gitlab_auth_middleware,
            )),
        )
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}
