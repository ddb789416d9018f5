use std::sync::Arc;
use tracing::{info, warn};

use githoney::config::Settings;
use githoney::telemetry::HoneycombSink;
use githoney::web::{router::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("githoney=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!(
        "[Startup] githoney {} initializing...",
        env!("CARGO_PKG_VERSION")
    );

    let settings = Settings::new()?;
    info!(
        "[Config] Binding at {}:{}, dataset={}",
        settings.server.host, settings.server.port, settings.honeycomb.dataset
    );
    if settings.auth.gitlab_token.is_empty() {
        if settings.auth.allow_empty_token {
            warn!("[Config] GitLab token is empty, requests without X-Gitlab-Auth are accepted");
        } else {
            warn!("[Config] GitLab token is empty, all webhook requests will be rejected");
        }
    }
    if settings.honeycomb.api_key.is_empty() {
        warn!("[Config] Honeycomb API key is empty, deliveries will be rejected upstream");
    }

    let (sink, sink_handle) = HoneycombSink::spawn(&settings.honeycomb)?;
    let state = Arc::new(AppState::new(&settings, Arc::new(sink)));
    let app = build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[Startup] Service ready at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[Shutdown] Flushing pending events...");
    sink_handle.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Shutdown] Ctrl-C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("[Shutdown] SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("[Shutdown] Signal received");
}
