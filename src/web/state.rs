use crate::common::events::EventBuilder;
use crate::config::{AuthSettings, HandlerSettings, Settings};
use crate::telemetry::EventSink;
use std::sync::Arc;

/// Web 应用全局状态
///
/// 职责：持有跨请求共享的只读配置与事件 sink，通过 Arc 注入到 Axum 的 Handler 中。
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthSettings,
    pub handler: HandlerSettings,
    pub builder: EventBuilder,
    pub sink: Arc<dyn EventSink>,
}

impl AppState {
    pub fn new(settings: &Settings, sink: Arc<dyn EventSink>) -> Self {
        Self {
            auth: settings.auth.clone(),
            handler: settings.handler.clone(),
            builder: EventBuilder::new(&settings.app),
            sink,
        }
    }
}
