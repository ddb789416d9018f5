pub mod honeycomb;
pub mod memory;

use crate::common::events::TelemetryEvent;

pub use honeycomb::{HoneycombSink, SinkHandle};
pub use memory::MemorySink;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("pending queue is full, event {0} dropped")]
    QueueFull(String),
    #[error("sink is closed, event {0} dropped")]
    Closed(String),
}

/// 遥测事件出口
///
/// `submit` 必须快速返回，实际投递由实现方在带外完成。
/// 实现需支持多个请求并发提交。
pub trait EventSink: Send + Sync {
    fn submit(&self, event: TelemetryEvent) -> Result<(), SinkError>;
}
