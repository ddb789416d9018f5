use axum::body::{to_bytes, Body};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::time::Duration;

/// 入站 Webhook 负载：顶层为任意键值对象
pub type Payload = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read body: {0}")]
    Read(String),
    #[error("body read timed out after {0:?}")]
    ReadTimeout(Duration),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// 将请求体完整读入内存
///
/// 上限为 `limit` 字节，超过 `deadline` 视为读取失败。
pub async fn read_body(body: Body, limit: usize, deadline: Duration) -> Result<Bytes, DecodeError> {
    match tokio::time::timeout(deadline, to_bytes(body, limit)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(DecodeError::Read(e.to_string())),
        Err(_) => Err(DecodeError::ReadTimeout(deadline)),
    }
}

/// 解析 JSON 负载，仅接受对象
///
/// 数组、标量或 `null` 均返回错误，不做部分恢复。
pub fn decode_payload(raw: &[u8]) -> Result<Payload, DecodeError> {
    Ok(serde_json::from_slice::<Payload>(raw)?)
}
