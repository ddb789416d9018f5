use crate::common::payload::{DecodeError, Payload};
use crate::config::AppSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub const FIELD_APP_NAME: &str = "app_name";
pub const FIELD_APP_VERSION: &str = "app_version";
pub const FIELD_ERROR: &str = "error";

/// 发往遥测后端的单个事件
///
/// 由处理请求的调用独占，提交给 sink 后不再访问。
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub fields: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// 关联标识，仅用于追踪，不随事件字段上报
    pub metadata: String,
}

impl TelemetryEvent {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn error(&self) -> Option<&str> {
        self.fields.get(FIELD_ERROR).and_then(Value::as_str)
    }
}

/// 事件构造器
///
/// 持有进程级静态字段（应用名、版本），每次构造时注入时间戳与关联 ID。
#[derive(Debug, Clone)]
pub struct EventBuilder {
    static_fields: Map<String, Value>,
}

impl EventBuilder {
    pub fn new(app: &AppSettings) -> Self {
        let mut static_fields = Map::new();
        static_fields.insert(FIELD_APP_NAME.into(), Value::from(app.name.clone()));
        static_fields.insert(FIELD_APP_VERSION.into(), Value::from(app.version.clone()));
        Self { static_fields }
    }

    /// 解析成功：顶层字段浅合并，嵌套结构原样保留
    ///
    /// 与静态字段同名的键以负载为准。
    pub fn from_payload(&self, payload: Payload) -> TelemetryEvent {
        let mut event = self.base();
        event.fields.extend(payload);
        event
    }

    /// 解析失败：仅记录错误描述
    pub fn from_error(&self, err: &DecodeError) -> TelemetryEvent {
        let mut event = self.base();
        event
            .fields
            .insert(FIELD_ERROR.into(), Value::from(err.to_string()));
        event
    }

    fn base(&self) -> TelemetryEvent {
        TelemetryEvent {
            fields: self.static_fields.clone(),
            timestamp: Utc::now(),
            metadata: format!("id {}", Uuid::new_v4()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::payload::decode_payload;
    use serde_json::json;

    fn builder() -> EventBuilder {
        EventBuilder::new(&AppSettings {
            name: "githoney".into(),
            version: "0.1.0".into(),
        })
    }

    #[test]
    fn payload_fields_are_merged_shallowly() {
        let payload = decode_payload(br#"{"a":1,"b":"x","nested":{"k":[1,2]}}"#).unwrap();
        let event = builder().from_payload(payload);

        assert_eq!(event.field("app_name"), Some(&json!("githoney")));
        assert_eq!(event.field("app_version"), Some(&json!("0.1.0")));
        assert_eq!(event.field("a"), Some(&json!(1)));
        assert_eq!(event.field("b"), Some(&json!("x")));
        assert_eq!(event.field("nested"), Some(&json!({"k": [1, 2]})));
        assert!(event.field("k").is_none());
        assert!(event.error().is_none());
    }

    #[test]
    fn payload_overrides_static_fields() {
        let payload = decode_payload(br#"{"app_name":"other"}"#).unwrap();
        let event = builder().from_payload(payload);
        assert_eq!(event.field("app_name"), Some(&json!("other")));
    }

    #[test]
    fn decode_error_sets_error_field_only() {
        let err = decode_payload(b"{broken").unwrap_err();
        let event = builder().from_error(&err);

        assert_eq!(event.error(), Some(err.to_string().as_str()));
        assert_eq!(event.fields.len(), 3);
    }

    #[test]
    fn each_event_gets_a_fresh_correlation_id() {
        let b = builder();
        let first = b.from_payload(Payload::new());
        let second = b.from_payload(Payload::new());
        assert!(first.metadata.starts_with("id "));
        assert_ne!(first.metadata, second.metadata);
    }
}
