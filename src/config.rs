use config::{Config, Environment, File};
use serde::Deserialize;

/// 应用配置总结构
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub handler: HandlerSettings,
    pub honeycomb: HoneycombSettings,
    pub app: AppSettings,
}

/// 服务相关配置（监听地址、端口）
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Webhook 鉴权配置
#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    /// 与 GitLab 约定的共享密钥，对应请求头 `X-Gitlab-Auth`
    pub gitlab_token: String,
    /// 是否允许空密钥匹配空请求头
    ///
    /// 默认关闭：密钥为空时拒绝所有请求。
    #[serde(default)]
    pub allow_empty_token: bool,
    /// 使用常量时间比较
    pub constant_time: bool,
}

/// 请求处理约束
#[derive(Debug, Deserialize, Clone)]
pub struct HandlerSettings {
    /// 请求体上限（字节），默认与 axum 自身限制一致（2MB）
    pub max_body_bytes: usize,
    /// 读取请求体的超时时间（毫秒）
    pub body_read_timeout_ms: u64,
    /// 读取失败后仍将（空）请求体转发为错误事件
    #[serde(default)]
    pub forward_on_read_failure: bool,
}

/// Honeycomb 上报配置
#[derive(Debug, Deserialize, Clone)]
pub struct HoneycombSettings {
    pub api_key: String,
    pub api_host: String,
    pub dataset: String,
    /// 单批最大事件数
    pub max_batch_size: usize,
    /// 首个待发事件入队后最长等待时间（毫秒）
    pub batch_timeout_ms: u64,
    /// 待发送队列容量，满时丢弃新事件
    pub pending_capacity: usize,
    pub request_timeout_ms: u64,
}

/// 随每个事件上报的静态元数据
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
}

impl Settings {
    /// 加载配置：默认值、可选配置文件、环境变量覆盖
    ///
    /// 兼容旧部署方式：`PORT`、`GITLAB_AUTH_TOKEN`、`HONEYCOMB_API_KEY` 优先级最高。
    pub fn new() -> anyhow::Result<Self> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("auth.gitlab_token", "")?
            .set_default("auth.allow_empty_token", false)?
            .set_default("auth.constant_time", true)?
            .set_default("handler.max_body_bytes", 2 * 1024 * 1024)?
            .set_default("handler.body_read_timeout_ms", 10_000)?
            .set_default("handler.forward_on_read_failure", false)?
            .set_default("honeycomb.api_key", "")?
            .set_default("honeycomb.api_host", "https://api.honeycomb.io")?
            .set_default("honeycomb.dataset", "gitlab")?
            .set_default("honeycomb.max_batch_size", 50)?
            .set_default("honeycomb.batch_timeout_ms", 100)?
            .set_default("honeycomb.pending_capacity", 10_000)?
            .set_default("honeycomb.request_timeout_ms", 10_000)?
            .set_default("app.name", "githoney")?
            .set_default("app.version", env!("CARGO_PKG_VERSION"))?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("GITHONEY").separator("__"))
            .set_override_option("server.port", legacy_env("PORT"))?
            .set_override_option("auth.gitlab_token", legacy_env("GITLAB_AUTH_TOKEN"))?
            .set_override_option("honeycomb.api_key", legacy_env("HONEYCOMB_API_KEY"))?;

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

// 空字符串视为未设置
fn legacy_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
