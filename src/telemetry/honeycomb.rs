use super::{EventSink, SinkError};
use crate::common::events::TelemetryEvent;
use crate::config::HoneycombSettings;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use url::Url;

const TEAM_HEADER: &str = "X-Honeycomb-Team";

/// Honeycomb 事件 sink
///
/// `submit` 仅将事件放入有界队列；后台 worker 按批次大小或等待时间
/// 合并事件，调用 Honeycomb batch API 投递。投递失败只记录日志，不重试。
#[derive(Debug, Clone)]
pub struct HoneycombSink {
    tx: mpsc::Sender<TelemetryEvent>,
}

/// 后台 worker 的控制句柄，用于进程退出前冲刷队列
pub struct SinkHandle {
    close_tx: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl HoneycombSink {
    /// 创建 sink 并启动后台 worker，需在 tokio 运行时内调用
    pub fn spawn(settings: &HoneycombSettings) -> anyhow::Result<(Self, SinkHandle)> {
        let transport = BatchTransport::new(settings)?;
        let (tx, rx) = mpsc::channel(settings.pending_capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();

        let batcher = Batcher {
            max_batch_size: settings.max_batch_size.max(1),
            batch_timeout: Duration::from_millis(settings.batch_timeout_ms),
            transport,
        };
        let worker = tokio::spawn(batcher.run(rx, close_rx));

        Ok((Self { tx }, SinkHandle { close_tx, worker }))
    }
}

impl EventSink for HoneycombSink {
    fn submit(&self, event: TelemetryEvent) -> Result<(), SinkError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) => SinkError::QueueFull(ev.metadata),
            mpsc::error::TrySendError::Closed(ev) => SinkError::Closed(ev.metadata),
        })
    }
}

impl SinkHandle {
    /// 停止接收新事件，发送剩余事件后返回
    pub async fn close(self) {
        let _ = self.close_tx.send(());
        if let Err(e) = self.worker.await {
            tracing::error!("[Honeycomb] Worker failed: {}", e);
        }
    }
}

struct Batcher {
    max_batch_size: usize,
    batch_timeout: Duration,
    transport: BatchTransport,
}

impl Batcher {
    async fn run(
        self,
        mut rx: mpsc::Receiver<TelemetryEvent>,
        mut close_rx: oneshot::Receiver<()>,
    ) {
        let mut pending: Vec<TelemetryEvent> = Vec::with_capacity(self.max_batch_size);
        let mut flush_at: Option<Instant> = None;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(event) => {
                        if pending.is_empty() {
                            flush_at = Some(Instant::now() + self.batch_timeout);
                        }
                        pending.push(event);
                        if pending.len() >= self.max_batch_size {
                            self.flush(&mut pending).await;
                            flush_at = None;
                        }
                    }
                    None => break,
                },
                _ = wait_until(flush_at) => {
                    self.flush(&mut pending).await;
                    flush_at = None;
                }
                _ = &mut close_rx => {
                    rx.close();
                    while let Ok(event) = rx.try_recv() {
                        pending.push(event);
                        if pending.len() >= self.max_batch_size {
                            self.flush(&mut pending).await;
                        }
                    }
                    break;
                }
            }
        }

        self.flush(&mut pending).await;
        tracing::info!("[Honeycomb] Worker stopped");
    }

    async fn flush(&self, pending: &mut Vec<TelemetryEvent>) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        self.transport.send(&batch).await;
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// batch API 中的单条记录
#[derive(Debug, Serialize)]
pub(crate) struct BatchEntry<'a> {
    pub time: &'a DateTime<Utc>,
    pub samplerate: u32,
    pub data: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BatchStatus {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) fn encode_batch(events: &[TelemetryEvent]) -> Vec<BatchEntry<'_>> {
    events
        .iter()
        .map(|ev| BatchEntry {
            time: &ev.timestamp,
            samplerate: 1,
            data: &ev.fields,
        })
        .collect()
}

struct BatchTransport {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl BatchTransport {
    fn new(settings: &HoneycombSettings) -> anyhow::Result<Self> {
        let endpoint = batch_endpoint(&settings.api_host, &settings.dataset)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .user_agent(concat!("githoney/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
        })
    }

    async fn send(&self, batch: &[TelemetryEvent]) {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(TEAM_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&encode_batch(batch))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("[Honeycomb] Batch of {} events failed: {}", batch.len(), e);
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "[Honeycomb] Batch of {} events rejected. Status={} Body={}",
                batch.len(),
                status,
                body.trim()
            );
            return;
        }

        match response.json::<Vec<BatchStatus>>().await {
            Ok(statuses) => {
                for (event, result) in batch.iter().zip(statuses) {
                    if !(200..300).contains(&result.status) {
                        tracing::warn!(
                            "[Honeycomb] Event {} rejected. Status={} Error={}",
                            event.metadata,
                            result.status,
                            result.error.unwrap_or_default()
                        );
                    }
                }
            }
            Err(e) => tracing::debug!("[Honeycomb] Unreadable batch response: {}", e),
        }
        tracing::debug!("[Honeycomb] Delivered batch of {} events", batch.len());
    }
}

/// `{api_host}/1/batch/{dataset}`，dataset 作为单独路径段编码
pub(crate) fn batch_endpoint(api_host: &str, dataset: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(api_host)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Invalid Honeycomb API host: {}", api_host))?
        .pop_if_empty()
        .extend(["1", "batch", dataset]);
    Ok(url)
}
