use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use githoney::{
    common::{
        events::EventBuilder,
        payload::{decode_payload, Payload},
    },
    config::{AppSettings, HoneycombSettings},
    telemetry::{EventSink, HoneycombSink, SinkError},
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};

#[derive(Debug, Clone)]
struct CapturedBatch {
    dataset: String,
    team: Option<String>,
    entries: Vec<Value>,
}

#[derive(Clone, Default)]
struct Capture {
    batches: Arc<Mutex<Vec<CapturedBatch>>>,
}

impl Capture {
    fn batches(&self) -> Vec<CapturedBatch> {
        self.batches.lock().unwrap().clone()
    }

    fn total_events(&self) -> usize {
        self.batches().iter().map(|b| b.entries.len()).sum()
    }
}

async fn batch_handler(
    State(capture): State<Capture>,
    Path(dataset): Path<String>,
    headers: HeaderMap,
    Json(entries): Json<Vec<Value>>,
) -> (StatusCode, Json<Value>) {
    let statuses: Vec<Value> = entries.iter().map(|_| json!({ "status": 202 })).collect();
    capture.batches.lock().unwrap().push(CapturedBatch {
        dataset,
        team: headers
            .get("x-honeycomb-team")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        entries,
    });
    (StatusCode::OK, Json(Value::Array(statuses)))
}

async fn start_collector() -> (String, Capture) {
    let capture = Capture::default();
    let app = Router::new()
        .route("/1/batch/:dataset", post(batch_handler))
        .with_state(capture.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{}", addr), capture)
}

fn settings(api_host: &str, max_batch_size: usize, batch_timeout_ms: u64) -> HoneycombSettings {
    HoneycombSettings {
        api_key: "test-key".into(),
        api_host: api_host.into(),
        dataset: "gitlab".into(),
        max_batch_size,
        batch_timeout_ms,
        pending_capacity: 128,
        request_timeout_ms: 2_000,
    }
}

fn builder() -> EventBuilder {
    EventBuilder::new(&AppSettings {
        name: "githoney".into(),
        version: "0.1.0".into(),
    })
}

async fn wait_for_events(capture: &Capture, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while capture.total_events() < expected {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("events delivered in time");
}

#[tokio::test]
async fn events_are_delivered_in_batches_with_team_header() {
    let (host, capture) = start_collector().await;
    let (sink, handle) = HoneycombSink::spawn(&settings(&host, 2, 50)).expect("sink");
    let b = builder();

    for i in 0..3 {
        let payload = decode_payload(json!({ "n": i }).to_string().as_bytes()).unwrap();
        sink.submit(b.from_payload(payload)).expect("submit");
    }
    wait_for_events(&capture, 3).await;

    let batches = capture.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].entries.len(), 2);
    assert_eq!(batches[1].entries.len(), 1);
    for batch in &batches {
        assert_eq!(batch.dataset, "gitlab");
        assert_eq!(batch.team.as_deref(), Some("test-key"));
    }

    let first = &batches[0].entries[0];
    assert_eq!(first["samplerate"], 1);
    assert!(first["time"].is_string());
    assert_eq!(first["data"]["app_name"], "githoney");
    assert_eq!(first["data"]["n"], 0);

    handle.close().await;
}

#[tokio::test]
async fn error_events_carry_error_field() {
    let (host, capture) = start_collector().await;
    let (sink, handle) = HoneycombSink::spawn(&settings(&host, 50, 20)).expect("sink");

    let err = decode_payload(b"not valid json").unwrap_err();
    sink.submit(builder().from_error(&err)).expect("submit");
    wait_for_events(&capture, 1).await;

    let entry = &capture.batches()[0].entries[0];
    assert_eq!(entry["data"]["error"], err.to_string());
    handle.close().await;
}

#[tokio::test]
async fn close_flushes_pending_events() {
    let (host, capture) = start_collector().await;
    // 超时足够长，只能靠 close 冲刷
    let (sink, handle) = HoneycombSink::spawn(&settings(&host, 100, 60_000)).expect("sink");

    for _ in 0..5 {
        sink.submit(builder().from_payload(Payload::new()))
            .expect("submit");
    }
    timeout(Duration::from_secs(5), handle.close())
        .await
        .expect("close in time");

    assert_eq!(capture.total_events(), 5);
    assert!(matches!(
        sink.submit(builder().from_payload(Payload::new())),
        Err(SinkError::Closed(_))
    ));
}

#[tokio::test]
async fn full_queue_rejects_without_blocking() {
    let mut s = settings("http://127.0.0.1:9", 100, 60_000);
    s.pending_capacity = 1;
    let (sink, handle) = HoneycombSink::spawn(&s).expect("sink");

    let mut rejected = 0;
    for _ in 0..1_000 {
        if let Err(SinkError::QueueFull(_)) = sink.submit(builder().from_payload(Payload::new())) {
            rejected += 1;
        }
    }
    assert!(rejected > 0);
    drop(handle);
}

#[tokio::test]
async fn unreachable_backend_does_not_fail_submit() {
    let (sink, handle) =
        HoneycombSink::spawn(&settings("http://127.0.0.1:9", 1, 10)).expect("sink");

    sink.submit(builder().from_payload(Payload::new()))
        .expect("submit");
    timeout(Duration::from_secs(5), handle.close())
        .await
        .expect("close in time");
}

#[test]
fn invalid_api_host_is_a_startup_error() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        assert!(HoneycombSink::spawn(&settings("not a url", 1, 10)).is_err());
    });
}
