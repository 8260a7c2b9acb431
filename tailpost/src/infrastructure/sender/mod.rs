//! Buffers lines into bounded batches and flushes them over HTTP(S),
//! applying encryption, then auth, then the request itself. The buffer is
//! an async mutex rather than a dedicated task because both the flush
//! timer and `send` need synchronous-looking access to it; a transmission
//! task only ever touches its own captured batch.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::Context;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use tailpost_domain::value_objects::Batch;
use tailpost_domain::{LogLine, TailPostError};

use crate::infrastructure::auth::AuthAttacher;
use crate::infrastructure::crypto::PayloadCipher;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::telemetry::TracerSink;
use crate::infrastructure::tls::TlsContext;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const STATE_NEW: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;
const STATE_STOPPED: u8 = 3;

pub struct BatchingSender {
    inner: Arc<SenderInner>,
    flush_task: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

struct SenderInner {
    http: reqwest::Client,
    server_url: String,
    batch_size: usize,
    flush_interval: Duration,
    batch: Mutex<Batch>,
    source_type: String,
    cipher: Option<PayloadCipher>,
    auth: AuthAttacher,
    metrics: Arc<dyn MetricsSink>,
    tracer: Arc<dyn TracerSink>,
}

impl BatchingSender {
    pub fn new(
        server_url: String,
        batch_size: usize,
        flush_interval: Duration,
        source_type: String,
        tls: &TlsContext,
        cipher: Option<PayloadCipher>,
        auth: AuthAttacher,
        metrics: Arc<dyn MetricsSink>,
        tracer: Arc<dyn TracerSink>,
    ) -> Result<Self, TailPostError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(client_config) = tls.client_config.clone() {
            builder = builder.use_preconfigured_tls((*client_config).clone());
        }
        let http = builder
            .build()
            .map_err(|e| TailPostError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(SenderInner {
                http,
                server_url,
                batch_size,
                flush_interval,
                batch: Mutex::new(Batch::new(batch_size)),
                source_type,
                cipher,
                auth,
                metrics,
                tracer,
            }),
            flush_task: None,
            state: Arc::new(AtomicU8::new(STATE_NEW)),
        })
    }

    /// Moves `New -> Running` and spawns the periodic flush task. A second
    /// call while already running is a no-op (idempotent only before
    /// `stop()` has been called, per the state machine).
    pub fn start(&mut self) {
        if self
            .state
            .compare_exchange(STATE_NEW, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let inner = self.inner.clone();
        let state = self.state.clone();
        self.flush_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.flush_interval).await;
                if state.load(Ordering::SeqCst) != STATE_RUNNING {
                    return;
                }
                flush_if_due(&inner).await;
            }
        }));
    }

    /// Appends `line`; flushes immediately if the batch is now full.
    pub async fn send(&self, line: LogLine) {
        self.send_with_context(Context::current(), line).await
    }

    /// As `send`, propagating `ctx` to the resulting HTTP request's span.
    pub async fn send_with_context(&self, ctx: Context, line: LogLine) {
        let taken = {
            let mut batch = self.inner.batch.lock().await;
            batch.push(line);
            if batch.is_full() {
                Some(batch.take())
            } else {
                None
            }
        };
        if let Some(lines) = taken {
            spawn_transmit(self.inner.clone(), lines, ctx);
        }
    }

    /// Drains the current batch with one final flush attempt, then
    /// terminates. Safe to call more than once; a second call from either
    /// `Stopping` or `Stopped` is a no-op.
    pub async fn stop(&mut self) {
        if self
            .state
            .compare_exchange(STATE_RUNNING, STATE_STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Already stopping/stopped, or never started — nothing to drain.
            return;
        }
        if let Some(handle) = self.flush_task.take() {
            handle.abort();
        }
        flush_if_due(&self.inner).await;
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
    }
}

async fn flush_if_due(inner: &Arc<SenderInner>) {
    let taken = {
        let mut batch = inner.batch.lock().await;
        if batch.is_empty() {
            None
        } else {
            Some(batch.take())
        }
    };
    if let Some(lines) = taken {
        transmit(inner.clone(), lines, Context::current()).await;
    }
}

fn spawn_transmit(inner: Arc<SenderInner>, lines: Vec<LogLine>, ctx: Context) {
    tokio::spawn(async move {
        transmit(inner, lines, ctx).await;
    });
}

async fn transmit(inner: Arc<SenderInner>, lines: Vec<LogLine>, ctx: Context) {
    if lines.is_empty() {
        return;
    }
    inner.metrics.observe_batch_size(lines.len());
    let (_child_ctx, mut span) = inner.tracer.start_span(&ctx, "tailpost.send_batch");

    let contents: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
    let json_body = match serde_json::to_vec(&contents) {
        Ok(bytes) => bytes,
        Err(e) => {
            record_failure(&inner, "serialization", &e.to_string(), &mut *span);
            return;
        }
    };

    let (body, content_type, encrypted_headers) = match &inner.cipher {
        Some(cipher) => match cipher.encrypt(&json_body) {
            Ok(ciphertext) => (
                ciphertext,
                "application/octet-stream",
                Some(cipher.key_id().to_string()),
            ),
            Err(e) => {
                record_failure(&inner, "crypto", &e.to_string(), &mut *span);
                return;
            }
        },
        None => (json_body, "application/json", None),
    };

    let mut request = inner
        .http
        .post(&inner.server_url)
        .header("Content-Type", content_type)
        .body(body);
    if let Some(key_id) = &encrypted_headers {
        request = request.header("X-Encrypted", "true").header("X-Key-ID", key_id);
    }

    let request = match inner.auth.attach(request).await {
        Ok(r) => r,
        Err(e) => {
            record_failure(&inner, "auth", &e.to_string(), &mut *span);
            return;
        }
    };

    let start = Instant::now();
    let result = request.send().await;
    let elapsed = start.elapsed().as_secs_f64();
    inner.metrics.observe_send_latency(&inner.source_type, elapsed);

    match result {
        Ok(response) if response.status().is_success() => {
            inner.metrics.inc_logs_sent(&inner.source_type);
        }
        Ok(response) => {
            let status = response.status();
            warn!(status = %status, "sink rejected batch");
            record_failure(&inner, "server_rejection", &format!("status {status}"), &mut *span);
        }
        Err(e) => {
            error!(error = %e, "network error sending batch");
            record_failure(&inner, "network", &e.to_string(), &mut *span);
        }
    }
}

fn record_failure(inner: &Arc<SenderInner>, error_type: &str, message: &str, span: &mut dyn crate::infrastructure::telemetry::SpanHandle) {
    inner.metrics.inc_logs_send_failures(&inner.source_type, error_type);
    span.record_error(&TailPostError::NetworkError(message.to_string()));
}
