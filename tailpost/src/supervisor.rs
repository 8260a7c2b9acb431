//! The `AgentSupervisor`: constructs every other component in the required
//! order, runs the single-task dispatch loop, and coordinates the shutdown
//! sequence on SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use opentelemetry::Context;
use tailpost_bootstrap::shutdown::CancellationToken;
use tracing::{error, info, warn};

use tailpost_domain::services::LineSource;
use tailpost_domain::{AgentLifecycleState, Config, TailPostError};

use crate::infrastructure::auth::AuthAttacher;
use crate::infrastructure::config::{self as config_loader};
use crate::infrastructure::crypto::{self, PayloadCipher};
use crate::infrastructure::health::HealthServer;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::sender::BatchingSender;
use crate::infrastructure::sources::container::OrchestratorLogApi;
use crate::infrastructure::sources::LineStream;
use crate::infrastructure::telemetry::TracerSink;
use crate::infrastructure::tls::TlsContext;

pub struct AgentSupervisor {
    config: Config,
    metrics: Arc<dyn MetricsSink>,
    tracer: Arc<dyn TracerSink>,
    orchestrator: Arc<dyn OrchestratorLogApi>,
}

impl AgentSupervisor {
    pub fn new(
        config: Config,
        metrics: Arc<dyn MetricsSink>,
        tracer: Arc<dyn TracerSink>,
        orchestrator: Arc<dyn OrchestratorLogApi>,
    ) -> Self {
        Self {
            config,
            metrics,
            tracer,
            orchestrator,
        }
    }

    /// Loads `Config` from `config_path` and builds a supervisor with the
    /// production metrics/tracer sinks and the default orchestrator API.
    pub fn from_config_path(
        config_path: &str,
        metrics: Arc<dyn MetricsSink>,
        tracer: Arc<dyn TracerSink>,
        orchestrator: Arc<dyn OrchestratorLogApi>,
    ) -> Result<Self, TailPostError> {
        let config = config_loader::load_from_path(config_path)?;
        Ok(Self::new(config, metrics, tracer, orchestrator))
    }

    /// Runs the agent to completion: build, dispatch, shut down. Returns
    /// once shutdown has finished, or `Err(ShutdownTimeout)` if it ran past
    /// `shutdown_grace`.
    pub async fn run(
        self,
        health_addr: SocketAddr,
        shutdown: CancellationToken,
        shutdown_grace: Duration,
    ) -> Result<(), TailPostError> {
        let mut lifecycle = AgentLifecycleState::Initializing;

        // 1. TLS context.
        let tls = TlsContext::build(&self.config.tls)?;

        // 2. Health server, started but not ready.
        let auth = AuthAttacher::from_settings(&self.config.auth, reqwest::Client::new())?;
        let mut health_server = HealthServer::start(health_addr, self.metrics.clone(), auth.clone(), &tls).await?;

        // 3. LineStream for the configured source, started.
        let mut source = LineStream::from_source_kind(&self.config.source, self.orchestrator.clone())?;
        source.start().await?;
        let source_type = self.config.source.label();

        // 4. BatchingSender, started.
        let cipher = build_cipher(&self.config)?;
        let mut sender = BatchingSender::new(
            self.config.server_url.clone(),
            self.config.batch_size,
            self.config.flush_interval,
            source_type.to_string(),
            &tls,
            cipher,
            auth,
            self.metrics.clone(),
            self.tracer.clone(),
        )?;
        sender.start();

        // 5. Ready.
        health_server.set_ready(true).await;
        transition(&mut lifecycle, AgentLifecycleState::Running);

        // 6. Dispatch loop.
        info!(source_type, "agent running");
        let mut lines = source.lines();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown signal received, exiting dispatch loop");
                    break;
                }
                maybe_line = lines.next() => {
                    match maybe_line {
                        None => {
                            warn!("source stream ended");
                            break;
                        }
                        Some(line) => {
                            self.metrics.inc_logs_processed(source_type);
                            let (_child_ctx, mut span) = self.tracer.start_span(&Context::current(), "tailpost.process_line");
                            sender.send_with_context(Context::current(), line).await;
                            let _ = &mut span; // span ends on drop; record_error would be called here on failure
                            // tailpost_logs_sent_total / tailpost_send_latency_seconds are owned by
                            // BatchingSender::transmit, the only place that knows the real outcome
                            // of an HTTP attempt — not recorded here to avoid double counting.
                        }
                    }
                }
            }
        }

        // Shutdown sequence, bounded so a wedged source or sink can't hang
        // the process forever.
        transition(&mut lifecycle, AgentLifecycleState::Draining);
        let tracer = self.tracer.clone();
        let cleanup = async move {
            health_server.set_ready(false).await;
            sender.stop().await;
            drop(lines);
            source.stop().await;
            health_server.stop().await;
            tracer.shutdown();
        };

        if tokio::time::timeout(shutdown_grace, cleanup).await.is_err() {
            let err = TailPostError::ShutdownTimeout(format!("shutdown did not finish within {shutdown_grace:?}"));
            error!(error = %err, "some operations may not have completed");
            return Err(err);
        }

        transition(&mut lifecycle, AgentLifecycleState::Stopped);
        Ok(())
    }
}

/// Advances `state` to `next`, refusing to skip a phase. The lifecycle only
/// ever moves forward; `can_transition_to` is what makes that an enforced
/// invariant rather than a convention.
fn transition(state: &mut AgentLifecycleState, next: AgentLifecycleState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal lifecycle transition {state:?} -> {next:?}"
    );
    info!(from = ?state, to = ?next, "lifecycle transition");
    *state = next;
}

fn build_cipher(config: &Config) -> Result<Option<PayloadCipher>, TailPostError> {
    use tailpost_domain::config::EncryptionSettings;
    match &config.encryption {
        EncryptionSettings::None => Ok(None),
        EncryptionSettings::Aes256Gcm(key_source) => {
            let key = load_key(key_source)?;
            Ok(Some(PayloadCipher::aes256gcm(&key)?))
        }
        EncryptionSettings::ChaCha20Poly1305(key_source) => {
            let key = load_key(key_source)?;
            Ok(Some(PayloadCipher::chacha20poly1305(&key)?))
        }
    }
}

fn load_key(
    key_source: &tailpost_domain::config::EncryptionKeySource,
) -> Result<tailpost_domain::value_objects::KeyMaterial, TailPostError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    crypto::load_key_material(
        key_source.key_file.as_deref(),
        key_source.key_env.as_deref(),
        key_source.key_id.as_deref(),
        now,
    )
}
