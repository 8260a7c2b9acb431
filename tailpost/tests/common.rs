// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared helpers for the end-to-end test suite.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tailpost::infrastructure::metrics::{MetricsSink, NoopMetricsSink};
use tailpost::infrastructure::sources::kubectl::KubectlLogApi;
use tailpost::infrastructure::sources::container::OrchestratorLogApi;
use tailpost::infrastructure::telemetry::{NoopTracerSink, TracerSink};
use tailpost::supervisor::AgentSupervisor;
use tailpost::Config;
use tailpost_bootstrap::shutdown::ShutdownCoordinator;

/// Binds an ephemeral port, reads back the address the OS chose, then
/// releases it. There is a narrow window where another process could steal
/// the port before the caller rebinds it; acceptable for test isolation.
pub fn free_local_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local_addr")
}

pub fn noop_metrics() -> Arc<dyn MetricsSink> {
    Arc::new(NoopMetricsSink)
}

pub fn noop_tracer() -> Arc<dyn TracerSink> {
    Arc::new(NoopTracerSink)
}

/// The supervisor never dereferences the orchestrator for a file source;
/// `KubectlLogApi` stands in as a harmless default.
pub fn unused_orchestrator() -> Arc<dyn OrchestratorLogApi> {
    Arc::new(KubectlLogApi::new())
}

/// Spawns `config` under a fresh supervisor and polls `/ready` until it
/// reports 200 (or panics after `timeout`). Returns the health address, the
/// shutdown coordinator, and the supervisor's join handle.
pub async fn spawn_ready_supervisor(
    config: Config,
    timeout: Duration,
) -> (SocketAddr, ShutdownCoordinator, tokio::task::JoinHandle<Result<(), tailpost::TailPostError>>) {
    let health_addr = free_local_addr();
    let supervisor = AgentSupervisor::new(config, noop_metrics(), noop_tracer(), unused_orchestrator());
    let grace = Duration::from_secs(5);
    let coordinator = ShutdownCoordinator::new(grace);
    let token = coordinator.token();

    let handle = tokio::spawn(async move { supervisor.run(health_addr, token, grace).await });

    wait_until_ready(health_addr, timeout).await;
    (health_addr, coordinator, handle)
}

pub async fn wait_until_ready(health_addr: SocketAddr, timeout: Duration) {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(resp) = client.get(format!("http://{health_addr}/ready")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("health server never became ready within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A bare-bones `Config` with `server_url` and `source` left for the caller
/// to override; everything else is the permissive, security-off default.
pub fn base_config(server_url: impl Into<String>, source: tailpost_domain::SourceKind) -> Config {
    use tailpost_domain::config::{AuthSettings, EncryptionSettings, TlsSettings};
    Config {
        server_url: server_url.into(),
        batch_size: 1,
        flush_interval: Duration::from_millis(100),
        source,
        tls: TlsSettings::default(),
        auth: AuthSettings::None,
        encryption: EncryptionSettings::None,
    }
}
