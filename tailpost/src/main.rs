// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process entry point: parse CLI, initialize logging, build the
//! metrics/tracing sinks, hand off to the supervisor, and map the result to
//! an exit code.

use std::sync::Arc;

use tailpost_bootstrap::shutdown::ShutdownCoordinator;
use tailpost_bootstrap::{logger, result_to_exit_code, signals};

use tailpost::infrastructure::metrics::{MetricsSink, NoopMetricsSink, PrometheusMetricsSink};
use tailpost::infrastructure::sources::kubectl::KubectlLogApi;
use tailpost::infrastructure::telemetry::{NoopTracerSink, OtelTracerSink, TracerSink};
use tailpost::supervisor::AgentSupervisor;
use tailpost::TailPostError;

const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match tailpost_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("argument error: {e}");
            return std::process::ExitCode::from(64); // EX_USAGE
        }
    };

    if logger::init_tracing(&cli.log_level, cli.log_format).is_err() {
        eprintln!("warning: tracing subscriber was already initialized");
    }

    let result = run(cli).await;
    result_to_exit_code(result)
}

async fn run(cli: tailpost_bootstrap::ValidatedCli) -> Result<(), TailPostError> {
    let metrics: Arc<dyn MetricsSink> = match PrometheusMetricsSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build Prometheus registry, metrics disabled");
            Arc::new(NoopMetricsSink)
        }
    };

    let tracer: Arc<dyn TracerSink> = match std::env::var("TAILPOST_OTLP_ENDPOINT") {
        Ok(endpoint) => Arc::new(OtelTracerSink::new(&endpoint)?),
        Err(_) => Arc::new(NoopTracerSink),
    };

    let orchestrator = Arc::new(KubectlLogApi::new());

    let supervisor = AgentSupervisor::from_config_path(
        &cli.config.to_string_lossy(),
        metrics,
        tracer,
        orchestrator,
    )?;

    let coordinator = ShutdownCoordinator::new(SHUTDOWN_GRACE);
    signals::install(coordinator.clone());

    supervisor.run(cli.metrics_addr, coordinator.token(), SHUTDOWN_GRACE).await
}
