// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Bridges OS shutdown signals (SIGTERM/SIGINT on Unix, Ctrl-C on Windows)
//! into a [`ShutdownCoordinator`](crate::shutdown::ShutdownCoordinator). Only
//! the first signal received triggers shutdown; subsequent signals are
//! logged and ignored, since `ShutdownCoordinator::initiate_shutdown` is
//! itself idempotent.

use tracing::info;

use crate::shutdown::ShutdownCoordinator;

/// Spawns a task that waits for the first SIGTERM or SIGINT (Unix) / Ctrl-C
/// (Windows) and initiates shutdown on `coordinator` when it arrives.
///
/// Returns immediately; the signal wait happens in the background.
pub fn install(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        coordinator.initiate_shutdown();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!(signal = "SIGTERM", "received"),
        _ = sigint.recv() => info!(signal = "SIGINT", "received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    info!(signal = "CTRL_C", "received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn install_does_not_trigger_shutdown_without_a_signal() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        install(coordinator.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!coordinator.is_shutting_down());
    }
}
