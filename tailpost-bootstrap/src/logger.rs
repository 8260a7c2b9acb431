// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging
//!
//! Two concerns live here:
//!
//! - [`init_tracing`] initializes the process-wide `tracing` subscriber
//!   exactly once, selecting a console or JSON formatter.
//! - [`BootstrapLogger`] is a minimal, trait-based logging seam for the
//!   handful of messages bootstrap itself needs to emit before the
//!   subscriber is guaranteed to be installed (e.g. while still parsing
//!   CLI arguments) — testable with a no-op/capturing implementation
//!   instead of depending on a live subscriber.

use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogFormat;

/// Installs the global `tracing` subscriber. Must be called exactly once,
/// as early in `main` as possible (after CLI parsing, since the level comes
/// from `--log-level`).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Console => fmt().with_env_filter(filter).try_init(),
    }
}

/// Bootstrap logging abstraction for messages emitted before (or regardless
/// of) the global subscriber's presence.
pub trait BootstrapLogger: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Routes bootstrap messages through `tracing` under the `bootstrap` target.
pub struct ConsoleLogger {
    prefix: String,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::with_prefix("bootstrap")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapLogger for ConsoleLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: "bootstrap", "[{}] {}", self.prefix, message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "bootstrap", "[{}] {}", self.prefix, message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "bootstrap", "[{}] {}", self.prefix, message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "bootstrap", "[{}] {}", self.prefix, message);
    }
}

/// Discards every message. Used in tests that exercise bootstrap logic
/// without wanting its log output.
pub struct NoOpLogger;

impl BootstrapLogger for NoOpLogger {
    fn error(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_logger_does_not_panic() {
        let logger = ConsoleLogger::new();
        logger.info("test message");
    }

    #[test]
    fn noop_logger_discards_everything() {
        let logger = NoOpLogger;
        logger.error("error");
        logger.warn("warning");
        logger.info("info");
        logger.debug("debug");
    }
}
