// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse()                 │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validator::validate()           │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `parser` - CLI structure and clap parsing
//! - `validator` - Security validation layer

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli};
pub use validator::{ParseError, SecureArgParser};

use std::net::SocketAddr;
use std::path::PathBuf;

/// Validated CLI configuration.
///
/// Holds every argument the binary accepts after security validation: paths
/// are canonicalization-checked and the address/level/format fields are
/// range- or set-checked.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    /// Path to the agent's YAML configuration file.
    pub config: PathBuf,
    /// Address the health/metrics server binds to.
    pub metrics_addr: SocketAddr,
    /// `tracing` `EnvFilter` directive, e.g. "info" or "tailpost=debug".
    pub log_level: String,
    /// Selected log formatter.
    pub log_format: LogFormat,
}

/// Output format for the process's structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colorized console output.
    Console,
    /// Newline-delimited JSON, one object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(ParseError::InvalidValue {
                arg: "log-format".to_string(),
                reason: format!("must be \"console\" or \"json\", got \"{other}\""),
            }),
        }
    }
}

/// Parses and validates the process's CLI arguments.
///
/// 1. Parses with clap.
/// 2. Validates the config path for traversal/injection patterns.
/// 3. Validates `--log-format` and `--log-level` against closed/open sets.
///
/// # Errors
///
/// Returns [`ParseError`] if any validation fails.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = SecureArgParser::validate_path(&cli.config.to_string_lossy())?;

    SecureArgParser::validate_argument(&cli.log_level)?;
    let log_format: LogFormat = cli.log_format.parse()?;

    Ok(ValidatedCli {
        config,
        metrics_addr: cli.metrics_addr,
        log_level: cli.log_level,
        log_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_log_format() {
        let err = "yaml".parse::<LogFormat>().unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn accepts_known_log_formats() {
        assert_eq!("console".parse::<LogFormat>().unwrap(), LogFormat::Console);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }
}
