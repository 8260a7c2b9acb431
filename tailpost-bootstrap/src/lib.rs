// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the domain/infrastructure layers and
//! provides everything the `tailpost` binary needs before the core agent can
//! run:
//!
//! - **CLI parsing** - secure `clap`-derived argument validation
//! - **Logging initialization** - `tracing`/`tracing-subscriber` setup
//! - **Signal handling** - graceful shutdown on SIGTERM/SIGINT (Ctrl-C)
//! - **Shutdown coordination** - cancellation token propagation with a grace
//!   period
//! - **Platform abstraction** - the handful of OS facts the agent needs
//!   (platform name, elevated-privilege check)
//! - **Exit codes** - mapping a `TailPostError` to a process exit status
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (This Module)             │
//! │  - CLI parsing                               │
//! │  - Logging init                              │
//! │  - Signal handling / shutdown coordination   │
//! │  - Platform abstraction                      │
//! │  - Exit code mapping                         │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │              tailpost (agent)                │
//! │  - AgentSupervisor, infrastructure adapters  │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │            tailpost-domain                   │
//! │  - Value objects, ports, error taxonomy      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Bootstrap can see every other layer; no other layer depends on bootstrap.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ValidatedCli};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Parses and validates the process's CLI arguments.
///
/// This is the first thing `main` should call: clap handles `--help` and
/// `--version` by exiting the process on its own, so a successful return
/// here means the caller has a fully validated [`ValidatedCli`] in hand.
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
