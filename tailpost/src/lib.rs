// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # TailPost
//!
//! A log-collection agent: tails one or more local log sources, batches
//! lines with bounded size and latency, and ships them to an HTTP(S) sink
//! with optional TLS, authentication, and payload encryption.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     AgentSupervisor                       │
//! │   constructs and sequences the lifecycle of everything    │
//! │   below, owns the cancellation token, runs the dispatch    │
//! │   loop.                                                    │
//! └──────────────────────────────────────────────────────────┘
//!                │                    │                │
//!        ┌───────▼──────┐     ┌───────▼───────┐  ┌─────▼──────┐
//!        │  LineStream  │────▶│ BatchingSender │  │HealthServer│
//!        │ (file/k8s/   │     │ (TLS/auth/enc) │  │ /health    │
//!        │  event log)  │     │                │  │ /ready     │
//!        └──────────────┘     └───────┬────────┘  │ /metrics   │
//!                                     │            └────────────┘
//!                              HTTP(S) sink
//! ```
//!
//! Pure types and ports live in [`tailpost_domain`]; this crate provides the
//! concrete infrastructure (source readers, the batching sender, auth,
//! crypto, TLS, the health server, metrics/tracing sinks) and the
//! supervisor that wires them together.

pub mod infrastructure;
pub mod supervisor;

pub use tailpost_domain::{Config, TailPostError};
