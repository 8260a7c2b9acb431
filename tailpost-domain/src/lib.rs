// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pure domain types, infrastructure ports, and the error taxonomy for the
//! TailPost log-collection agent. No I/O happens in this crate; the `async`
//! methods on [`services::LineSource`] describe a capability the
//! infrastructure layer fulfills, not a runtime dependency this crate takes
//! on.

pub mod config;
pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

pub use config::Config;
pub use entities::{AgentLifecycleState, HealthState};
pub use error::TailPostError;
pub use services::LineSource;
pub use value_objects::{Batch, KeyMaterial, LogLine, SourceKind};
