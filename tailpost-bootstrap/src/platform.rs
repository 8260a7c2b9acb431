// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform Abstraction Module
//!
//! The agent's source readers already gate their platform-specific behavior
//! with `#[cfg(windows)]`/`#[cfg(target_os = "macos")]` at the point of use
//! (see `tailpost::infrastructure::sources`). What's left at the bootstrap
//! layer is the handful of OS facts that are genuinely cross-cutting: the
//! platform's display name (used in startup log lines) and whether the
//! process is running elevated (surfaced so an operator can tell why a
//! Windows Event Log source failed to open with a permissions error).
//!
//! ## Architecture Pattern
//!
//! - **Interface**: `Platform` trait defines the contract
//! - **Implementations**: `UnixPlatform` (Linux + macOS), `WindowsPlatform`
//! - **Selection**: compile-time, via `#[cfg]`

use std::path::PathBuf;
use thiserror::Error;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;

#[cfg(windows)]
pub use windows::WindowsPlatform;

/// Platform-specific errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not supported on this platform: {0}")]
    NotSupported(String),

    #[error("platform error: {0}")]
    Other(String),
}

/// The OS facts the agent needs, abstracted behind a trait so bootstrap
/// logic can be tested without conditional compilation at every call site.
pub trait Platform: Send + Sync {
    /// Platform identifier used in startup logs: "linux", "macos", "windows".
    fn platform_name(&self) -> &'static str;

    /// Whether the process is running with elevated privileges (root on
    /// Unix, Administrator on Windows). Used only for diagnostics; TailPost
    /// never requires elevation to run.
    fn is_elevated(&self) -> bool;

    /// The platform's temporary directory, used as a fallback location for
    /// key material staged from an environment variable.
    fn temp_dir(&self) -> PathBuf;
}

#[cfg(unix)]
type PlatformImpl = UnixPlatform;

#[cfg(windows)]
type PlatformImpl = WindowsPlatform;

/// Returns the platform implementation selected at compile time for the
/// current OS.
pub fn create_platform() -> Box<dyn Platform> {
    Box::new(PlatformImpl::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_name_is_non_empty() {
        let platform = create_platform();
        assert!(!platform.platform_name().is_empty());
    }

    #[test]
    fn temp_dir_is_non_empty() {
        let platform = create_platform();
        assert!(!platform.temp_dir().as_os_str().is_empty());
    }
}
