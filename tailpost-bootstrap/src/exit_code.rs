// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Codes
//!
//! Maps the agent's result to a Unix-style exit status so operators and
//! process supervisors (systemd, Kubernetes) can distinguish failure classes
//! without parsing log output.

use tailpost_domain::TailPostError;

/// Process exit codes, loosely following the BSD `sysexits.h` convention
/// already used for CLI argument errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Ran and shut down cleanly.
    Ok = 0,
    /// Generic failure, no more specific code applies.
    GenericError = 1,
    /// CLI argument parsing/validation failed (`EX_USAGE`).
    UsageError = 64,
    /// Configuration file missing, malformed, or failed validation (`EX_CONFIG`).
    ConfigError = 78,
    /// The configured log source could not be opened or unexpectedly ended.
    SourceError = 74,
    /// The agent failed to reach its sink over the network.
    NetworkError = 69,
    /// Authentication or payload encryption failed.
    SecurityError = 77,
    /// Shutdown ran past its grace period.
    ShutdownTimeout = 75,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Maps a [`TailPostError`] to the [`ExitCode`] that best describes its
/// category.
pub fn map_error_to_exit_code(error: &TailPostError) -> ExitCode {
    match error {
        TailPostError::ConfigError(_) => ExitCode::ConfigError,
        TailPostError::PlatformUnsupported(_) => ExitCode::ConfigError,
        TailPostError::SourceOpenError(_) | TailPostError::SourceTransientError(_) => ExitCode::SourceError,
        TailPostError::NetworkError(_) | TailPostError::ServerRejection { .. } => ExitCode::NetworkError,
        TailPostError::AuthError(_) | TailPostError::CryptoError(_) => ExitCode::SecurityError,
        TailPostError::ShutdownTimeout(_) => ExitCode::ShutdownTimeout,
        TailPostError::InternalError(_) => ExitCode::GenericError,
    }
}

/// Converts the agent's top-level `Result` into a process [`std::process::ExitCode`],
/// logging the error (if any) first.
pub fn result_to_exit_code(result: Result<(), TailPostError>) -> std::process::ExitCode {
    match result {
        Ok(()) => ExitCode::Ok.into(),
        Err(e) => {
            tracing::error!(error = %e, category = e.category(), "agent exited with error");
            map_error_to_exit_code(&e).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = TailPostError::config("bad yaml");
        assert_eq!(map_error_to_exit_code(&err), ExitCode::ConfigError);
    }

    #[test]
    fn network_errors_map_to_network_exit_code() {
        let err = TailPostError::network("connection refused");
        assert_eq!(map_error_to_exit_code(&err), ExitCode::NetworkError);
    }

    #[test]
    fn server_rejection_maps_to_network_exit_code() {
        let err = TailPostError::ServerRejection {
            status: 500,
            message: "internal error".to_string(),
        };
        assert_eq!(map_error_to_exit_code(&err), ExitCode::NetworkError);
    }

    #[test]
    fn auth_and_crypto_errors_map_to_security_exit_code() {
        assert_eq!(
            map_error_to_exit_code(&TailPostError::auth("bad credentials")),
            ExitCode::SecurityError
        );
        assert_eq!(
            map_error_to_exit_code(&TailPostError::crypto("decrypt failed")),
            ExitCode::SecurityError
        );
    }

    #[test]
    fn result_to_exit_code_handles_ok() {
        // Just confirm conversion from the success result doesn't panic.
        let _code = result_to_exit_code(Ok(()));
    }
}
