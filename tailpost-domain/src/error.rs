//! Domain error taxonomy for the log-collection agent.
//!
//! Every fallible operation in the core dispatch loop eventually resolves to
//! a [`TailPostError`] variant. Variants are grouped by where the failure
//! originates (configuration, source, network, security) rather than by
//! which crate raised them, so that the supervisor can decide what to do
//! with a failure without knowing which component produced it.

use thiserror::Error;

/// Errors that can occur anywhere in the agent's core: reading a config,
/// opening a log source, sending a batch, or validating a credential.
#[derive(Error, Debug, Clone)]
pub enum TailPostError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error("failed to open log source: {0}")]
    SourceOpenError(String),

    #[error("transient source error: {0}")]
    SourceTransientError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("server rejected batch (status {status}): {message}")]
    ServerRejection { status: u16, message: String },

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("cryptography error: {0}")]
    CryptoError(String),

    #[error("shutdown grace period exceeded: {0}")]
    ShutdownTimeout(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl TailPostError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn source_open(msg: impl Into<String>) -> Self {
        Self::SourceOpenError(msg.into())
    }

    pub fn source_transient(msg: impl Into<String>) -> Self {
        Self::SourceTransientError(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::CryptoError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Coarse category, used as a Prometheus label value — keep this set
    /// small and stable, it becomes cardinality on `tailpost_send_failures_total`.
    pub fn category(&self) -> &'static str {
        match self {
            TailPostError::ConfigError(_) => "config",
            TailPostError::PlatformUnsupported(_) => "platform",
            TailPostError::SourceOpenError(_) => "source_open",
            TailPostError::SourceTransientError(_) => "source_transient",
            TailPostError::NetworkError(_) => "network",
            TailPostError::ServerRejection { .. } => "server_rejection",
            TailPostError::AuthError(_) => "auth",
            TailPostError::CryptoError(_) => "crypto",
            TailPostError::ShutdownTimeout(_) => "shutdown_timeout",
            TailPostError::InternalError(_) => "internal",
        }
    }

    /// Whether the operation that produced this error is worth retrying.
    ///
    /// Source-side transient errors, network blips, and a shutdown that ran
    /// past its grace period are recoverable; configuration, auth, and crypto
    /// failures are not — retrying them just repeats the same mistake.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TailPostError::SourceTransientError(_) | TailPostError::NetworkError(_) | TailPostError::ShutdownTimeout(_)
        )
    }
}

impl From<std::io::Error> for TailPostError {
    fn from(err: std::io::Error) -> Self {
        TailPostError::SourceTransientError(err.to_string())
    }
}
