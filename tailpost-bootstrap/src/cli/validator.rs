//! Security validation for CLI arguments: path traversal prevention and
//! injection-pattern rejection, applied before any argument is trusted.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while validating CLI arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("path failed security validation: {0}")]
    UnsafePath(String),
}

/// Patterns that are never acceptable in a free-form string argument,
/// regardless of which flag carries it.
const DANGEROUS_PATTERNS: &[&str] = &["../", "..\\", "\0", "\n", "\r", "$(", "`"];

pub struct SecureArgParser;

impl SecureArgParser {
    /// Validates a string argument against shell-injection and
    /// path-traversal patterns without touching the filesystem. Suitable for
    /// values that may name a not-yet-existing output path.
    pub fn validate_argument(value: &str) -> Result<(), ParseError> {
        for pattern in DANGEROUS_PATTERNS {
            if value.contains(pattern) {
                return Err(ParseError::UnsafePath(format!(
                    "value contains disallowed sequence {pattern:?}"
                )));
            }
        }
        Ok(())
    }

    /// Validates a path argument that must already exist: runs the string
    /// checks, canonicalizes, and confirms the canonical path is reachable.
    pub fn validate_path(value: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(value)?;
        let path = PathBuf::from(value);
        std::fs::canonicalize(&path).map_err(|_| ParseError::PathNotFound(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal() {
        let err = SecureArgParser::validate_argument("../../etc/passwd").unwrap_err();
        assert!(matches!(err, ParseError::UnsafePath(_)));
    }

    #[test]
    fn rejects_command_substitution() {
        let err = SecureArgParser::validate_argument("$(rm -rf /)").unwrap_err();
        assert!(matches!(err, ParseError::UnsafePath(_)));
    }

    #[test]
    fn accepts_plain_value() {
        assert!(SecureArgParser::validate_argument("agent.yaml").is_ok());
    }

    #[test]
    fn validate_path_rejects_missing_file() {
        let err = SecureArgParser::validate_path("/no/such/path/agent.yaml").unwrap_err();
        assert!(matches!(err, ParseError::PathNotFound(_)));
    }

    #[test]
    fn validate_path_accepts_existing_file() {
        let file = tempfile_for_test();
        let result = SecureArgParser::validate_path(file.to_str().unwrap());
        assert!(result.is_ok());
    }

    fn tempfile_for_test() -> PathBuf {
        let path = std::env::temp_dir().join(format!("tailpost-cli-test-{}", std::process::id()));
        std::fs::write(&path, b"test").unwrap();
        path
    }
}
