//! Error types for Bakery operations.
//!
//! This module defines [`BakeryError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Steps never return errors to the runner; they record a message under the
//!   `"error"` state key and halt (see [`crate::multistep::halt_with`])
//! - Use `BakeryError` for conditions callers need to tell apart
//!   (a failed build vs. a cancelled one)
//! - Use `anyhow::Error` (via `BakeryError::Other`) for unexpected errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for Bakery operations.
#[derive(Debug, Error)]
pub enum BakeryError {
    /// Build file not found at expected location.
    #[error("Build file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse the build file.
    #[error("Failed to parse build file at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid build file structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A state key a step depends on was never written.
    #[error("State key '{key}' is not set")]
    StateKeyMissing { key: String },

    /// A state key holds a value of another type than the reader expects.
    #[error("State key '{key}' does not hold a {expected}")]
    StateTypeMismatch { key: String, expected: &'static str },

    /// Template could not be parsed or rendered.
    #[error("Template error in '{template}': {message}")]
    Template { template: String, message: String },

    /// Interpolation referenced an unknown variable.
    #[error("Unresolved variable: ${{{name}}}")]
    UnresolvedVariable { name: String },

    /// Step execution failed.
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    /// Shell command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Shell command ran past its timeout and was killed.
    #[error("Command timed out after {timeout:?}: {command}")]
    CommandTimeout { command: String, timeout: Duration },

    /// Waiting for a resource to change state failed.
    #[error(transparent)]
    Wait(#[from] crate::wait::WaitError),

    /// A build halted with the error recorded by the failing step.
    #[error("Build failed: {message}")]
    BuildFailed { message: String },

    /// A build (or a wait within it) was cancelled.
    #[error("Build was cancelled")]
    Cancelled,

    /// Destroying an artifact failed for one or more images.
    #[error("Failed to destroy artifact: {message}")]
    ArtifactDestroy { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Bakery operations.
pub type Result<T> = std::result::Result<T, BakeryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = BakeryError::ConfigNotFound {
            path: PathBuf::from("/foo/build.yml"),
        };
        assert!(err.to_string().contains("/foo/build.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = BakeryError::ConfigParseError {
            path: PathBuf::from("/build.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/build.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn state_key_missing_displays_key() {
        let err = BakeryError::StateKeyMissing {
            key: "instance".into(),
        };
        assert_eq!(err.to_string(), "State key 'instance' is not set");
    }

    #[test]
    fn state_type_mismatch_displays_expected_type() {
        let err = BakeryError::StateTypeMismatch {
            key: "volume_id".into(),
            expected: "alloc::string::String",
        };
        let msg = err.to_string();
        assert!(msg.contains("volume_id"));
        assert!(msg.contains("String"));
    }

    #[test]
    fn unresolved_variable_uses_dollar_brace_syntax() {
        let err = BakeryError::UnresolvedVariable {
            name: "volume_id".into(),
        };
        assert_eq!(err.to_string(), "Unresolved variable: ${volume_id}");
    }

    #[test]
    fn build_failed_displays_message() {
        let err = BakeryError::BuildFailed {
            message: "attach failed".into(),
        };
        assert!(err.to_string().contains("attach failed"));
    }

    #[test]
    fn cancelled_is_distinct_from_failure() {
        let err = BakeryError::Cancelled;
        assert!(!matches!(err, BakeryError::BuildFailed { .. }));
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn command_failed_displays_command_and_code() {
        let err = BakeryError::CommandFailed {
            command: "mount /dev/xvdf /mnt".into(),
            code: Some(32),
        };
        let msg = err.to_string();
        assert!(msg.contains("mount /dev/xvdf /mnt"));
        assert!(msg.contains("32"));
    }

    #[test]
    fn command_timeout_displays_limit() {
        let err = BakeryError::CommandTimeout {
            command: "sleep 60".into(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Command timed out after 5s: sleep 60");
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BakeryError = io_err.into();
        assert!(matches!(err, BakeryError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(BakeryError::ConfigValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
