//! Secret detection and redaction.
//!
//! - [`SecretMatcher`] - flags environment variable names that hold secrets
//! - [`OutputMasker`] - redacts secret values before the UI prints them
//! - [`LogMasker`] - the same redaction for `tracing` output on stderr
//!
//! # Example
//!
//! ```
//! use bakery::secrets::{OutputMasker, SecretMatcher};
//!
//! let matcher = SecretMatcher::with_builtins();
//! let masker = OutputMasker::from_env(&matcher, [("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI")]);
//! assert!(!masker.mask("key=wJalrXUtnFEMI").contains("wJalrXUtnFEMI"));
//! ```

pub mod mask;
pub mod pattern;

pub use mask::{LogMasker, MaskingWriter, OutputMasker, DEFAULT_MASK};
pub use pattern::{SecretMatcher, SecretPattern, BUILTIN_PATTERNS};
