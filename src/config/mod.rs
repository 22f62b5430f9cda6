//! Build file loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use bakery::config::{load_config_file, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("bakery.yml");
//! fs::write(
//!     &path,
//!     "name: base\nsteps:\n  - type: shell\n    name: hello\n    run: [\"echo hi\"]\n",
//! )
//! .unwrap();
//!
//! let config = load_config_file(&path).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.steps[0].name(), "hello");
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_config_file, parse_config};
pub use schema::{
    BuildConfig, LocalCommandsStepConfig, PollingSettings, ProvisionStepConfig,
    RecordImageStepConfig, ShellStepConfig, StepConfig, WaitForStepConfig,
};
pub use validator::{check_references, into_result, validate, validate_config, ValidationError};
