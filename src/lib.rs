//! Bakery - multistep machine image builds.
//!
//! A build is an ordered list of steps run against a shared state bag. Each
//! step may write state for later steps, halt the build, or observe
//! cancellation; every step that ran is cleaned up in reverse order however
//! the build ends.
//!
//! # Modules
//!
//! - [`multistep`] - State bag, steps, and the runner
//! - [`wait`] - Polling for state changes and step-local retries
//! - [`template`] - `{{.Field}}` command wrappers and `${name}` interpolation
//! - [`shell`] - Local command execution
//! - [`steps`] - Provider-neutral steps, hooks, and communicators
//! - [`artifact`] - Build results
//! - [`build`] - Running a build file
//! - [`config`] - Build file loading, parsing, and validation
//! - [`cli`] - Command-line interface and argument parsing
//! - [`secrets`] - Secret detection and output masking
//! - [`ui`] - Console and mock output
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```
//! use bakery::multistep::{BuildOutcome, CancelToken, Runner, StateBag};
//! use bakery::steps::StepShell;
//!
//! let steps: Vec<Box<dyn bakery::multistep::Step>> = vec![
//!     Box::new(StepShell::new("create").run_commands(["echo vol-0123"]).output("volume_id")),
//!     Box::new(StepShell::new("attach").run_commands(["test ${volume_id} = vol-0123"])),
//! ];
//!
//! let state = StateBag::new();
//! let report = Runner::new(steps).run(&CancelToken::new(), &state);
//!
//! assert_eq!(report.ran, vec!["create", "attach"]);
//! assert!(BuildOutcome::from_state(&state, report.state).is_success());
//! ```

pub mod artifact;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod multistep;
pub mod secrets;
pub mod shell;
pub mod steps;
pub mod template;
pub mod ui;
pub mod wait;

pub use error::{BakeryError, Result};
