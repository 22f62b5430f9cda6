//! User interface.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`ConsoleUi`] for terminal output
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use bakery::ui::{create_ui, OutputMode};
//! use bakery::secrets::OutputMasker;
//!
//! let ui = create_ui(OutputMode::Silent, OutputMasker::new(), None, false);
//! ui.say("Creating volume...");
//! ```

pub mod console;
pub mod mock;
pub mod output;
pub mod theme;

use std::sync::Arc;

pub use console::ConsoleUi;
pub use mock::MockUI;
pub use output::OutputMode;
pub use theme::{should_use_colors, BakeryTheme};

use crate::secrets::OutputMasker;

/// Output sink shared by the runner and every step.
///
/// Implementations are shared across threads as [`SharedUi`], so every
/// method takes `&self`.
pub trait UserInterface: Send + Sync {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Announce what a step is doing.
    fn say(&self, msg: &str);

    /// Show detail under the last headline.
    fn message(&self, msg: &str);

    /// Display a warning.
    fn warning(&self, msg: &str);

    /// Display an error. Shown in every mode.
    fn error(&self, msg: &str);
}

/// A UI handle as stored in the state bag.
pub type SharedUi = Arc<dyn UserInterface>;

/// Create the console UI for a build.
pub fn create_ui(
    mode: OutputMode,
    masker: OutputMasker,
    prefix: Option<&str>,
    no_color: bool,
) -> SharedUi {
    let mut ui = ConsoleUi::new(mode).with_masker(masker);
    if no_color {
        ui = ui.plain();
    }
    if let Some(prefix) = prefix {
        ui = ui.with_prefix(prefix);
    }
    Arc::new(ui)
}
