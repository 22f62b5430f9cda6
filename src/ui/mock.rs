//! Mock UI implementation for testing.
//!
//! `MockUI` implements [`UserInterface`] and captures every line for later
//! assertion. Lines are masked on capture, like [`ConsoleUi`](super::ConsoleUi)
//! masks them on print.
//!
//! # Example
//!
//! ```
//! use bakery::ui::{MockUI, UserInterface};
//!
//! let ui = MockUI::new();
//! ui.say("Creating volume...");
//! ui.error("attach failed");
//!
//! assert!(ui.has_say("Creating volume"));
//! assert!(ui.has_error("attach failed"));
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::secrets::OutputMasker;

use super::{OutputMode, UserInterface};

#[derive(Debug, Default)]
struct Captured {
    says: Vec<String>,
    messages: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Mock UI that records output instead of printing it.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    masker: OutputMasker,
    captured: Mutex<Captured>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Mask captured lines with `masker`.
    pub fn with_masker(mut self, masker: OutputMasker) -> Self {
        self.masker = masker;
        self
    }

    fn captured(&self) -> MutexGuard<'_, Captured> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Captured headlines.
    pub fn says(&self) -> Vec<String> {
        self.captured().says.clone()
    }

    /// Captured detail messages.
    pub fn messages(&self) -> Vec<String> {
        self.captured().messages.clone()
    }

    /// Captured warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.captured().warnings.clone()
    }

    /// Captured errors.
    pub fn errors(&self) -> Vec<String> {
        self.captured().errors.clone()
    }

    /// Every captured line, in channel order (says, messages, warnings, errors).
    pub fn all_lines(&self) -> Vec<String> {
        let c = self.captured();
        c.says
            .iter()
            .chain(&c.messages)
            .chain(&c.warnings)
            .chain(&c.errors)
            .cloned()
            .collect()
    }

    /// Whether a headline containing `substr` was captured.
    pub fn has_say(&self, substr: &str) -> bool {
        self.captured().says.iter().any(|m| m.contains(substr))
    }

    /// Whether a detail message containing `substr` was captured.
    pub fn has_message(&self, substr: &str) -> bool {
        self.captured().messages.iter().any(|m| m.contains(substr))
    }

    /// Whether a warning containing `substr` was captured.
    pub fn has_warning(&self, substr: &str) -> bool {
        self.captured().warnings.iter().any(|m| m.contains(substr))
    }

    /// Whether an error containing `substr` was captured.
    pub fn has_error(&self, substr: &str) -> bool {
        self.captured().errors.iter().any(|m| m.contains(substr))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn say(&self, msg: &str) {
        let msg = self.masker.mask(msg);
        self.captured().says.push(msg);
    }

    fn message(&self, msg: &str) {
        let msg = self.masker.mask(msg);
        self.captured().messages.push(msg);
    }

    fn warning(&self, msg: &str) {
        let msg = self.masker.mask(msg);
        self.captured().warnings.push(msg);
    }

    fn error(&self, msg: &str) {
        let msg = self.masker.mask(msg);
        self.captured().errors.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_each_channel() {
        let ui = MockUI::new();
        ui.say("say");
        ui.message("message");
        ui.warning("warning");
        ui.error("error");

        assert_eq!(ui.says(), vec!["say"]);
        assert_eq!(ui.messages(), vec!["message"]);
        assert_eq!(ui.warnings(), vec!["warning"]);
        assert_eq!(ui.errors(), vec!["error"]);
        assert_eq!(ui.all_lines().len(), 4);
    }

    #[test]
    fn masks_on_capture() {
        let mut masker = OutputMasker::new();
        masker.add_secret("hunter2");
        let ui = MockUI::new().with_masker(masker);

        ui.say("password hunter2");
        ui.error("hunter2 rejected");

        assert!(ui.all_lines().iter().all(|l| !l.contains("hunter2")));
        assert!(ui.has_error("<sensitive> rejected"));
    }

    #[test]
    fn with_mode_reports_mode() {
        assert_eq!(
            MockUI::with_mode(OutputMode::Verbose).output_mode(),
            OutputMode::Verbose
        );
    }

    #[test]
    fn has_checks_substrings() {
        let ui = MockUI::new();
        ui.message("Volume vol-0123 attached");
        assert!(ui.has_message("vol-0123"));
        assert!(!ui.has_message("vol-9999"));
        assert!(!ui.has_warning("vol-0123"));
    }
}
