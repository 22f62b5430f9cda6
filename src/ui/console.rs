//! Line-oriented console UI.

use crate::secrets::OutputMasker;

use super::theme::{should_use_colors, BakeryTheme};
use super::{OutputMode, UserInterface};

/// UI that prints to stdout/stderr.
///
/// Every line is passed through the [`OutputMasker`] before it is styled, so
/// a secret never reaches the terminal in any channel. Headlines and details
/// go to stdout, warnings and errors to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleUi {
    mode: OutputMode,
    theme: BakeryTheme,
    masker: OutputMasker,
    prefix: Option<String>,
}

impl ConsoleUi {
    /// Create a console UI, with colors when the terminal supports them.
    pub fn new(mode: OutputMode) -> Self {
        let theme = if should_use_colors() {
            BakeryTheme::new()
        } else {
            BakeryTheme::plain()
        };
        Self {
            mode,
            theme,
            masker: OutputMasker::new(),
            prefix: None,
        }
    }

    /// Disable colors.
    pub fn plain(mut self) -> Self {
        self.theme = BakeryTheme::plain();
        self
    }

    /// Redact output with `masker`.
    pub fn with_masker(mut self, masker: OutputMasker) -> Self {
        self.masker = masker;
        self
    }

    /// Prefix every headline and detail with `prefix` (usually the build name).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Render a headline exactly as [`say`](UserInterface::say) prints it.
    pub fn render_say(&self, msg: &str) -> String {
        self.theme
            .format_say(self.prefix.as_deref(), &self.masker.mask(msg))
    }

    /// Render a detail line exactly as [`message`](UserInterface::message) prints it.
    pub fn render_message(&self, msg: &str) -> String {
        self.theme
            .format_message(self.prefix.as_deref(), &self.masker.mask(msg))
    }
}

impl UserInterface for ConsoleUi {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn say(&self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", self.render_say(msg));
        }
    }

    fn message(&self, msg: &str) {
        if self.mode.shows_details() {
            for line in msg.lines() {
                println!("{}", self.render_message(line));
            }
        }
    }

    fn warning(&self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{}", self.theme.format_warning(&self.masker.mask(msg)));
        }
    }

    fn error(&self, msg: &str) {
        eprintln!("{}", self.theme.format_error(&self.masker.mask(msg)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ui() -> ConsoleUi {
        let mut masker = OutputMasker::new();
        masker.add_secret("wJalrXUtnFEMI");
        ConsoleUi::new(OutputMode::Normal)
            .plain()
            .with_masker(masker)
            .with_prefix("base-image")
    }

    #[test]
    fn say_is_prefixed_and_masked() {
        assert_eq!(
            ui().render_say("using key wJalrXUtnFEMI"),
            "==> base-image: using key <sensitive>"
        );
    }

    #[test]
    fn message_is_masked() {
        assert_eq!(
            ui().render_message("secret=wJalrXUtnFEMI"),
            "    base-image: secret=<sensitive>"
        );
    }

    #[test]
    fn reports_output_mode() {
        assert_eq!(
            ConsoleUi::new(OutputMode::Quiet).output_mode(),
            OutputMode::Quiet
        );
    }

    #[test]
    fn silent_mode_still_reports_errors() {
        let ui = ConsoleUi::new(OutputMode::Silent).plain();
        ui.say("hidden");
        ui.error("shown on stderr");
    }
}
