//! Visual theme and styling.

use console::Style;

/// Styles for console output.
#[derive(Debug, Clone)]
pub struct BakeryTheme {
    /// Step headlines (bold).
    pub say: Style,
    /// Detail lines (normal).
    pub message: Style,
    /// Warnings (orange).
    pub warning: Style,
    /// Errors (red bold).
    pub error: Style,
    /// Secondary text such as the build name prefix (dim).
    pub dim: Style,
}

impl Default for BakeryTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl BakeryTheme {
    /// Create the default theme.
    pub fn new() -> Self {
        Self {
            say: Style::new().bold(),
            message: Style::new(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            say: Style::new(),
            message: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
        }
    }

    /// `==> prefix: msg`
    pub fn format_say(&self, prefix: Option<&str>, msg: &str) -> String {
        match prefix {
            Some(p) => format!("==> {}: {}", self.dim.apply_to(p), self.say.apply_to(msg)),
            None => format!("==> {}", self.say.apply_to(msg)),
        }
    }

    /// `    prefix: msg`
    pub fn format_message(&self, prefix: Option<&str>, msg: &str) -> String {
        match prefix {
            Some(p) => format!("    {}: {}", self.dim.apply_to(p), self.message.apply_to(msg)),
            None => format!("    {}", self.message.apply_to(msg)),
        }
    }

    /// Warning line.
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Error line.
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}
