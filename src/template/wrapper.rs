//! `{{.Field}}` templates and the local command wrapper.
//!
//! Build files use Go-style placeholders for the handful of values a builder
//! fills in itself: `{{.Command}}` in `command_wrapper`, `{{.Device}}` in a
//! mount path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BakeryError, Result};

/// Field placeholder inside `{{ }}`: a dot followed by an identifier.
static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.([A-Za-z_][A-Za-z0-9_]*)$").unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

/// Template used when no wrapper is configured.
pub const IDENTITY_WRAPPER: &str = "{{.Command}}";

/// A parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Text copied as is.
    Literal(String),
    /// A `{{.Name}}` placeholder.
    Field(String),
}

/// Values available to a template, by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateData {
    fields: BTreeMap<String, String>,
}

impl TemplateData {
    /// Create empty template data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

fn template_error(template: &str, message: impl Into<String>) -> BakeryError {
    BakeryError::Template {
        template: template.to_string(),
        message: message.into(),
    }
}

/// Parse a template into literal and field segments.
///
/// # Errors
///
/// An unclosed `{{`, or an action other than a single `.Field`.
pub fn parse_template(input: &str) -> Result<Vec<TemplateSegment>> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(TemplateSegment::Literal(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| template_error(input, "unclosed action"))?;

        let action = after_open[..close].trim();
        let field = FIELD_REGEX
            .captures(action)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| {
                if action.is_empty() {
                    template_error(input, "missing value for action")
                } else {
                    template_error(input, format!("unsupported action '{}'", action))
                }
            })?;

        segments.push(TemplateSegment::Field(field.as_str().to_string()));
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        segments.push(TemplateSegment::Literal(rest.to_string()));
    }

    Ok(segments)
}

fn render_segments(template: &str, segments: &[TemplateSegment], data: &TemplateData) -> Result<String> {
    let mut result = String::new();
    for segment in segments {
        match segment {
            TemplateSegment::Literal(text) => result.push_str(text),
            TemplateSegment::Field(name) => {
                let value = data
                    .get(name)
                    .ok_or_else(|| template_error(template, format!("can't evaluate field {}", name)))?;
                result.push_str(value);
            }
        }
    }
    Ok(result)
}

/// Render `template` with `data`.
///
/// # Example
///
/// ```
/// use bakery::template::{render, TemplateData};
///
/// let data = TemplateData::new().with("Device", "xvdf");
/// let path = render("/mnt/bakery-volumes/{{.Device}}", &data).unwrap();
/// assert_eq!(path, "/mnt/bakery-volumes/xvdf");
/// ```
pub fn render(template: &str, data: &TemplateData) -> Result<String> {
    let segments = parse_template(template)?;
    render_segments(template, &segments, data)
}

/// Wraps every locally executed command with a user template.
///
/// The template sees one field, `{{.Command}}`. With no template configured
/// the command is returned unchanged.
///
/// # Example
///
/// ```
/// use bakery::template::CommandWrapper;
///
/// let identity = CommandWrapper::default();
/// assert_eq!(identity.wrap("mount /dev/x /mnt").unwrap(), "mount /dev/x /mnt");
///
/// let sudo = CommandWrapper::new("sudo {{.Command}}").unwrap();
/// assert_eq!(sudo.wrap("ls").unwrap(), "sudo ls");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandWrapper {
    template: String,
    segments: Vec<TemplateSegment>,
}

impl CommandWrapper {
    /// Parse and check a wrapper template. An empty template is the identity.
    ///
    /// # Errors
    ///
    /// Template syntax errors, or a field other than `Command`.
    pub fn new(template: &str) -> Result<Self> {
        let template = if template.trim().is_empty() {
            IDENTITY_WRAPPER
        } else {
            template
        };

        let segments = parse_template(template)?;
        if let Some(TemplateSegment::Field(name)) = segments
            .iter()
            .find(|s| matches!(s, TemplateSegment::Field(name) if name != "Command"))
        {
            return Err(template_error(
                template,
                format!("can't evaluate field {}", name),
            ));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The template source.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Whether this wrapper leaves commands unchanged.
    pub fn is_identity(&self) -> bool {
        self.segments == [TemplateSegment::Field("Command".to_string())]
    }

    /// Wrap a literal command.
    pub fn wrap(&self, command: &str) -> Result<String> {
        let data = TemplateData::new().with("Command", command);
        render_segments(&self.template, &self.segments, &data)
    }
}

impl Default for CommandWrapper {
    fn default() -> Self {
        Self {
            template: IDENTITY_WRAPPER.to_string(),
            segments: vec![TemplateSegment::Field("Command".to_string())],
        }
    }
}

impl fmt::Display for CommandWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_only() {
        assert_eq!(
            parse_template("echo hi").unwrap(),
            vec![TemplateSegment::Literal("echo hi".into())]
        );
    }

    #[test]
    fn parse_field_with_surrounding_text() {
        assert_eq!(
            parse_template("sudo {{ .Command }} &&").unwrap(),
            vec![
                TemplateSegment::Literal("sudo ".into()),
                TemplateSegment::Field("Command".into()),
                TemplateSegment::Literal(" &&".into()),
            ]
        );
    }

    #[test]
    fn parse_empty_string() {
        assert!(parse_template("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_unclosed_action() {
        let err = parse_template("sudo {{.Command").unwrap_err();
        assert!(err.to_string().contains("unclosed action"));
    }

    #[test]
    fn parse_rejects_empty_action() {
        let err = parse_template("{{ }}").unwrap_err();
        assert!(err.to_string().contains("missing value"));
    }

    #[test]
    fn parse_rejects_functions() {
        let err = parse_template("{{ timestamp }}").unwrap_err();
        assert!(err.to_string().contains("unsupported action 'timestamp'"));
    }

    #[test]
    fn render_reports_missing_field() {
        let err = render("{{.Device}}", &TemplateData::new()).unwrap_err();
        assert!(err.to_string().contains("can't evaluate field Device"));
    }

    #[test]
    fn render_repeated_field() {
        let data = TemplateData::new().with("Device", "xvdf");
        assert_eq!(
            render("{{.Device}}-{{.Device}}", &data).unwrap(),
            "xvdf-xvdf"
        );
    }

    #[test]
    fn wrapper_defaults_to_identity() {
        let wrapper = CommandWrapper::default();
        assert!(wrapper.is_identity());
        assert_eq!(wrapper.wrap("mount /dev/x /mnt").unwrap(), "mount /dev/x /mnt");
    }

    #[test]
    fn empty_template_is_identity() {
        let wrapper = CommandWrapper::new("  ").unwrap();
        assert!(wrapper.is_identity());
        assert_eq!(wrapper.template(), IDENTITY_WRAPPER);
    }

    #[test]
    fn wrapper_substitutes_command() {
        let wrapper = CommandWrapper::new("sudo {{.Command}}").unwrap();
        assert!(!wrapper.is_identity());
        assert_eq!(wrapper.wrap("ls").unwrap(), "sudo ls");
    }

    #[test]
    fn wrapper_with_environment_prefix() {
        let wrapper = CommandWrapper::new("sudo -E env LANG=C {{.Command}}").unwrap();
        assert_eq!(
            wrapper.wrap("cp /etc/resolv.conf /mnt/etc").unwrap(),
            "sudo -E env LANG=C cp /etc/resolv.conf /mnt/etc"
        );
    }

    #[test]
    fn wrapper_rejects_unknown_field() {
        let err = CommandWrapper::new("sudo {{.Device}}").unwrap_err();
        assert!(matches!(err, BakeryError::Template { .. }));
    }

    #[test]
    fn wrapper_without_placeholder_ignores_command() {
        let wrapper = CommandWrapper::new("true").unwrap();
        assert_eq!(wrapper.wrap("rm -rf /mnt").unwrap(), "true");
    }

    #[test]
    fn wrapper_displays_template() {
        let wrapper = CommandWrapper::new("sudo {{.Command}}").unwrap();
        assert_eq!(wrapper.to_string(), "sudo {{.Command}}");
    }
}
