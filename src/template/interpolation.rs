//! `${name}` references in build-file commands.
//!
//! # Syntax
//!
//! - `${name}` - replaced with the value of `name`
//! - `$${escaped}` - produces literal `${escaped}` in output
//!
//! # Example
//!
//! ```yaml
//! run:
//!   - "mount /dev/${device} /mnt/${build_name}"
//! ```

use std::collections::{HashMap, HashSet};

use crate::error::{BakeryError, Result};
use crate::multistep::StateBag;

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Variable reference: ${name}
    Variable(String),
    /// A `${` with no closing brace, kept as written.
    Unterminated(String),
}

/// Parse a string containing `${var}` references.
pub fn parse_interpolation(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                if chars.peek() == Some(&'{') {
                    // $${...} -> literal ${...}
                    chars.next();
                    current_literal.push_str("${");
                    for c in chars.by_ref() {
                        current_literal.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    current_literal.push('$');
                }
            }
            Some('{') => {
                chars.next();

                let mut var_name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    var_name.push(c);
                }

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }
                if closed {
                    segments.push(Segment::Variable(var_name.trim().to_string()));
                } else {
                    segments.push(Segment::Unterminated(format!("${{{}", var_name)));
                }
            }
            _ => current_literal.push(c),
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Unique variable names referenced by `input`.
pub fn extract_variables(input: &str) -> HashSet<String> {
    parse_interpolation(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Variable(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// The first `${` in `input` that is never closed, as written.
pub fn unterminated_reference(input: &str) -> Option<String> {
    parse_interpolation(input).into_iter().find_map(|seg| match seg {
        Segment::Unterminated(text) => Some(text),
        _ => None,
    })
}

/// Check if a string contains any `${}` reference.
pub fn has_interpolation(input: &str) -> bool {
    parse_interpolation(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Variable(_)))
}

/// Values a `${name}` can resolve to.
///
/// Resolution order:
/// 1. `--var` values given on the command line
/// 2. string values in the state bag (written by earlier steps)
/// 3. environment variables (process env overlaid with the build file's `env`)
/// 4. builtins: `build_name`, `timestamp`, `bakery_version`
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    /// Command line variables.
    pub vars: HashMap<String, String>,

    /// Environment variables.
    pub env: HashMap<String, String>,

    /// Built-in variables.
    pub builtins: HashMap<String, String>,
}

impl InterpolationContext {
    /// Create a context with `bakery_version` and a `timestamp` fixed now.
    pub fn new() -> Self {
        let mut builtins = HashMap::new();
        builtins.insert(
            "bakery_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        builtins.insert(
            "timestamp".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );

        Self {
            builtins,
            ..Default::default()
        }
    }

    /// Set the `build_name` builtin.
    pub fn with_build_name(mut self, name: &str) -> Self {
        self.builtins
            .insert("build_name".to_string(), name.to_string());
        self
    }

    /// Set the environment.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set command line variables.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Resolve a name, consulting `state` after command line variables.
    pub fn resolve(&self, name: &str, state: Option<&StateBag>) -> Option<String> {
        if let Some(v) = self.vars.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = state.and_then(|s| s.get_display(name)) {
            return Some(v);
        }
        self.env
            .get(name)
            .or_else(|| self.builtins.get(name))
            .cloned()
    }

    /// Whether `name` can be resolved without a state bag.
    pub fn is_static(&self, name: &str) -> bool {
        self.resolve(name, None).is_some()
    }
}

/// Resolve every reference in `input`.
///
/// # Errors
///
/// - `UnresolvedVariable` for the first name with no value
/// - `Template` for a `${` with no closing brace
pub fn resolve_string(
    input: &str,
    context: &InterpolationContext,
    state: Option<&StateBag>,
) -> Result<String> {
    let mut result = String::new();

    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value = context
                    .resolve(&name, state)
                    .ok_or(BakeryError::UnresolvedVariable { name })?;
                result.push_str(&value);
            }
            Segment::Unterminated(text) => {
                return Err(BakeryError::Template {
                    template: input.to_string(),
                    message: format!("'{}' is missing its closing '}}'", text),
                });
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InterpolationContext {
        let mut env = HashMap::new();
        env.insert("AWS_REGION".to_string(), "us-east-1".to_string());
        env.insert("device".to_string(), "from-env".to_string());
        InterpolationContext::new()
            .with_build_name("base-image")
            .with_env(env)
    }

    #[test]
    fn parse_literal_only() {
        assert_eq!(
            parse_interpolation("hello world"),
            vec![Segment::Literal("hello world".to_string())]
        );
    }

    #[test]
    fn parse_variable_with_surrounding_text() {
        assert_eq!(
            parse_interpolation("mount /dev/${device} /mnt"),
            vec![
                Segment::Literal("mount /dev/".to_string()),
                Segment::Variable("device".to_string()),
                Segment::Literal(" /mnt".to_string()),
            ]
        );
    }

    #[test]
    fn parse_trims_variable_names() {
        assert_eq!(
            parse_interpolation("${ device }"),
            vec![Segment::Variable("device".to_string())]
        );
    }

    #[test]
    fn parse_escaped_reference() {
        assert_eq!(
            parse_interpolation("echo $${HOME}"),
            vec![Segment::Literal("echo ${HOME}".to_string())]
        );
    }

    #[test]
    fn parse_lone_dollar_is_literal() {
        assert_eq!(
            parse_interpolation("cost $5 and $$"),
            vec![Segment::Literal("cost $5 and $".to_string())]
        );
    }

    #[test]
    fn parse_unterminated_reference_keeps_the_text() {
        assert_eq!(
            parse_interpolation("mount ${device /mnt"),
            vec![
                Segment::Literal("mount ".to_string()),
                Segment::Unterminated("${device /mnt".to_string()),
            ]
        );
        assert!(!has_interpolation("mount ${device /mnt"));
        assert_eq!(
            unterminated_reference("echo ${a} ${b"),
            Some("${b".to_string())
        );
        assert_eq!(unterminated_reference("echo ${a}"), None);
    }

    #[test]
    fn unterminated_reference_does_not_resolve() {
        let err = resolve_string("/dev/${device", &ctx(), None).unwrap_err();
        assert!(matches!(err, BakeryError::Template { ref message, .. } if message.contains("${device")));
    }

    #[test]
    fn extract_variables_is_unique() {
        let vars = extract_variables("${a} ${b} ${a}");
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("a"));
        assert!(vars.contains("b"));
    }

    #[test]
    fn has_interpolation_ignores_escapes() {
        assert!(has_interpolation("${a}"));
        assert!(!has_interpolation("$${a}"));
    }

    #[test]
    fn resolves_builtins_and_env() {
        let out = resolve_string("${build_name} in ${AWS_REGION}", &ctx(), None).unwrap();
        assert_eq!(out, "base-image in us-east-1");
    }

    #[test]
    fn state_wins_over_env() {
        let state = StateBag::new();
        state.put("device", "xvdf".to_string());
        let out = resolve_string("/dev/${device}", &ctx(), Some(&state)).unwrap();
        assert_eq!(out, "/dev/xvdf");
    }

    #[test]
    fn vars_win_over_state() {
        let mut vars = HashMap::new();
        vars.insert("device".to_string(), "xvdg".to_string());
        let context = ctx().with_vars(vars);
        let state = StateBag::new();
        state.put("device", "xvdf".to_string());

        let out = resolve_string("/dev/${device}", &context, Some(&state)).unwrap();
        assert_eq!(out, "/dev/xvdg");
    }

    #[test]
    fn non_string_state_values_are_displayed() {
        let state = StateBag::new();
        state.put("size", 8_i64);
        let out = resolve_string("--size ${size}", &ctx(), Some(&state)).unwrap();
        assert_eq!(out, "--size 8");
    }

    #[test]
    fn unresolved_variable_is_an_error() {
        let err = resolve_string("${volume_id}", &ctx(), None).unwrap_err();
        assert!(matches!(err, BakeryError::UnresolvedVariable { ref name } if name == "volume_id"));
    }

    #[test]
    fn timestamp_builtin_is_numeric() {
        let ts = ctx().resolve("timestamp", None).unwrap();
        assert!(ts.parse::<i64>().is_ok());
    }

    #[test]
    fn is_static_ignores_state() {
        assert!(ctx().is_static("build_name"));
        assert!(!ctx().is_static("volume_id"));
    }
}
