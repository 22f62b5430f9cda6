//! Build file validation rules.
//!
//! Every rule runs and every problem is reported, so a build file can be
//! fixed in one pass:
//! - the command wrapper and provisioner templates must parse
//! - there must be at least one step, and each step needs its fields
//! - output keys must be unique and must not shadow reserved state keys
//! - `${}` references must be set by an earlier step, the environment, or a
//!   builtin (see [`check_references`])

use crate::config::schema::{BuildConfig, StepConfig};
use crate::error::{BakeryError, Result};
use crate::multistep::{
    STATE_BUILD_NAME, STATE_CANCELLED, STATE_COMMUNICATOR, STATE_CONFIG, STATE_ERROR,
    STATE_GENERATED_DATA, STATE_HALTED, STATE_HOOK, STATE_IMAGES, STATE_INTERPOLATION, STATE_UI,
    STATE_WRAPPED_COMMAND,
};
use crate::template::{
    extract_variables, parse_template, unterminated_reference, CommandWrapper,
    InterpolationContext,
};
use std::collections::HashSet;

/// Keys the build itself owns in the state bag.
const RESERVED_KEYS: &[&str] = &[
    STATE_ERROR,
    STATE_CANCELLED,
    STATE_HALTED,
    STATE_UI,
    STATE_HOOK,
    STATE_CONFIG,
    STATE_WRAPPED_COMMAND,
    STATE_COMMUNICATOR,
    STATE_IMAGES,
    STATE_GENERATED_DATA,
    STATE_BUILD_NAME,
    STATE_INTERPOLATION,
];

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step name if error is step-specific
    pub step: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, step: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            step: step.map(str::to_string),
        }
    }
}

/// Validate a build file's structure and return all errors.
pub fn validate_config(config: &BuildConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_templates(config));
    errors.extend(validate_steps(config));
    errors.extend(validate_outputs(config));

    errors
}

fn validate_templates(config: &BuildConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(wrapper) = &config.command_wrapper {
        if let Err(e) = CommandWrapper::new(wrapper) {
            errors.push(ValidationError::new(
                "invalid-command-wrapper",
                e.to_string(),
                None,
            ));
        }
    }

    for provisioner in &config.provisioners {
        if let Err(e) = parse_template(provisioner) {
            errors.push(ValidationError::new(
                "invalid-provisioner",
                e.to_string(),
                None,
            ));
        }
    }

    errors
}

fn validate_steps(config: &BuildConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.steps.is_empty() {
        errors.push(ValidationError::new(
            "no-steps",
            "Build has no steps".to_string(),
            None,
        ));
    }

    for (index, step) in config.steps.iter().enumerate() {
        let position = index + 1;
        let missing = |rule: &str, ok: bool, what: &str| {
            (!ok).then(|| {
                ValidationError::new(
                    rule,
                    format!("Step {} ({}) must have {}", position, step.kind(), what),
                    Some(step.name()),
                )
            })
        };

        match step {
            StepConfig::Shell(s) => {
                errors.extend(missing("missing-name", !s.name.trim().is_empty(), "a 'name'"));
                errors.extend(missing(
                    "missing-command",
                    !s.run.is_empty(),
                    "at least one 'run' command",
                ));
            }
            StepConfig::WaitFor(s) => {
                errors.extend(missing("missing-name", !s.name.trim().is_empty(), "a 'name'"));
                errors.extend(missing(
                    "missing-command",
                    !s.refresh.trim().is_empty(),
                    "a 'refresh' command",
                ));
                errors.extend(missing(
                    "missing-target",
                    !s.target.trim().is_empty(),
                    "a 'target' state",
                ));
                if s.pending.contains(&s.target) {
                    errors.push(ValidationError::new(
                        "target-is-pending",
                        format!(
                            "Step '{}' lists its target '{}' as a pending state",
                            s.name, s.target
                        ),
                        Some(s.name.as_str()),
                    ));
                }
            }
            StepConfig::LocalCommands(s) => {
                errors.extend(missing("missing-name", !s.label.trim().is_empty(), "a 'label'"));
                errors.extend(missing(
                    "missing-command",
                    !s.commands.is_empty(),
                    "at least one command",
                ));
            }
            StepConfig::Provision(_) => {}
            StepConfig::RecordImage(s) => {
                errors.extend(missing("missing-region", !s.region.trim().is_empty(), "a 'region'"));
                errors.extend(missing(
                    "missing-image-id",
                    !s.image_id.trim().is_empty(),
                    "an 'image_id'",
                ));
            }
        }
    }

    errors
}

fn validate_outputs(config: &BuildConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for step in &config.steps {
        let Some(output) = step.output() else {
            continue;
        };
        if RESERVED_KEYS.contains(&output) {
            errors.push(ValidationError::new(
                "reserved-output",
                format!(
                    "Step '{}' writes output to reserved key '{}'",
                    step.name(),
                    output
                ),
                Some(step.name()),
            ));
        } else if !seen.insert(output) {
            errors.push(ValidationError::new(
                "duplicate-output",
                format!(
                    "Step '{}' writes output '{}' which an earlier step already writes",
                    step.name(),
                    output
                ),
                Some(step.name()),
            ));
        }
    }

    errors
}

/// Check every `${}` reference against what will exist when it is used.
///
/// A reference resolves if `context` knows it (variables, environment,
/// builtins), the build file's `env` sets it, or an earlier step writes it
/// as output. A shell step's cleanup commands may also use its own output.
pub fn check_references(
    config: &BuildConfig,
    context: &InterpolationContext,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut available: HashSet<&str> = config.env.keys().map(String::as_str).collect();

    let mut check = |step: &StepConfig, field: &str, available: &HashSet<&str>| {
        if let Some(text) = unterminated_reference(field) {
            errors.push(ValidationError::new(
                "unterminated-reference",
                format!("Step '{}' has '{}' with no closing '}}'", step.name(), text),
                Some(step.name()),
            ));
        }
        let mut names: Vec<_> = extract_variables(field).into_iter().collect();
        names.sort();
        for name in names {
            if !available.contains(name.as_str()) && !context.is_static(&name) {
                errors.push(ValidationError::new(
                    "unresolved-reference",
                    format!(
                        "Step '{}' references '${{{}}}' before anything sets it",
                        step.name(),
                        name
                    ),
                    Some(step.name()),
                ));
            }
        }
    };

    for step in &config.steps {
        match step {
            StepConfig::Shell(s) => {
                for command in &s.run {
                    check(step, command, &available);
                }
                if let Some(output) = &s.output {
                    available.insert(output.as_str());
                }
                for command in &s.cleanup {
                    check(step, command, &available);
                }
            }
            _ => {
                for field in step.interpolated_fields() {
                    check(step, field, &available);
                }
                if let Some(output) = step.output() {
                    available.insert(output);
                }
            }
        }
    }

    errors
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &BuildConfig) -> Result<()> {
    into_result(validate_config(config))
}

/// Turn a list of problems into `ConfigValidationError`.
pub fn into_result(errors: Vec<ValidationError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(BakeryError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
