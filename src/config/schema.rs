//! Build file schema.
//!
//! These structs map one-to-one onto the YAML build file format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::template::IDENTITY_WRAPPER;
use crate::wait::PollingConfig;

/// Root of a `bakery.yml` build file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build name, available as `${build_name}` and used as the UI prefix.
    pub name: String,

    /// Id reported by the produced artifact.
    #[serde(default = "default_builder_id")]
    pub builder_id: String,

    /// Template every local command is wrapped in, e.g. `sudo {{.Command}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_wrapper: Option<String>,

    /// Default polling for every `wait_for` step.
    pub polling: PollingSettings,

    /// Pause before every step and every cleanup.
    #[serde(skip_serializing_if = "is_false")]
    pub debug: bool,

    /// Literal values to redact from all output.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    /// Extra environment variable names whose values are redacted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secret_env: Vec<String>,

    /// Environment for every local command.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Commands run by `provision` steps; may use `{{.Key}}` generated data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provisioners: Vec<String>,

    /// Steps, run in order.
    pub steps: Vec<StepConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            builder_id: default_builder_id(),
            command_wrapper: None,
            polling: PollingSettings::default(),
            debug: false,
            secrets: Vec::new(),
            secret_env: Vec::new(),
            env: HashMap::new(),
            provisioners: Vec::new(),
            steps: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// The build name, or `"bakery"` when none is set.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "bakery"
        } else {
            &self.name
        }
    }

    /// Polling settings for the whole build.
    pub fn polling_config(&self) -> PollingConfig {
        self.polling.apply(PollingConfig::default())
    }

    /// Whether a chroot provision runs with no command wrapper to elevate it.
    pub fn needs_root(&self) -> bool {
        let chroots = self
            .steps
            .iter()
            .any(|s| matches!(s, StepConfig::Provision(p) if p.chroot.is_some()));
        let wrapped = self
            .command_wrapper
            .as_deref()
            .is_some_and(|w| !w.trim().is_empty() && w.trim() != IDENTITY_WRAPPER);
        chroots && !wrapped
    }
}

fn default_builder_id() -> String {
    "bakery.shell".to_string()
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Polling settings as written in the build file.
///
/// Unset fields keep the value they override. A `timeout_seconds` of 0
/// disables the timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Seconds between refreshes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,

    /// Maximum number of refreshes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Seconds before the wait gives up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl PollingSettings {
    /// Layer these settings over `base`.
    pub fn apply(&self, base: PollingConfig) -> PollingConfig {
        let mut config = base.overridden_by(
            self.delay_seconds.map(Duration::from_secs),
            self.max_attempts,
            None,
        );
        if let Some(secs) = self.timeout_seconds {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config
    }
}

/// One entry of `steps`, selected by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Run local commands, optionally capturing output.
    Shell(ShellStepConfig),
    /// Poll a local command until it prints a target state.
    WaitFor(WaitForStepConfig),
    /// Run a fixed list of commands (mount hooks and the like).
    LocalCommands(LocalCommandsStepConfig),
    /// Run the build's provisioners.
    Provision(ProvisionStepConfig),
    /// Record a produced image for the artifact.
    RecordImage(RecordImageStepConfig),
}

impl StepConfig {
    /// The step's display name.
    pub fn name(&self) -> &str {
        match self {
            StepConfig::Shell(s) => &s.name,
            StepConfig::WaitFor(s) => &s.name,
            StepConfig::LocalCommands(s) => &s.label,
            StepConfig::Provision(_) => "provision",
            StepConfig::RecordImage(_) => "record_image",
        }
    }

    /// The `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Shell(_) => "shell",
            StepConfig::WaitFor(_) => "wait_for",
            StepConfig::LocalCommands(_) => "local_commands",
            StepConfig::Provision(_) => "provision",
            StepConfig::RecordImage(_) => "record_image",
        }
    }

    /// State key this step writes, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            StepConfig::Shell(s) => s.output.as_deref(),
            StepConfig::WaitFor(s) => s.output.as_deref(),
            _ => None,
        }
    }

    /// Every string that is interpolated before use.
    pub fn interpolated_fields(&self) -> Vec<&str> {
        match self {
            StepConfig::Shell(s) => s.run.iter().chain(&s.cleanup).map(String::as_str).collect(),
            StepConfig::WaitFor(s) => vec![s.refresh.as_str()],
            StepConfig::LocalCommands(s) => s.commands.iter().map(String::as_str).collect(),
            StepConfig::Provision(s) => s.chroot.iter().map(String::as_str).collect(),
            StepConfig::RecordImage(s) => vec![s.region.as_str(), s.image_id.as_str()],
        }
    }
}

/// `type: shell`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellStepConfig {
    /// Step name.
    pub name: String,

    /// Commands run in order; the first failure halts the build.
    pub run: Vec<String>,

    /// Commands run during cleanup if `run` started.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<String>,

    /// State key for the trimmed stdout of the last `run` command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Environment added on top of the build's `env`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Per-command timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// `type: wait_for`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitForStepConfig {
    /// What is being waited for.
    pub name: String,

    /// Command whose first stdout line is the current state.
    pub refresh: String,

    /// States that mean "keep waiting".
    pub pending: Vec<String>,

    /// The state that ends the wait.
    pub target: String,

    /// State key for the final stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Overrides of the build's polling settings.
    pub polling: PollingSettings,

    /// Environment added on top of the build's `env`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// `type: local_commands`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalCommandsStepConfig {
    /// Shown as "Running <label>...".
    pub label: String,

    /// Commands run in order.
    pub commands: Vec<String>,
}

/// `type: provision`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionStepConfig {
    /// Root filesystem to provision with `chroot`; local when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroot: Option<String>,
}

/// `type: record_image`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordImageStepConfig {
    /// Region the image lives in.
    pub region: String,

    /// The image id, usually `${some_output}`.
    pub image_id: String,
}
