//! Turning a build file into a run of the multistep runner.
//!
//! [`Build`] owns everything one invocation needs: the parsed build file,
//! the UI, the provisioning hook and command line variables. [`Build::run`]
//! seeds a fresh [`StateBag`], runs the steps and turns the bag into an
//! [`ImageArtifact`] when the build recorded any images.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::artifact::{ImageArtifact, ImageDestroyer};
use crate::config::{BuildConfig, StepConfig};
use crate::error::Result;
use crate::multistep::{
    BuildOutcome, CancelToken, PauseLocation, Runner, StateBag, Step, STATE_BUILD_NAME,
    STATE_CONFIG, STATE_GENERATED_DATA, STATE_HOOK, STATE_IMAGES, STATE_INTERPOLATION, STATE_UI,
    STATE_WRAPPED_COMMAND,
};
use crate::secrets::{OutputMasker, SecretMatcher};
use crate::steps::{
    GeneratedData, ImageMap, ScriptHook, SharedHook, StepLocalCommands, StepProvision,
    StepRecordImage, StepShell, StepWaitFor,
};
use crate::template::{CommandWrapper, InterpolationContext};
use crate::ui::SharedUi;

/// Debug pause callback as handed to [`Build::with_pause`].
pub type Pause = Box<dyn FnMut(PauseLocation, &str, &CancelToken) + Send>;

/// One build of one build file.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use std::sync::Arc;
/// use bakery::build::{script_hook, Build};
/// use bakery::config::parse_config;
/// use bakery::multistep::CancelToken;
/// use bakery::ui::MockUI;
///
/// let config = parse_config(
///     "name: demo\nsteps:\n  - type: shell\n    name: hello\n    run: [\"echo hi\"]\n",
///     Path::new("bakery.yml"),
/// )
/// .unwrap();
///
/// let hook = Arc::new(script_hook(&config));
/// let build = Build::from_config(config, Arc::new(MockUI::new()), hook);
///
/// // No record_image step, so there is no artifact.
/// assert!(build.run(&CancelToken::new()).unwrap().is_none());
/// ```
pub struct Build {
    config: BuildConfig,
    ui: SharedUi,
    hook: SharedHook,
    vars: HashMap<String, String>,
    debug: bool,
    pause: Option<Pause>,
    destroyer: Option<Arc<dyn ImageDestroyer>>,
}

impl Build {
    /// Create a build; debug pausing follows the build file's `debug` flag.
    pub fn from_config(config: BuildConfig, ui: SharedUi, hook: SharedHook) -> Self {
        let debug = config.debug;
        Self {
            config,
            ui,
            hook,
            vars: HashMap::new(),
            debug,
            pause: None,
            destroyer: None,
        }
    }

    /// Command line variables, taking precedence over everything else.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Force debug pausing on.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = self.debug || enabled;
        self
    }

    /// Replace the console pause used in debug mode.
    pub fn with_pause(
        mut self,
        pause: impl FnMut(PauseLocation, &str, &CancelToken) + Send + 'static,
    ) -> Self {
        self.pause = Some(Box::new(pause));
        self
    }

    /// Let the artifact destroy the images it describes.
    pub fn with_destroyer(mut self, destroyer: Arc<dyn ImageDestroyer>) -> Self {
        self.destroyer = Some(destroyer);
        self
    }

    /// The build file.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Whether the runner will pause between steps.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Context `${}` references resolve against, apart from the state bag.
    pub fn interpolation_context(&self) -> InterpolationContext {
        interpolation_context(&self.config, &self.vars)
    }

    /// The steps of this build, in run order.
    pub fn steps(&self) -> Vec<Box<dyn Step>> {
        self.config
            .steps
            .iter()
            .map(|step| self.step(step))
            .collect()
    }

    fn step(&self, step: &StepConfig) -> Box<dyn Step> {
        let config = &self.config;
        match step {
            StepConfig::Shell(s) => {
                let mut shell = StepShell::new(&s.name)
                    .run_commands(s.run.iter().cloned())
                    .cleanup_commands(s.cleanup.iter().cloned())
                    .env(merged_env(&config.env, &s.env))
                    .timeout(s.timeout_seconds.map(Duration::from_secs));
                if let Some(output) = &s.output {
                    shell = shell.output(output);
                }
                Box::new(shell)
            }
            StepConfig::WaitFor(s) => {
                let mut wait = StepWaitFor::new(
                    &s.name,
                    &s.refresh,
                    s.pending.iter().cloned(),
                    &s.target,
                )
                .polling(s.polling.apply(config.polling_config()))
                .env(merged_env(&config.env, &s.env));
                if let Some(output) = &s.output {
                    wait = wait.output(output);
                }
                Box::new(wait)
            }
            StepConfig::LocalCommands(s) => Box::new(
                StepLocalCommands::new(&s.label, s.commands.iter().cloned())
                    .env(config.env.clone()),
            ),
            StepConfig::Provision(s) => {
                let mut provision = StepProvision::new();
                if let Some(root) = &s.chroot {
                    provision = provision.chroot(root);
                }
                Box::new(provision)
            }
            StepConfig::RecordImage(s) => Box::new(StepRecordImage::new(&s.region, &s.image_id)),
        }
    }

    /// Put everything the steps read into a fresh bag.
    fn seed(&self) -> Result<StateBag> {
        let wrapper = match &self.config.command_wrapper {
            Some(template) => CommandWrapper::new(template)?,
            None => CommandWrapper::default(),
        };

        let mut generated = GeneratedData::new();
        generated.insert("BuildName".to_string(), self.config.display_name().to_string());
        generated.insert("BuilderId".to_string(), self.config.builder_id.clone());

        let state = StateBag::new();
        state.put(STATE_CONFIG, self.config.clone());
        state.put(STATE_UI, self.ui.clone());
        state.put(STATE_HOOK, self.hook.clone());
        state.put(STATE_WRAPPED_COMMAND, wrapper);
        state.put(STATE_BUILD_NAME, self.config.display_name().to_string());
        state.put(STATE_INTERPOLATION, self.interpolation_context());
        state.put(STATE_GENERATED_DATA, generated);
        Ok(state)
    }

    /// Run the build.
    ///
    /// Returns `Ok(None)` when the build succeeded without recording an
    /// image, `Err(BuildFailed)` when a step failed and `Err(Cancelled)` when
    /// the token fired first.
    pub fn run(self, cancel: &CancelToken) -> Result<Option<ImageArtifact>> {
        let state = self.seed()?;
        let steps = self.steps();
        let started = Instant::now();
        info!(
            "Starting build '{}' with {} steps",
            self.config.display_name(),
            steps.len()
        );

        let mut runner = Runner::new(steps).with_ui(self.ui.clone());
        if self.debug {
            runner = match self.pause {
                Some(pause) => runner.debug(pause),
                None => runner.debug(console_pause(self.ui.clone())),
            };
        }

        let report = runner.run(cancel, &state);
        debug!(
            "Build finished as {} in {:?} ({} ran, {} cleaned)",
            report.state,
            started.elapsed(),
            report.ran.len(),
            report.cleaned.len()
        );
        BuildOutcome::from_state(&state, report.state).into_result()?;

        let images: ImageMap = state.get_ok(STATE_IMAGES).unwrap_or_default();
        if images.is_empty() {
            return Ok(None);
        }
        let generated: GeneratedData = state.get_ok(STATE_GENERATED_DATA).unwrap_or_default();
        let mut artifact =
            ImageArtifact::new(&self.config.builder_id, images).with_generated_data(generated);
        if let Some(destroyer) = self.destroyer {
            artifact = artifact.with_destroyer(destroyer);
        }
        Ok(Some(artifact))
    }
}

fn merged_env(
    base: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut env = base.clone();
    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Variables, environment and builtins for a build of `config`.
///
/// The environment is the process environment overlaid with the build
/// file's `env`.
pub fn interpolation_context(
    config: &BuildConfig,
    vars: &HashMap<String, String>,
) -> InterpolationContext {
    let env = std::env::vars()
        .chain(config.env.clone())
        .collect::<HashMap<_, _>>();
    InterpolationContext::new()
        .with_build_name(config.display_name())
        .with_env(env)
        .with_vars(vars.clone())
}

/// The provisioning hook described by the build file.
pub fn script_hook(config: &BuildConfig) -> ScriptHook {
    ScriptHook::new(config.provisioners.iter().cloned()).with_env(config.env.clone())
}

/// Redaction for a build: `secrets` values, plus the values of every
/// secret-looking variable in the process environment and the build's `env`.
pub fn output_masker(config: &BuildConfig) -> OutputMasker {
    let matcher = SecretMatcher::with_builtins_and_custom(&config.secret_env);
    let vars = std::env::vars().chain(config.env.clone());
    let mut masker = OutputMasker::from_env(&matcher, vars);
    masker.add_secrets(config.secrets.iter().cloned());
    masker
}

/// Debug pause that waits for enter on stdin.
///
/// The wait ends early when `cancel` fires; the runner notices the
/// cancellation itself.
pub fn console_pause(ui: SharedUi) -> impl FnMut(PauseLocation, &str, &CancelToken) + Send {
    move |location: PauseLocation, name: &str, cancel: &CancelToken| {
        ui.say(&format!(
            "Pausing before {} of step '{}'. Press enter to continue.",
            location, name
        ));

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            let _ = tx.send(());
        });

        loop {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
                Err(mpsc::RecvTimeoutError::Timeout) if cancel.is_cancelled() => return,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }
    }
}
