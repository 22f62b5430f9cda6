//! Provisioning hook and the step that calls it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::communicator::{ChrootCommunicator, Communicator, SharedCommunicator};
use super::{describe_failure, fail, interpolate};
use crate::error::{BakeryError, Result};
use crate::multistep::{
    CancelToken, StateBag, Step, StepAction, STATE_COMMUNICATOR, STATE_GENERATED_DATA, STATE_HOOK,
    STATE_UI, STATE_WRAPPED_COMMAND,
};
use crate::shell::{self, CommandOptions};
use crate::template::{render, CommandWrapper, TemplateData};
use crate::ui::{SharedUi, UserInterface};

/// Hook phase run by [`StepProvision`].
pub const HOOK_PROVISION: &str = "provision";

/// Values produced during the build (image ids, source ids) for hooks.
pub type GeneratedData = BTreeMap<String, String>;

/// Something that runs at a named point of the build, usually provisioners.
pub trait Hook: Send + Sync {
    /// Run for `phase`. Phases a hook does not know are ignored.
    fn run(
        &self,
        cancel: &CancelToken,
        phase: &str,
        ui: &dyn UserInterface,
        communicator: Option<&dyn Communicator>,
        generated_data: &GeneratedData,
    ) -> Result<()>;
}

/// A hook as stored in the state bag.
pub type SharedHook = Arc<dyn Hook>;

/// Runs provisioner commands in order.
///
/// Commands may reference generated data as `{{.Key}}`. They run through
/// the communicator when one is available, otherwise locally.
#[derive(Debug, Clone, Default)]
pub struct ScriptHook {
    commands: Vec<String>,
    env: HashMap<String, String>,
}

impl ScriptHook {
    /// Create a hook running `commands`.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        }
    }

    /// Environment for commands run locally.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Number of provisioner commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Hook for ScriptHook {
    fn run(
        &self,
        cancel: &CancelToken,
        phase: &str,
        ui: &dyn UserInterface,
        communicator: Option<&dyn Communicator>,
        generated_data: &GeneratedData,
    ) -> Result<()> {
        if phase != HOOK_PROVISION {
            return Ok(());
        }

        let data = generated_data
            .iter()
            .fold(TemplateData::new(), |data, (k, v)| data.with(k, v));

        for command in &self.commands {
            let command = render(command, &data)?;
            ui.message(&format!("Provisioning: {}", command));

            let result = match communicator {
                Some(comm) => comm.run(cancel, &command)?,
                None => {
                    let options = CommandOptions {
                        env: self.env.clone(),
                        ..CommandOptions::cancellable(cancel)
                    };
                    shell::execute(&command, &options)?
                }
            };

            for line in result.stdout.lines() {
                ui.message(line);
            }
            if !result.success {
                return Err(BakeryError::StepExecutionError {
                    step: HOOK_PROVISION.to_string(),
                    message: describe_failure(&command, &result),
                });
            }
        }
        Ok(())
    }
}

/// Calls the build's hook with [`HOOK_PROVISION`].
///
/// Reads `"hook"` and `"ui"` from the bag. With `chroot` set, a
/// [`ChrootCommunicator`] for that (interpolated) root is created and placed
/// under `"communicator"` for the hook; otherwise an existing communicator in
/// the bag is used, if any.
#[derive(Debug, Clone, Default)]
pub struct StepProvision {
    chroot: Option<String>,
    placed_communicator: bool,
}

impl StepProvision {
    /// Provision with whatever communicator is in the bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision inside a chroot at `root` (may contain `${}` references).
    pub fn chroot(mut self, root: impl Into<String>) -> Self {
        self.chroot = Some(root.into());
        self
    }

    fn communicator(&mut self, state: &StateBag) -> Result<Option<SharedCommunicator>> {
        let Some(root) = &self.chroot else {
            return Ok(state.get_ok(STATE_COMMUNICATOR));
        };

        let root = interpolate(root, state)?;
        let wrapper: CommandWrapper = state.get_ok(STATE_WRAPPED_COMMAND).unwrap_or_default();
        let comm: SharedCommunicator = Arc::new(ChrootCommunicator::new(root, wrapper));
        state.put(STATE_COMMUNICATOR, comm.clone());
        self.placed_communicator = true;
        Ok(Some(comm))
    }

    fn provision(&mut self, cancel: &CancelToken, state: &StateBag) -> Result<()> {
        let hook: SharedHook = state.get(STATE_HOOK)?;
        let ui: SharedUi = state.get(STATE_UI)?;
        let communicator = self.communicator(state)?;
        let generated_data: GeneratedData = state.get_ok(STATE_GENERATED_DATA).unwrap_or_default();

        ui.say("Provisioning with the build hook...");
        debug!(
            "Running provision hook (communicator: {:?})",
            communicator.as_ref().map(|c| format!("{:?}", c))
        );
        hook.run(
            cancel,
            HOOK_PROVISION,
            ui.as_ref(),
            communicator.as_deref(),
            &generated_data,
        )
    }
}

impl Step for StepProvision {
    fn name(&self) -> &str {
        "provision"
    }

    fn run(&mut self, cancel: &CancelToken, state: &StateBag) -> StepAction {
        match self.provision(cancel, state) {
            Ok(()) => StepAction::Continue,
            Err(err) => fail(state, err),
        }
    }

    fn cleanup(&mut self, state: &StateBag) -> Result<()> {
        if self.placed_communicator {
            state.remove(STATE_COMMUNICATOR);
            self.placed_communicator = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHook {
        calls: Mutex<Vec<(String, bool, GeneratedData)>>,
    }

    impl Hook for RecordingHook {
        fn run(
            &self,
            _cancel: &CancelToken,
            phase: &str,
            _ui: &dyn UserInterface,
            communicator: Option<&dyn Communicator>,
            generated_data: &GeneratedData,
        ) -> Result<()> {
            self.calls.lock().unwrap().push((
                phase.to_string(),
                communicator.is_some(),
                generated_data.clone(),
            ));
            Ok(())
        }
    }

    struct FailingHook;

    impl Hook for FailingHook {
        fn run(
            &self,
            _cancel: &CancelToken,
            _phase: &str,
            _ui: &dyn UserInterface,
            _communicator: Option<&dyn Communicator>,
            _generated_data: &GeneratedData,
        ) -> Result<()> {
            Err(BakeryError::StepExecutionError {
                step: "provision".into(),
                message: "yum exited with 1".into(),
            })
        }
    }

    fn state_with(hook: SharedHook) -> (StateBag, Arc<MockUI>) {
        let state = StateBag::new();
        let ui = Arc::new(MockUI::new());
        state.put(STATE_UI, ui.clone() as SharedUi);
        state.put(STATE_HOOK, hook);
        (state, ui)
    }

    #[test]
    fn calls_hook_with_provision_phase_and_generated_data() {
        let hook = Arc::new(RecordingHook::default());
        let (state, _) = state_with(hook.clone());
        let mut data = GeneratedData::new();
        data.insert("SourceImage".into(), "ami-0abc".into());
        state.put(STATE_GENERATED_DATA, data.clone());

        let mut step = StepProvision::new();
        assert_eq!(step.run(&CancelToken::new(), &state), StepAction::Continue);

        let calls = hook.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, HOOK_PROVISION);
        assert!(!calls[0].1);
        assert_eq!(calls[0].2, data);
    }

    #[test]
    fn hook_error_fails_the_step() {
        let (state, ui) = state_with(Arc::new(FailingHook));

        let mut step = StepProvision::new();
        assert_eq!(step.run(&CancelToken::new(), &state), StepAction::Halt);
        assert!(state.error().unwrap().message.contains("yum exited with 1"));
        assert!(ui.has_error("yum exited with 1"));
    }

    #[test]
    fn missing_hook_fails_the_step() {
        let state = StateBag::new();
        let mut step = StepProvision::new();
        assert_eq!(step.run(&CancelToken::new(), &state), StepAction::Halt);
        assert!(state.error().unwrap().message.contains("'hook'"));
    }

    #[test]
    fn chroot_places_and_removes_communicator() {
        let hook = Arc::new(RecordingHook::default());
        let (state, _) = state_with(hook.clone());
        state.put("mount_path", "/mnt/bakery/xvdf".to_string());

        let mut step = StepProvision::new().chroot("${mount_path}");
        step.run(&CancelToken::new(), &state);

        assert!(hook.calls.lock().unwrap()[0].1);
        assert!(state.contains(STATE_COMMUNICATOR));

        step.cleanup(&state).unwrap();
        assert!(!state.contains(STATE_COMMUNICATOR));
    }

    #[test]
    fn script_hook_ignores_other_phases() {
        let hook = ScriptHook::new(["exit 1"]);
        let ui = MockUI::new();
        hook.run(&CancelToken::new(), "cleanup", &ui, None, &GeneratedData::new())
            .unwrap();
        assert!(ui.messages().is_empty());
    }

    #[test]
    fn script_hook_renders_generated_data_and_reports_output() {
        let hook = ScriptHook::new(["echo image {{.ImageId}}"]);
        let ui = MockUI::new();
        let mut data = GeneratedData::new();
        data.insert("ImageId".into(), "ami-0123".into());

        hook.run(&CancelToken::new(), HOOK_PROVISION, &ui, None, &data)
            .unwrap();

        assert!(ui.has_message("Provisioning: echo image ami-0123"));
        assert!(ui.messages().contains(&"image ami-0123".to_string()));
    }

    #[test]
    fn script_hook_stops_at_failing_command() {
        let hook = ScriptHook::new(["exit 2", "echo never"]);
        let ui = MockUI::new();

        let err = hook
            .run(&CancelToken::new(), HOOK_PROVISION, &ui, None, &GeneratedData::new())
            .unwrap_err();

        assert!(err.to_string().contains("exited with 2"));
        assert!(!ui.has_message("never"));
    }
}
