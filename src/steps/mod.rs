//! Provider-neutral steps.
//!
//! - [`StepShell`] - run build-file commands, capture output into the bag
//! - [`StepLocalCommands`] - run a fixed list of hook commands
//! - [`StepWaitFor`] - poll a local command until it reports a target state
//! - [`StepProvision`] - hand control to the provisioning [`Hook`]
//! - [`StepRecordImage`] - record a produced image for the artifact
//! - [`ChrootCommunicator`] - run provisioner commands inside a chroot
//!
//! Every command that runs locally goes through the same path: `${}`
//! references are resolved, the result is wrapped by the build's
//! [`CommandWrapper`], and the wrapped command runs under `/bin/sh -c` with
//! the build's cancel token.

pub mod communicator;
pub mod local_commands;
pub mod provision;
pub mod record_image;
pub mod shell_step;
pub mod wait_step;

use std::collections::HashMap;
use std::time::Duration;

pub use communicator::{ChrootCommunicator, Communicator, SharedCommunicator};
pub use local_commands::StepLocalCommands;
pub use provision::{GeneratedData, Hook, ScriptHook, SharedHook, StepProvision, HOOK_PROVISION};
pub use record_image::{ImageMap, StepRecordImage};
pub use shell_step::StepShell;
pub use wait_step::StepWaitFor;

use crate::error::{BakeryError, Result};
use crate::multistep::{
    halt_with, CancelToken, StateBag, StepAction, STATE_INTERPOLATION, STATE_WRAPPED_COMMAND,
};
use crate::shell::{self, CommandOptions, CommandResult, OutputLine};
use crate::template::{resolve_string, CommandWrapper, InterpolationContext};
use crate::wait::WaitError;

/// How a local command is run from inside a step.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalCommand<'a> {
    pub env: Option<&'a HashMap<String, String>>,
    pub timeout: Option<Duration>,
    /// `None` runs to completion even after cancellation (used by cleanup).
    pub cancel: Option<&'a CancelToken>,
}

/// Resolve `${}` references in `command` against the bag's context.
pub(crate) fn interpolate(command: &str, state: &StateBag) -> Result<String> {
    let context: InterpolationContext = state.get_ok(STATE_INTERPOLATION).unwrap_or_default();
    resolve_string(command, &context, Some(state))
}

/// Interpolate, wrap and run `command`.
///
/// Output is streamed to the UI as detail lines in verbose mode.
pub(crate) fn run_local(
    command: &str,
    state: &StateBag,
    how: LocalCommand<'_>,
) -> Result<(String, CommandResult)> {
    let resolved = interpolate(command, state)?;
    let wrapper: CommandWrapper = state.get_ok(STATE_WRAPPED_COMMAND).unwrap_or_default();
    let wrapped = wrapper.wrap(&resolved)?;

    let options = CommandOptions {
        env: how.env.cloned().unwrap_or_default(),
        timeout: how.timeout,
        cancel: how.cancel.cloned(),
        ..Default::default()
    };

    let ui = state.ui();
    let result = match &ui {
        Some(ui) if ui.output_mode().shows_command_output() => {
            let stream = |line: OutputLine| match line {
                OutputLine::Stdout(l) | OutputLine::Stderr(l) => ui.message(&l),
            };
            shell::execute_streaming(&wrapped, &options, &stream)?
        }
        _ => shell::execute(&wrapped, &options)?,
    };

    Ok((wrapped, result))
}

/// Describe a failed command, with the tail of its stderr.
pub(crate) fn describe_failure(command: &str, result: &CommandResult) -> String {
    let code = result
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        format!("Command '{}' exited with {}", command, code)
    } else {
        format!("Command '{}' exited with {}: {}", command, code, stderr)
    }
}

/// Whether `err` means the build was cancelled rather than failed.
pub(crate) fn is_cancellation(err: &BakeryError) -> bool {
    match err {
        BakeryError::Cancelled => true,
        BakeryError::Wait(WaitError::Interrupted { .. }) => true,
        BakeryError::Wait(WaitError::Refresh(inner)) => is_cancellation(inner),
        _ => false,
    }
}

/// Halt: record `err` as a failure, unless it is a cancellation.
///
/// A cancelled step halts without an error so the build reports
/// cancellation instead of failure.
pub(crate) fn fail(state: &StateBag, err: BakeryError) -> StepAction {
    if is_cancellation(&err) {
        StepAction::Halt
    } else {
        halt_with(state, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_local_applies_wrapper_and_interpolation() {
        let state = StateBag::new();
        state.put("device", "xvdf".to_string());
        state.put(
            STATE_WRAPPED_COMMAND,
            CommandWrapper::new("echo wrapped: {{.Command}}").unwrap(),
        );

        let (wrapped, result) =
            run_local("mount /dev/${device}", &state, LocalCommand::default()).unwrap();

        assert_eq!(wrapped, "echo wrapped: mount /dev/xvdf");
        assert_eq!(result.stdout.trim(), "wrapped: mount /dev/xvdf");
    }

    #[test]
    fn run_local_without_wrapper_is_identity() {
        let state = StateBag::new();
        let (wrapped, _) = run_local("true", &state, LocalCommand::default()).unwrap();
        assert_eq!(wrapped, "true");
    }

    #[test]
    fn run_local_fails_on_unresolved_reference() {
        let state = StateBag::new();
        let err = run_local("echo ${missing}", &state, LocalCommand::default()).unwrap_err();
        assert!(matches!(err, BakeryError::UnresolvedVariable { .. }));
    }

    #[test]
    fn cancellation_halts_without_error() {
        let state = StateBag::new();
        assert_eq!(fail(&state, BakeryError::Cancelled), StepAction::Halt);
        assert!(state.error().is_none());

        let interrupted = BakeryError::Wait(WaitError::Interrupted {
            target: "available".into(),
        });
        assert_eq!(fail(&state, interrupted), StepAction::Halt);

        let killed_refresh = BakeryError::Wait(WaitError::Refresh(Box::new(BakeryError::Cancelled)));
        assert_eq!(fail(&state, killed_refresh), StepAction::Halt);
        assert!(state.error().is_none());
    }

    #[test]
    fn failure_is_recorded() {
        let state = StateBag::new();
        let err = BakeryError::CommandFailed {
            command: "mount".into(),
            code: Some(32),
        };
        assert_eq!(fail(&state, err), StepAction::Halt);
        assert!(state.error().unwrap().message.contains("mount"));
    }

    #[test]
    fn describe_failure_includes_stderr() {
        let result = CommandResult::failure(
            Some(32),
            String::new(),
            "mount: special device does not exist\n".into(),
            Duration::ZERO,
        );
        assert_eq!(
            describe_failure("mount /dev/xvdf /mnt", &result),
            "Command 'mount /dev/xvdf /mnt' exited with 32: mount: special device does not exist"
        );
    }
}
