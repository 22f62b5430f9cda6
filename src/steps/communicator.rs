//! Running provisioner commands on the machine being built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::multistep::CancelToken;
use crate::shell::{self, shell_quote, CommandOptions, CommandResult};
use crate::template::CommandWrapper;

/// Runs commands on the machine being built.
pub trait Communicator: Send + Sync + fmt::Debug {
    /// Run `command` to completion. A non-zero exit is not an error.
    fn run(&self, cancel: &CancelToken, command: &str) -> Result<CommandResult>;
}

/// A communicator as stored in the state bag.
pub type SharedCommunicator = Arc<dyn Communicator>;

/// Runs commands inside a mounted root filesystem with `chroot`.
///
/// The full `chroot <root> /bin/sh -c '<command>'` line goes through the
/// build's [`CommandWrapper`], so `sudo {{.Command}}` is enough when the
/// build does not run as root.
///
/// # Example
///
/// ```
/// use bakery::steps::ChrootCommunicator;
/// use bakery::template::CommandWrapper;
///
/// let comm = ChrootCommunicator::new("/mnt/bakery/xvdf", CommandWrapper::new("sudo {{.Command}}").unwrap());
/// assert_eq!(
///     comm.command_for("yum -y update").unwrap(),
///     "sudo chroot '/mnt/bakery/xvdf' /bin/sh -c 'yum -y update'"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ChrootCommunicator {
    root: PathBuf,
    wrapper: CommandWrapper,
}

impl ChrootCommunicator {
    /// Create a communicator for the root filesystem at `root`.
    pub fn new(root: impl Into<PathBuf>, wrapper: CommandWrapper) -> Self {
        Self {
            root: root.into(),
            wrapper,
        }
    }

    /// The chroot directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The wrapped local command line that runs `command` in the chroot.
    pub fn command_for(&self, command: &str) -> Result<String> {
        let chroot = format!(
            "chroot {} /bin/sh -c {}",
            shell_quote(&self.root.to_string_lossy()),
            shell_quote(command)
        );
        self.wrapper.wrap(&chroot)
    }
}

impl Communicator for ChrootCommunicator {
    fn run(&self, cancel: &CancelToken, command: &str) -> Result<CommandResult> {
        let local = self.command_for(command)?;
        debug!("Executing in chroot {}: {}", self.root.display(), command);
        shell::execute(&local, &CommandOptions::cancellable(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_wrapper_runs_chroot_directly() {
        let comm = ChrootCommunicator::new("/mnt/root", CommandWrapper::default());
        assert_eq!(
            comm.command_for("ls /").unwrap(),
            "chroot '/mnt/root' /bin/sh -c 'ls /'"
        );
    }

    #[test]
    fn single_quotes_in_command_are_escaped() {
        let comm = ChrootCommunicator::new("/mnt/root", CommandWrapper::default());
        assert_eq!(
            comm.command_for("echo 'hi'").unwrap(),
            r#"chroot '/mnt/root' /bin/sh -c 'echo '"'"'hi'"'"''"#
        );
    }

    #[test]
    fn wrapper_sees_whole_chroot_line() {
        let wrapper = CommandWrapper::new("sudo -E {{.Command}}").unwrap();
        let comm = ChrootCommunicator::new("/mnt/root", wrapper);
        assert!(comm
            .command_for("true")
            .unwrap()
            .starts_with("sudo -E chroot '/mnt/root'"));
    }

    #[cfg(unix)]
    #[test]
    fn run_reports_failure_without_error() {
        // An echo wrapper turns the chroot line into a harmless command.
        let wrapper = CommandWrapper::new("echo {{.Command}} >/dev/null; exit 7").unwrap();
        let comm = ChrootCommunicator::new("/nonexistent", wrapper);

        let result = comm.run(&CancelToken::new(), "true").unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(7));
    }
}
