//! Shell command execution.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BakeryError, Result};
use crate::multistep::CancelToken;

/// How often a running command is checked for exit, cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep reading after the shell exits. Background processes it
/// started can hold the pipes open for much longer.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Kill the command after this long (None = no timeout).
    pub timeout: Option<Duration>,

    /// Kill the command when this token is cancelled.
    pub cancel: Option<CancelToken>,
}

impl CommandOptions {
    /// Options that kill the command on cancellation.
    pub fn cancellable(cancel: &CancelToken) -> Self {
        Self {
            cancel: Some(cancel.clone()),
            ..Default::default()
        }
    }
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Execute a shell command, capturing its output.
///
/// The command runs under `/bin/sh -c` (`cmd /C` on Windows). A non-zero
/// exit is a successful call returning a failed [`CommandResult`].
///
/// # Errors
///
/// - `CommandFailed` with no code if the shell could not be started
/// - `Cancelled` if the token in `options` was cancelled (the child is killed)
/// - `CommandTimeout` if `options.timeout` elapsed (the child is killed)
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    run(command, options, None)
}

/// Execute a command, passing each output line to `callback` as it arrives.
pub fn execute_streaming(
    command: &str,
    options: &CommandOptions,
    callback: &dyn Fn(OutputLine),
) -> Result<CommandResult> {
    run(command, options, Some(callback))
}

/// Quote `s` for safe use as one word in a POSIX shell command.
///
/// ```
/// use bakery::shell::shell_quote;
///
/// assert_eq!(shell_quote("echo 'hi'"), r#"'echo '"'"'hi'"'"''"#);
/// ```
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn spawn_reader<R>(
    source: Option<R>,
    wrap: fn(String) -> OutputLine,
    tx: Sender<OutputLine>,
) -> Option<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let source = source?;
    Some(thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if buf.ends_with(b"\n") {
                buf.pop();
                if buf.ends_with(b"\r") {
                    buf.pop();
                }
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    }))
}

struct Collected<'a> {
    stdout: String,
    stderr: String,
    callback: Option<&'a dyn Fn(OutputLine)>,
}

impl Collected<'_> {
    fn push(&mut self, line: OutputLine) {
        match &line {
            OutputLine::Stdout(l) => {
                self.stdout.push_str(l);
                self.stdout.push('\n');
            }
            OutputLine::Stderr(l) => {
                self.stderr.push_str(l);
                self.stderr.push('\n');
            }
        }
        if let Some(callback) = self.callback {
            callback(line);
        }
    }
}

fn kill(child: &mut Child, command: &str) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill '{}': {}", command, e);
    }
    let _ = child.wait();
}

fn run(
    command: &str,
    options: &CommandOptions,
    callback: Option<&dyn Fn(OutputLine)>,
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = shell_command(command);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("Executing: {}", command);
    let mut child = cmd.spawn().map_err(|e| {
        debug!("Failed to start '{}': {}", command, e);
        BakeryError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    let (tx, rx) = mpsc::channel();
    let readers = [
        spawn_reader(child.stdout.take(), OutputLine::Stdout, tx.clone()),
        spawn_reader(child.stderr.take(), OutputLine::Stderr, tx),
    ];

    let mut collected = Collected {
        stdout: String::new(),
        stderr: String::new(),
        callback,
    };

    let status = loop {
        while let Ok(line) = rx.try_recv() {
            collected.push(line);
        }

        if let Some(status) = child.try_wait()? {
            break status;
        }

        if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            debug!("Killing '{}': cancelled", command);
            kill(&mut child, command);
            return Err(BakeryError::Cancelled);
        }

        if let Some(timeout) = options.timeout {
            if start.elapsed() >= timeout {
                debug!("Killing '{}': timed out after {:?}", command, timeout);
                kill(&mut child, command);
                return Err(BakeryError::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                });
            }
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => collected.push(line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
        }
    };

    let exited = Instant::now();
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => collected.push(line),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let cancelled = options.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
        let timed_out = options.timeout.is_some_and(|t| start.elapsed() >= t);
        if cancelled || timed_out || exited.elapsed() >= DRAIN_GRACE {
            debug!("'{}' exited but its output is still open; not waiting", command);
            break;
        }
    }
    // Readers still blocked on an inherited pipe are left to finish on their own.
    for handle in readers.into_iter().flatten() {
        if handle.is_finished() {
            let _ = handle.join();
        }
    }

    let duration = start.elapsed();
    debug!(
        "'{}' exited with {:?} after {:?}",
        command,
        status.code(),
        duration
    );

    if status.success() {
        Ok(CommandResult::success(
            collected.stdout,
            collected.stderr,
            duration,
        ))
    } else {
        Ok(CommandResult::failure(
            status.code(),
            collected.stdout,
            collected.stderr,
            duration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn execute_successful_command() {
        let result = execute("echo hello", &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "hello\n");
    }

    #[test]
    fn execute_failing_command() {
        let result = execute("exit 3", &CommandOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn captures_stderr() {
        let result = execute("echo oops >&2", &CommandOptions::default()).unwrap();
        assert_eq!(result.stderr, "oops\n");
        assert!(result.stdout.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("VOLUME_ID".to_string(), "vol-0123".to_string());

        let result = execute("echo $VOLUME_ID", &options).unwrap();

        assert_eq!(result.stdout.trim(), "vol-0123");
    }

    #[cfg(unix)]
    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker"), "").unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let result = execute("ls", &options).unwrap();

        assert!(result.stdout.contains("marker"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_command() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let started = Instant::now();

        let err = execute("sleep 5", &options).unwrap_err();

        assert!(matches!(err, BakeryError::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_command() {
        let cancel = CancelToken::new();
        let options = CommandOptions::cancellable(&cancel);
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });
        let started = Instant::now();

        let err = execute("sleep 5", &options).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, BakeryError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn streaming_sees_every_line() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let callback = move |line: OutputLine| sink.lock().unwrap().push(line);

        let result = execute_streaming(
            "echo line1 && echo line2",
            &CommandOptions::default(),
            &callback,
        )
        .unwrap();

        assert!(result.success);
        let captured = lines.lock().unwrap();
        assert!(captured.contains(&OutputLine::Stdout("line1".to_string())));
        assert!(captured.contains(&OutputLine::Stdout("line2".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn invalid_utf8_does_not_lose_later_output() {
        let result = execute(
            "printf 'x\\377\\n'; sleep 0.2; echo after",
            &CommandOptions::default(),
        )
        .unwrap();

        assert!(result.success, "{:?}", result);
        assert_eq!(result.stdout, "x\u{FFFD}\nafter\n");
    }

    #[cfg(unix)]
    #[test]
    fn background_process_does_not_hold_up_return() {
        let started = Instant::now();

        let result = execute("sleep 4 & echo started", &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_is_seen_while_background_output_is_open() {
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            canceller.cancel();
        });
        let started = Instant::now();

        let result = execute(
            "sleep 4 & echo started",
            &CommandOptions::cancellable(&cancel),
        );
        handle.join().unwrap();

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn quote_wraps_in_single_quotes() {
        assert_eq!(shell_quote("ls -la"), "'ls -la'");
    }

    #[cfg(unix)]
    #[test]
    fn quoted_string_round_trips_through_shell() {
        let original = "it's a \"test\" $HOME";
        let result = execute(
            &format!("printf '%s' {}", shell_quote(original)),
            &CommandOptions::default(),
        )
        .unwrap();
        assert_eq!(result.stdout.trim_end_matches('\n'), original);
    }
}
