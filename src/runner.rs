//! Command runner: executes operator-supplied command lines.
//!
//! Every call resolves to a display string. Failures (timeouts, non-zero
//! exits, spawn errors) are folded into the text rather than returned as
//! errors, so a bad command can never take the bot down.
//!
//! ## Shell or argv
//!
//! Lines containing a pipe, `&&`, an output redirect or `sudo` go through
//! `sh -c` exactly as typed. Everything else is split with shell-word rules
//! and executed directly. The allowlisted operator already has full shell
//! access; the argv path only keeps simple commands away from accidental
//! metacharacter expansion and is not a security boundary.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

use crate::format::TRUNCATION_SUFFIX;

/// Returned when a command exits 0 without printing anything.
pub const SUCCESS_MARKER: &str = "✅ Command completed successfully";

/// Returned when a command outlives its timeout.
pub const TIMEOUT_MARKER: &str = "⏰ Command timed out";

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes kept per output stream. Anything past this is read and dropped so
/// the child never stalls on a full pipe.
pub const CAPTURE_LIMIT: usize = 64 * 1024;

/// Substrings that route a command line through the shell.
const SHELL_TRIGGERS: &[&str] = &["|", "&&", ">", "sudo"];

/// Builtins that only exist inside a shell; running them as argv always fails.
const SHELL_BUILTINS: &[&str] = &[
    "exit", "cd", "export", "unset", "source", ".", "alias", "ulimit", "umask", "set", "eval",
    "exec", "type", "wait", "trap", "read", "shift",
];

/// A single request to run a command line.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

/// How a command run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit status 0.
    Success,
    /// Non-zero exit status, or killed by a signal.
    Error,
    /// The timeout elapsed and the process was killed.
    Timeout,
    /// The command could not be launched or waited on.
    Exception,
}

/// Captured result of one command run.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Stdout on success; the preferred non-empty stream on error; the error
    /// description on exception. Empty on timeout.
    pub text: String,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    pub outcome: Outcome,
    /// The chosen stream ran past [`CAPTURE_LIMIT`] and was cut.
    pub truncated: bool,
}

/// One drained output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CommandResult {
    fn from_exit(status: ExitStatus, stdout: Captured, stderr: Captured) -> Self {
        if status.success() {
            return Self {
                text: String::from_utf8_lossy(&stdout.bytes).into_owned(),
                exit_code: Some(0),
                outcome: Outcome::Success,
                truncated: stdout.truncated,
            };
        }

        let chosen = if stdout.bytes.is_empty() { stderr } else { stdout };
        Self {
            text: String::from_utf8_lossy(&chosen.bytes).into_owned(),
            exit_code: status.code(),
            outcome: Outcome::Error,
            truncated: chosen.truncated,
        }
    }

    fn timed_out() -> Self {
        Self {
            text: String::new(),
            exit_code: None,
            outcome: Outcome::Timeout,
            truncated: false,
        }
    }

    fn exception(reason: impl Into<String>) -> Self {
        Self {
            text: reason.into(),
            exit_code: None,
            outcome: Outcome::Exception,
            truncated: false,
        }
    }

    /// Render into the operator-facing string.
    pub fn render(&self) -> String {
        let mut out = match self.outcome {
            Outcome::Success if self.text.is_empty() => SUCCESS_MARKER.to_string(),
            Outcome::Success => self.text.clone(),
            Outcome::Error => match self.exit_code {
                Some(code) => format!("❌ Error (exit code {}):\n{}", code, self.text),
                None => format!("❌ Error (terminated by signal):\n{}", self.text),
            },
            Outcome::Timeout => TIMEOUT_MARKER.to_string(),
            Outcome::Exception => format!("⚠️ Error: {}", self.text),
        };
        if self.truncated {
            out.push_str(TRUNCATION_SUFFIX);
        }
        out
    }
}

/// How a command line will be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `sh -c <line>`
    Shell(String),
    /// Program plus arguments, no shell involved.
    Argv(Vec<String>),
}

impl Invocation {
    /// Classify a command line. Fails on empty input or unbalanced quotes.
    pub fn parse(command: &str) -> Result<Self, String> {
        let line = command.trim();
        if line.is_empty() {
            return Err("empty command".to_string());
        }
        if needs_shell(line) {
            return Ok(Self::Shell(line.to_string()));
        }

        let argv = shell_words::split(line).map_err(|e| format!("cannot parse command: {}", e))?;
        match argv.first() {
            None => Err("empty command".to_string()),
            Some(program) if SHELL_BUILTINS.contains(&program.as_str()) => {
                Ok(Self::Shell(line.to_string()))
            }
            Some(_) => Ok(Self::Argv(argv)),
        }
    }

    fn program(&self) -> &str {
        match self {
            Self::Shell(_) => "sh",
            Self::Argv(argv) => &argv[0],
        }
    }

    fn command(&self) -> Command {
        let mut cmd = match self {
            Self::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            Self::Argv(argv) => {
                let mut cmd = Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                cmd
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout can take down everything the shell started.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// True when the line must be handed to `sh -c`.
pub fn needs_shell(command: &str) -> bool {
    SHELL_TRIGGERS.iter().any(|t| command.contains(t))
}

/// Run `command` with `timeout` and render the result.
pub async fn run(command: &str, timeout: Duration) -> String {
    execute(&CommandRequest::new(command, timeout))
        .await
        .render()
}

/// Run a request and return the structured result.
#[instrument(skip_all, fields(timeout_ms = request.timeout.as_millis() as u64))]
pub async fn execute(request: &CommandRequest) -> CommandResult {
    let invocation = match Invocation::parse(&request.command) {
        Ok(inv) => inv,
        Err(reason) => return CommandResult::exception(reason),
    };
    debug!(?invocation, "Spawning command");

    let mut child = match invocation.command().spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = invocation.program(), error = %e, "Spawn failed");
            return CommandResult::exception(describe_spawn_error(invocation.program(), &e));
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let waited = {
        let collect = async { tokio::try_join!(child.wait(), drain(stdout), drain(stderr)) };
        tokio::time::timeout(request.timeout, collect).await
    };

    match waited {
        Ok(Ok((status, out, err))) => {
            debug!(
                code = ?status.code(),
                stdout_len = out.bytes.len(),
                stderr_len = err.bytes.len(),
                truncated = out.truncated || err.truncated,
                "Command finished"
            );
            CommandResult::from_exit(status, out, err)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Lost track of child process");
            terminate(&mut child).await;
            CommandResult::exception(e.to_string())
        }
        Err(_) => {
            warn!(timeout_ms = request.timeout.as_millis() as u64, "Command timed out, killing");
            terminate(&mut child).await;
            CommandResult::timed_out()
        }
    }
}

/// Read a pipe to EOF, keeping at most [`CAPTURE_LIMIT`] bytes.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Captured> {
    let mut captured = Captured::default();
    let Some(mut pipe) = pipe else {
        return Ok(captured);
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let keep = n.min(CAPTURE_LIMIT - captured.bytes.len());
        captured.bytes.extend_from_slice(&chunk[..keep]);
        if keep < n {
            captured.truncated = true;
        }
    }
    Ok(captured)
}

/// Kill the whole process group, then reap the leader.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall; the group id is the child's pid because of
        // `process_group(0)` at spawn time.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    let _ = child.start_kill();
    if let Err(e) = child.wait().await {
        debug!(error = %e, "Reaping killed child failed");
    }
}

fn describe_spawn_error(program: &str, err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::NotFound => format!("command not found: {}", program),
        std::io::ErrorKind::PermissionDenied => format!("permission denied: {}", program),
        _ => format!("{}: {}", program, err),
    }
}
