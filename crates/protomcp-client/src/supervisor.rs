//! Subprocess supervisor: spawn, pipe, monitor, and terminate a child
//! provider process.

use std::process::Stdio as StdStdio;
use std::time::Duration;

use protomcp_protocol::error::{operation_failed, Error};
use protomcp_transport::stdio::StdioTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How to launch a provider as a child process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Environment overrides, layered on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Build a launch spec with no arguments or environment overrides.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Attach arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// How long `close` waits at each step of the termination protocol
/// before escalating.
#[derive(Debug, Clone, Copy)]
pub struct TerminationConfig {
    /// Grace period after asking the child to exit politely.
    pub polite_grace: Duration,
    /// Grace period after sending an interrupt signal.
    pub interrupt_grace: Duration,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            polite_grace: Duration::from_secs(5),
            interrupt_grace: Duration::from_secs(2),
        }
    }
}

/// The exit status of a supervised child, reported once on completion.
#[derive(Debug, Clone, Copy)]
pub struct ExitReport {
    /// The process's exit code, if the platform reports one.
    pub code: Option<i32>,
    /// Whether the exit was requested by our own termination protocol
    /// (an unexpected exit otherwise surfaces as a crash).
    pub requested: bool,
}

/// A running child process, piped through a [`StdioTransport`], with a
/// line-forwarding stderr reader tagged with a server name.
pub struct Supervisor {
    name: String,
    child: Mutex<Child>,
    termination: TerminationConfig,
}

/// A transport over a child's stdout/stdin pipes.
pub type ChildTransport = StdioTransport<ChildStdout, ChildStdin>;

impl Supervisor {
    /// Spawn `spec` and build a transport over its stdio pipes. The
    /// returned stderr-line stream forwards to `log_sink` tagged with
    /// `name` for as long as the child lives.
    pub fn spawn(
        name: impl Into<String>,
        spec: &LaunchSpec,
        termination: TerminationConfig,
    ) -> Result<(Self, ChildTransport), Error> {
        let name = name.into();
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(spec.env.iter().cloned())
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| operation_failed(format!("failed to spawn '{}': {err}", spec.command)))?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let forward_name = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => debug!(server = %forward_name, "{line}"),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(server = %forward_name, %err, "stderr forwarder read error");
                        break;
                    }
                }
            }
        });

        let transport = StdioTransport::new(stdout, stdin);
        let supervisor = Self {
            name,
            child: Mutex::new(child),
            termination,
        };
        Ok((supervisor, transport))
    }

    /// The server name this child was launched under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the child is still running.
    pub async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Run the termination protocol: polite close (the caller
    /// has already closed the transport's stdin before calling this),
    /// then an interrupt signal, then a forced kill, reaping the process
    /// at whichever step it exits.
    pub async fn terminate(&self) -> ExitReport {
        let mut child = self.child.lock().await;

        if let Ok(Some(status)) = child.try_wait() {
            return ExitReport { code: status.code(), requested: true };
        }

        if let Ok(Ok(status)) = timeout(self.termination.polite_grace, child.wait()).await {
            info!(server = %self.name, %status, "child exited after polite close");
            return ExitReport { code: status.code(), requested: true };
        }

        send_interrupt(&child);
        if let Ok(Ok(status)) = timeout(self.termination.interrupt_grace, child.wait()).await {
            info!(server = %self.name, %status, "child exited after interrupt");
            return ExitReport { code: status.code(), requested: true };
        }

        warn!(server = %self.name, "child ignored interrupt, force-killing");
        let _ = child.start_kill();
        let status = child.wait().await.ok();
        ExitReport { code: status.and_then(|s| s.code()), requested: true }
    }
}

#[cfg(unix)]
fn send_interrupt(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: `pid` is a valid process id for a child we still hold a
        // handle to; SIGTERM asks it to exit, it does not reap anything.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &Child) {
    let _ = child;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_terminate_a_real_process() {
        let spec = LaunchSpec::new("sleep").with_args(["30"]);
        let (supervisor, _transport) = Supervisor::spawn("test", &spec, TerminationConfig {
            polite_grace: Duration::from_millis(50),
            interrupt_grace: Duration::from_millis(50),
        })
        .unwrap();
        assert!(supervisor.is_alive().await);
        let report = supervisor.terminate().await;
        assert!(report.requested);
        assert!(!supervisor.is_alive().await);
    }

    #[tokio::test]
    async fn terminate_is_a_noop_on_an_already_exited_process() {
        let spec = LaunchSpec::new("true");
        let (supervisor, _transport) =
            Supervisor::spawn("test", &spec, TerminationConfig::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = supervisor.terminate().await;
        assert_eq!(report.code, Some(0));
    }
}
