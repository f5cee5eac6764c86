//! kubectl execution
//!
//! Everything that leaves this module is text: output on success, a
//! refusal when the policy blocks the command, a description otherwise.

use kubechat_core::{normalize_command, GuardrailChain, GuardrailResult, Tool, ToolId};
use serde_json::{Map, Value};
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running command is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Failures of a subordinate command
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}{}", format_stderr(.stderr))]
    NonZeroExit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Runs a command string in a subordinate process
pub trait CommandRunner {
    /// Run to completion and return standard output, or standard error when
    /// the command succeeded without writing to stdout
    fn run(&self, command: &str) -> Result<String, ExecError>;
}

/// Runs commands through `sh -c` with a bounded timeout
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<String, ExecError> {
        let launch_error = |source: io::Error| ExecError::Launch {
            command: command.to_string(),
            source,
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        // Drain both pipes while waiting so a chatty command cannot block on a full pipe
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        // No deadline when the timeout is too large to represent
        let deadline = Instant::now().checked_add(self.timeout);
        let status = loop {
            if let Some(status) = child.try_wait().map_err(launch_error)? {
                break status;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);

        // kubectl reports empty listings on stderr with status 0
        if status.success() {
            if stdout.trim().is_empty() {
                Ok(stderr)
            } else {
                Ok(stdout)
            }
        } else {
            Err(ExecError::NonZeroExit {
                command: command.to_string(),
                status,
                stderr,
            })
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Validates and runs kubectl commands requested by the model
pub struct KubectlExecutor<R> {
    runner: R,
    policy: GuardrailChain,
}

impl<R: CommandRunner> KubectlExecutor<R> {
    pub fn new(runner: R, policy: GuardrailChain) -> Self {
        Self { runner, policy }
    }

    /// Run a command, returning its output or a description of what went wrong
    pub fn execute(&self, raw_command: &str) -> String {
        let command = normalize_command(raw_command);

        if let GuardrailResult::Reject { reason } = self.policy.check(&command) {
            tracing::warn!(%command, "Command refused by policy");
            return reason;
        }

        let start = Instant::now();
        tracing::info!(%command, "Executing command");
        let result = self.runner.run(&command);
        tracing::info!("Finished in {:?}", start.elapsed());

        match result {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("  {e}");
                format!("Error executing kubectl command: {}", e)
            }
        }
    }
}

impl<R: CommandRunner> Tool for KubectlExecutor<R> {
    fn id(&self) -> ToolId {
        ToolId::ExecuteKubectlCommand
    }

    fn execute(&self, arguments: &Map<String, Value>) -> String {
        match arguments.get("command").and_then(Value::as_str) {
            Some(command) => KubectlExecutor::execute(self, command),
            None => "Error executing kubectl command: missing required string parameter 'command'"
                .to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::SpyRunner;
    use super::*;
    use kubechat_core::guardrail::DELETE_REFUSAL;

    fn executor(spy: &SpyRunner) -> KubectlExecutor<SpyRunner> {
        KubectlExecutor::new(spy.clone(), GuardrailChain::kubectl_default())
    }

    #[test]
    fn test_bare_command_is_prefixed() {
        let spy = SpyRunner::default();
        let output = executor(&spy).execute("get pods");
        assert_eq!(spy.calls(), vec!["kubectl get pods"]);
        assert_eq!(output, "ran: kubectl get pods");
    }

    #[test]
    fn test_prefixed_command_is_unchanged() {
        let spy = SpyRunner::default();
        executor(&spy).execute("kubectl get pods");
        assert_eq!(spy.calls(), vec!["kubectl get pods"]);
    }

    #[test]
    fn test_delete_is_refused_without_running() {
        let spy = SpyRunner::default();
        let executor = executor(&spy);

        assert_eq!(executor.execute("delete pod foo"), DELETE_REFUSAL);
        assert_eq!(executor.execute("kubectl delete ns prod"), DELETE_REFUSAL);
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn test_runner_failure_becomes_text() {
        let spy = SpyRunner {
            fail: true,
            ..SpyRunner::default()
        };
        let output = executor(&spy).execute("get pods");
        assert!(output.starts_with("Error executing kubectl command:"));
        assert!(output.contains("timed out"));
    }

    #[test]
    fn test_tool_reads_command_argument() {
        let spy = SpyRunner::default();
        let executor = executor(&spy);
        let mut arguments = Map::new();
        arguments.insert("command".to_string(), Value::from("get nodes"));

        let output = Tool::execute(&executor, &arguments);

        assert_eq!(output, "ran: kubectl get nodes");
        assert_eq!(Tool::id(&executor), ToolId::ExecuteKubectlCommand);
    }

    #[test]
    fn test_tool_missing_command_is_text() {
        let spy = SpyRunner::default();
        let output = Tool::execute(&executor(&spy), &Map::new());
        assert!(output.contains("missing required string parameter 'command'"));
        assert!(spy.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_captures_stdout() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        assert_eq!(runner.run("echo hello").unwrap(), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_reports_exit_status_and_stderr() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        let err = runner.run("echo nope >&2; exit 3").unwrap_err();
        match &err {
            ExecError::NonZeroExit { stderr, status, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr.trim(), "nope");
            }
            other => panic!("Expected non-zero exit, got {other:?}"),
        }
        assert!(err.to_string().ends_with(": nope"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_returns_stderr_when_stdout_is_empty() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        let output = runner
            .run("echo 'No resources found in default namespace.' >&2")
            .unwrap();
        assert_eq!(output, "No resources found in default namespace.\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_prefers_stdout() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        assert_eq!(runner.run("echo out; echo err >&2").unwrap(), "out\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_unbounded_timeout() {
        let runner = ShellRunner::new(Duration::from_secs(u64::MAX));
        assert_eq!(runner.run("echo hi").unwrap(), "hi\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_times_out() {
        let runner = ShellRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep 5").unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }
}
