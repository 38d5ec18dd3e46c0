// SPDX-License-Identifier: MIT

//! Child process spawning with line-streamed I/O and graceful-then-hard
//! cancellation (§4.3 Process Supervisor).

use crate::error::SupervisorError;
use aro_core::env::SUPERVISOR_GRACE_WINDOW;
use std::collections::HashMap;
use std::os::unix::process::CommandExt as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A line sink invoked for each newline-terminated chunk of child output.
/// MUST NOT block — it runs on the supervisor's I/O task (§4.3).
pub type LineSink = Box<dyn Fn(&str) + Send + Sync>;

pub struct SpawnRequest {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    pub on_stdout_line: LineSink,
    pub on_stderr_line: LineSink,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnResult {
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Spawn `request.command` in its own process group, stream its stdout/stderr
/// line-by-line to the supplied sinks, and enforce `timeout`/`cancel` by
/// sending a graceful termination signal to the whole group followed by a
/// hard kill after `SUPERVISOR_GRACE_WINDOW` (§4.3).
pub async fn spawn(request: SpawnRequest) -> Result<SpawnResult, SupervisorError> {
    let started = std::time::Instant::now();

    let mut cmd = Command::new(&request.command);
    cmd.args(&request.args)
        .current_dir(&request.cwd)
        .envs(&request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| SupervisorError::Spawn(request.command.clone(), e))?;
    let pid = child.id().unwrap_or_default();

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let stdout_task = tokio::spawn(stream_lines(stdout, request.on_stdout_line));
    let stderr_task = tokio::spawn(stream_lines(stderr, request.on_stderr_line));

    let wait_result = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(request.timeout) => Outcome::TimedOut,
        _ = request.cancel.cancelled() => Outcome::Canceled,
    };

    let exit_code = match wait_result {
        Outcome::Exited(Ok(status)) => status.code().unwrap_or(-1),
        Outcome::Exited(Err(err)) => {
            warn!(pid, error = %err, "wait() failed after spawn");
            -1
        }
        Outcome::TimedOut | Outcome::Canceled => {
            terminate_process_group(pid).await;
            let grace = tokio::time::timeout(SUPERVISOR_GRACE_WINDOW, child.wait()).await;
            match grace {
                Ok(Ok(status)) => -status.code().unwrap_or(1).abs(),
                _ => {
                    kill_process_group(pid);
                    let _ = child.wait().await;
                    -9
                }
            }
        }
    };

    let _ = stdout_task.await;
    let _ = stderr_task.await;

    Ok(SpawnResult {
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Canceled,
}

async fn stream_lines(pipe: impl tokio::io::AsyncRead + Unpin, sink: LineSink) {
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink(&line),
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "line stream read error");
                break;
            }
        }
    }
}

/// Send SIGTERM to the whole process group (negative pid), the graceful
/// half of §4.3's terminate-then-kill sequence.
async fn terminate_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if pid == 0 {
        return;
    }
    if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!(pid, error = %err, "SIGTERM to process group failed (already exited?)");
    }
}

/// Hard kill: SIGKILL to the whole process group.
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if pid == 0 {
        return;
    }
    if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %err, "SIGKILL to process group failed (already exited?)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting_sink() -> (LineSink, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let sink: LineSink = Box::new(move |line| captured.lock().unwrap().push(line.to_string()));
        (sink, lines)
    }

    #[tokio::test]
    async fn captures_stdout_lines_and_exit_code() {
        let (stdout_sink, stdout_lines) = collecting_sink();
        let (stderr_sink, _stderr_lines) = collecting_sink();
        let result = spawn(SpawnRequest {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "echo one; echo two".to_string()],
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
            timeout: Duration::from_secs(5),
            on_stdout_line: stdout_sink,
            on_stderr_line: stderr_sink,
            cancel: CancellationToken::new(),
        })
        .await
        .expect("spawn");

        assert_eq!(result.exit_code, 0);
        assert_eq!(*stdout_lines.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn cancellation_yields_negative_exit_code() {
        let (stdout_sink, _) = collecting_sink();
        let (stderr_sink, _) = collecting_sink();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result = spawn(SpawnRequest {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
            timeout: Duration::from_secs(60),
            on_stdout_line: stdout_sink,
            on_stderr_line: stderr_sink,
            cancel,
        })
        .await
        .expect("spawn");

        assert!(result.exit_code < 0);
    }

    #[tokio::test]
    async fn timeout_yields_negative_exit_code() {
        let (stdout_sink, _) = collecting_sink();
        let (stderr_sink, _) = collecting_sink();
        let result = spawn(SpawnRequest {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
            timeout: Duration::from_millis(50),
            on_stdout_line: stdout_sink,
            on_stderr_line: stderr_sink,
            cancel: CancellationToken::new(),
        })
        .await
        .expect("spawn");

        assert!(result.exit_code < 0);
    }
}
