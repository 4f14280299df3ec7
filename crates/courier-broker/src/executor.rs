//! Shell executor: spawn one approved command, capture output, bound runtime.
//!
//! Commands are spawned with an explicit argument vector, never through a
//! shell interpreter. Execution-domain failures (spawn errors, timeouts,
//! non-zero exits) are recorded as data in the outcome, not raised.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use courier_types::ShellPayload;

/// Exit code recorded for spawn failures and timeouts.
pub const SYNTHETIC_FAILURE_CODE: i64 = -1;

/// Runtime bounds for one shell execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Ceiling on total runtime before termination begins.
    pub timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            kill_grace: Duration::from_secs(5),
        }
    }
}

/// What one execution produced. Never an error: failures are encoded in
/// `code` and `err` so callers record them as ordinary results.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub code: i64,
    pub out: String,
    pub err: String,
}

/// Run a shell payload to completion (or to the timeout ceiling).
///
/// The caller is responsible for approval and whitelist checks; this
/// function only spawns and supervises. On timeout the process receives
/// SIGTERM, then SIGKILL after the grace period, and the outcome carries
/// the synthetic failure code with a timeout note appended to stderr.
pub async fn run_shell(payload: &ShellPayload, cfg: &ExecutorConfig) -> ExecOutcome {
    let mut command = Command::new(&payload.cmd);
    command
        .args(&payload.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &payload.cwd {
        command.current_dir(cwd);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ExecOutcome {
                code: SYNTHETIC_FAILURE_CODE,
                out: String::new(),
                err: format!("failed to spawn '{}': {e}", payload.cmd),
            };
        }
    };

    // Drain stdout/stderr concurrently with the wait so a chatty child
    // cannot deadlock on a full pipe.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let out_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let err_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let (code, timed_out) = match tokio::time::timeout(cfg.timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code().map(i64::from).unwrap_or(SYNTHETIC_FAILURE_CODE), false),
        Ok(Err(e)) => {
            tracing::warn!(cmd = %payload.cmd, error = %e, "wait on child process failed");
            (SYNTHETIC_FAILURE_CODE, false)
        }
        Err(_) => {
            terminate(&mut child, cfg.kill_grace).await;
            (SYNTHETIC_FAILURE_CODE, true)
        }
    };

    let out = String::from_utf8_lossy(&out_task.await.unwrap_or_default()).into_owned();
    let mut err = String::from_utf8_lossy(&err_task.await.unwrap_or_default()).into_owned();

    if timed_out {
        if !err.is_empty() && !err.ends_with('\n') {
            err.push('\n');
        }
        err.push_str(&format!(
            "command timed out after {}s",
            cfg.timeout.as_secs()
        ));
    }

    ExecOutcome { code, out, err }
}

/// SIGTERM, wait out the grace period, then SIGKILL any survivor.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        if let Ok(raw) = i32::try_from(pid) {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(raw),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}
