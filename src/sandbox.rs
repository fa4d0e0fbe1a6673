// src/sandbox.rs
//! Runs one composed candidate program in a throwaway interpreter process.
//!
//! Every call spawns a fresh `python3` so state left behind by one candidate
//! can never leak into the next. The candidate's own stdout and stderr go to
//! the null device inside the child; the only thing the parent reads is a
//! single tagged JSON report written by the driver once `exec` returns.
//!
//! This is crash and hang containment only. There is no memory, disk or
//! privilege isolation.

use serde::Deserialize;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::errors::{EvalError, Result};

const REPORT_MARKER: &str = "__codeeval_report__:";

/// Variables kept after clearing the environment; enough to locate the interpreter.
const PASSTHROUGH_ENV: &[&str] = &["HOME", "PYENV_ROOT", "PYENV_VERSION", "VIRTUAL_ENV", "SYSTEMROOT"];

/// Bytes of stdout kept by the parent. The report is the last line written,
/// so only the tail matters.
const STDOUT_TAIL: usize = 1 << 20;
const STDERR_TAIL: usize = 64 << 10;

/// Driver executed with `python3 -I -c`. Reads the program from stdin.
///
/// The report goes out on a private duplicate of fd 1; fds 1 and 2 are then
/// pointed at the null device, so neither the candidate nor anything it
/// spawns can write into the report stream.
const DRIVER: &str = r#"import json, os, sys
_source = sys.stdin.read()
_report = os.fdopen(os.dup(1), "w")
_null = os.open(os.devnull, os.O_WRONLY)
os.dup2(_null, 1)
os.dup2(_null, 2)
os.close(_null)
try:
    exec(compile(_source, "<candidate>", "exec"), {})
    _result = {"status": "passed"}
except AssertionError:
    _result = {"status": "assertion"}
except Exception as e:
    _result = {"status": "error", "kind": type(e).__name__, "message": str(e)}
_report.write("\n__codeeval_report__:" + json.dumps(_result) + "\n")
_report.flush()
"#;

/// The single result of one sandboxed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    AssertionFailure,
    RuntimeError { kind: String, message: String },
    Timeout,
    ProcessCrash,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum DriverReport {
    Passed,
    Assertion,
    Error { kind: String, message: String },
}

impl From<DriverReport> for ExecutionOutcome {
    fn from(report: DriverReport) -> Self {
        match report {
            DriverReport::Passed => ExecutionOutcome::Success,
            DriverReport::Assertion => ExecutionOutcome::AssertionFailure,
            DriverReport::Error { kind, message } => ExecutionOutcome::RuntimeError { kind, message },
        }
    }
}

/// Process-per-run Python executor.
#[derive(Debug, Clone)]
pub struct Sandbox {
    python: String,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl Sandbox {
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }

    /// Runs `program` to completion or kills it after `timeout`.
    ///
    /// Returns exactly one outcome. The child is reaped before this returns on
    /// every path. `Err` only means the interpreter could not be started.
    pub async fn run(&self, program: &str, timeout: Duration) -> Result<ExecutionOutcome> {
        let path_env = std::env::var("PATH")
            .unwrap_or_else(|_| "/usr/bin:/usr/local/bin:/bin".to_string());

        let mut command = Command::new(&self.python);
        command
            .arg("-I")
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .env("PATH", &path_env)
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        for key in PASSTHROUGH_ENV {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }

        let mut child = command.spawn().map_err(EvalError::SandboxSpawn)?;
        let pid = child.id();

        let start = Instant::now();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let waited = tokio::time::timeout(timeout, async {
            if let Some(mut stdin) = stdin {
                // A child that dies before reading its input shows up as a crash below.
                if let Err(e) = stdin.write_all(program.as_bytes()).await {
                    log::debug!("Could not hand program to interpreter: {}", e);
                }
            }

            let (out, err) = tokio::join!(
                read_tail(stdout, STDOUT_TAIL),
                read_tail(stderr, STDERR_TAIL),
            );
            let (out, err) = (out?, err?);
            // Leftover helpers die with the group while the interpreter's pid is still held.
            kill_group(pid);
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        let elapsed_ms = start.elapsed().as_millis();

        match waited {
            Ok(Ok((status, out, err))) => {
                log::debug!("Interpreter exited with {} after {}ms", status, elapsed_ms);
                Ok(interpret(status, &out, &err))
            }
            Ok(Err(e)) => {
                log::warn!("Lost contact with interpreter: {}", e);
                kill_group(pid);
                reap(&mut child).await;
                Ok(ExecutionOutcome::ProcessCrash)
            }
            Err(_) => {
                log::debug!("Candidate exceeded {:?}, killing interpreter", timeout);
                kill_group(pid);
                reap(&mut child).await;
                Ok(ExecutionOutcome::Timeout)
            }
        }
    }
}

/// Drains `pipe` to EOF, keeping at most the last `limit` bytes.
async fn read_tail<R>(pipe: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(mut pipe) = pipe else { return Ok(kept) };

    let mut chunk = vec![0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        kept.extend_from_slice(&chunk[..n]);
        if kept.len() > limit {
            let excess = kept.len() - limit;
            kept.drain(..excess);
        }
    }
    Ok(kept)
}

/// SIGKILL to the interpreter's whole process group.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else { return };
    let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::debug!("Group kill for {} failed: {}", pid, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// SIGKILL and wait, so no zombie outlives the call.
async fn reap(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill interpreter: {}", e);
        if let Err(e) = child.wait().await {
            log::error!("Failed to reap interpreter: {}", e);
        }
    }
}

fn interpret(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> ExecutionOutcome {
    let stdout = String::from_utf8_lossy(stdout);
    let report = stdout
        .lines()
        .rev()
        .find_map(|line| line.find(REPORT_MARKER).map(|at| &line[at + REPORT_MARKER.len()..]))
        .and_then(|json| serde_json::from_str::<DriverReport>(json).ok());

    match report {
        Some(report) => report.into(),
        None => {
            let stderr = String::from_utf8_lossy(stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            log::debug!("Interpreter exited ({}) without a report; stderr tail: {}", status, tail);
            ExecutionOutcome::ProcessCrash
        }
    }
}
