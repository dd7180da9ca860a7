// Local MCP Gateway - External Process Runner
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Runs collaborator binaries (git, rg, nerdctl, ssh) with an argument
// vector (never through a shell) under a hard deadline.
// A process still running at the deadline is killed with its process group.

use crate::error::GatewayError;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Minimum time output readers get once the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s", secs = .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

impl From<ExecError> for GatewayError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::TimedOut { program, timeout } => GatewayError::Timeout {
                what: program,
                secs: timeout.as_secs(),
            },
            other => GatewayError::Collaborator(other.to_string()),
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// stdout, then stderr on its own line when present, trimmed
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            out.push('\n');
            out.push_str(&self.stderr);
        }
        out.trim().to_string()
    }
}

/// Run `program args…` in `cwd` (if given), waiting at most `timeout`.
pub fn run(program: &str, args: &[String], cwd: Option<&Path>, timeout: Duration) -> Result<ProcessOutput, ExecError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        // Own process group, so a timeout can take down grandchildren too
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    log::debug!("exec {} {:?}", program, args);

    let mut child = cmd.spawn().map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ExecError::NotFound { program: program.to_string() },
        _ => ExecError::Spawn { program: program.to_string(), source },
    })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let started = Instant::now();

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_tree(&mut child);
            log::warn!("{} killed after {}s", program, timeout.as_secs());
            return Err(ExecError::TimedOut { program: program.to_string(), timeout });
        }
        Err(source) => {
            kill_tree(&mut child);
            return Err(ExecError::Spawn { program: program.to_string(), source });
        }
    };

    // A background grandchild may keep the pipes open past the exit
    let drain_deadline = Instant::now() + timeout.saturating_sub(started.elapsed()).max(READER_GRACE);
    let mut out = collect(&stdout, drain_deadline);
    let mut err = collect(&stderr, drain_deadline);
    if out.is_none() || err.is_none() {
        log::warn!("{} left processes holding its output; killing them", program);
        kill_group(child.id());
        let grace = Instant::now() + READER_GRACE;
        out = out.or_else(|| collect(&stdout, grace));
        err = err.or_else(|| collect(&stderr, grace));
    }

    Ok(ProcessOutput {
        status,
        stdout: out.unwrap_or_default(),
        stderr: err.unwrap_or_default(),
    })
}

/// Kill the child and everything it started, then reap it
fn kill_tree(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

/// SIGKILL the process group led by `pid`
#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(pid) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut p| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });
        rx
    })
}

/// Reader output, or None if it did not finish by `deadline`
fn collect(reader: &Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    match reader {
        Some(rx) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())).ok(),
        None => Some(String::new()),
    }
}

/// Resolve `program` on PATH (absolute and relative paths are checked as-is)
pub fn locate(program: &str) -> Option<std::path::PathBuf> {
    which::which(program).ok()
}

// ============================================================================
// TESTS
// ============================================================================
