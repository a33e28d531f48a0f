//! Utility functions for process control and formatting.
//!
//! This module provides helpers for running external commands with a bounded
//! timeout, root detection, and the time/duration formatting used by the
//! dashboard and the log file.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Check if the current process is running as root (UID 0)
///
/// Uses the effective user ID from the OS instead of spawning an external command.
#[must_use]
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn is_root() -> bool {
    // SAFETY: geteuid() is a simple syscall that returns the effective user ID.
    // It has no side effects and always succeeds.
    unsafe { libc::geteuid() == 0 }
}

/// Check if the current process is running as root (UID 0)
///
/// On non-Unix platforms, this always returns `false`.
#[must_use]
#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Why a bounded command did not produce output.
#[derive(Debug)]
pub enum RunError {
    /// The program could not be started (missing binary, permissions).
    Spawn(std::io::Error),
    /// The program did not exit before the deadline and was killed.
    Timeout(Duration),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to start: {e}"),
            Self::Timeout(t) => write!(f, "timed out after {}s", t.as_secs()),
        }
    }
}

impl std::error::Error for RunError {}

/// Run a system command with a timeout.
///
/// Spawns the command and polls for completion. If the command doesn't
/// finish within `timeout`, the child process is killed and
/// [`RunError::Timeout`] is returned. Stdin is closed so tools that wait for
/// input (e.g. `openssl s_client`) see EOF immediately.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or times out.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, RunError> {
    run_with_input(cmd, None, timeout)
}

/// Like [`run_with_timeout`], but writes `input` to the child's stdin first.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or times out.
pub fn run_with_input(
    cmd: &mut Command,
    input: Option<&str>,
    timeout: Duration,
) -> Result<Output, RunError> {
    let stdin = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut child = cmd
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;

    if let Some(data) = input {
        if let Some(mut pipe) = child.stdin.take() {
            // A child that exits early closes the pipe; the exit status tells the rest.
            let _ = pipe.write_all(data.as_bytes());
        }
    }

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().map_err(RunError::Spawn),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Timeout(timeout));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            Err(e) => return Err(RunError::Spawn(e)),
        }
    }
}

/// Prefix a privileged command with `sudo` unless we already are root.
#[must_use]
pub fn privileged_command(program: &str, use_sudo: bool) -> Command {
    if use_sudo && !is_root() {
        let mut cmd = Command::new("sudo");
        cmd.arg(program);
        cmd
    } else {
        Command::new(program)
    }
}

/// Formats a duration as `HH:MM:SS`.
///
/// Hours are not wrapped, so a three-day session reads `72:00:00`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Replaces every character of a secret with `*`, keeping its length visible.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

/// Returns the current local time formatted as HH:MM:SS.
pub fn format_local_time() -> String {
    format_system_time_local(std::time::SystemTime::now())
}

/// Converts any `SystemTime` into a local `HH:MM:SS` string.
#[must_use]
pub fn format_system_time_local(time: std::time::SystemTime) -> String {
    local_tm(time).map_or_else(
        || "00:00:00".to_string(),
        |tm| format!("{:02}:{:02}:{:02}", tm.hour, tm.minute, tm.second),
    )
}

/// Returns today's local date as `YYYY-MM-DD` (used for daily log files).
pub fn format_local_date() -> String {
    local_tm(std::time::SystemTime::now()).map_or_else(
        || "unknown".to_string(),
        |tm| format!("{:04}-{:02}-{:02}", tm.year, tm.month, tm.day),
    )
}

struct LocalTm {
    year: i32,
    month: i32,
    day: i32,
    hour: i32,
    minute: i32,
    second: i32,
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn local_tm(time: std::time::SystemTime) -> Option<LocalTm> {
    let secs = time
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .ok()?
        .as_secs();

    // SAFETY: localtime_r writes into our stack-allocated `tm` and is
    // thread-safe (unlike localtime). We pass a valid pointer to both args.
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    #[allow(clippy::cast_possible_wrap)]
    let time_t = secs as libc::time_t;
    let result = unsafe { libc::localtime_r(&time_t, &mut tm) };
    if result.is_null() {
        return None;
    }

    Some(LocalTm {
        year: tm.tm_year + 1900,
        month: tm.tm_mon + 1,
        day: tm.tm_mday,
        hour: tm.tm_hour,
        minute: tm.tm_min,
        second: tm.tm_sec,
    })
}

#[cfg(not(unix))]
fn local_tm(_time: std::time::SystemTime) -> Option<LocalTm> {
    None
}
