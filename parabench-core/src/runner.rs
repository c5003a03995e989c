//! Single-Run Process Execution
//!
//! Spawns one instance of the target program, blocks until it terminates,
//! and captures wall time, CPU time, peak memory and exit status for that
//! run. Reaping goes through `wait4` so the child's resource usage comes
//! from the same syscall that collects its exit status: no second
//! measurement window, no state shared with the caller.

use crate::cancel::CancelToken;
use crate::sample::Sample;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How often the reap loop re-checks a running child. The child's end is
/// detected with at most this much latency, which bounds the measurement
/// granularity for cancellation and timeout handling.
const REAP_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Launches and measures one run of the target per [`ProcessRunner::run`]
/// call.
///
/// The runner carries no shared mutable state: each call spawns a fresh
/// child, blocks until it is reaped, and produces exactly one [`Sample`].
/// A spawn failure is confined to that iteration's sample; it never
/// aborts the batch.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    target: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    epoch: Instant,
}

struct WaitResult {
    status: libc::c_int,
    rusage: libc::rusage,
    kill_reason: Option<String>,
}

impl ProcessRunner {
    /// Create a runner for the given target. The epoch is captured now;
    /// every sample timestamp is an offset from it.
    pub fn new(target: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            args,
            timeout,
            epoch: Instant::now(),
        }
    }

    /// Path of the benchmarked executable.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Arguments forwarded to the target on every run.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Per-iteration timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Milliseconds elapsed since the runner's epoch.
    pub fn elapsed_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Run one iteration of the target directly.
    pub fn run(&self, iteration_index: u64, cancel: &CancelToken) -> Sample {
        let mut command = Command::new(&self.target);
        command.args(&self.args);
        self.run_prepared(iteration_index, cancel, command)
    }

    /// Run one iteration using a caller-prepared command (the isolated
    /// shell strategy wraps the target in an interpreter). Measurement,
    /// timeout and cancellation semantics are identical to
    /// [`ProcessRunner::run`].
    pub fn run_prepared(
        &self,
        iteration_index: u64,
        cancel: &CancelToken,
        mut command: Command,
    ) -> Sample {
        if cancel.is_cancelled() {
            return Sample::failure(iteration_index, self.elapsed_ms(), "cancelled before start");
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let started_at_ms = self.elapsed_ms();
        let started = Instant::now();

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Sample::failure(
                    iteration_index,
                    started_at_ms,
                    format!("failed to spawn {}: {}", self.target.display(), e),
                );
            }
        };

        let pid = child.id() as libc::pid_t;
        let deadline = started + self.timeout;
        let reaped = self.reap(pid, deadline, cancel);

        let wall_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let ended_at_ms = self.elapsed_ms();

        match reaped {
            Ok(result) => {
                let (exit_code, status_failed, status_message) = decode_status(result.status);
                let failed = status_failed || result.kill_reason.is_some();
                let error_message = result.kill_reason.or(status_message);
                Sample {
                    iteration_index,
                    wall_time_ms,
                    cpu_time_ms: cpu_time_ms(&result.rusage),
                    peak_memory_kb: max_rss_kb(&result.rusage),
                    exit_code,
                    failed,
                    error_message,
                    started_at_ms,
                    ended_at_ms,
                }
            }
            Err(message) => Sample {
                iteration_index,
                wall_time_ms,
                cpu_time_ms: 0.0,
                peak_memory_kb: 0,
                exit_code: -1,
                failed: true,
                error_message: Some(message),
                started_at_ms,
                ended_at_ms,
            },
        }
    }

    /// Wait for the child to terminate, collecting its resource usage.
    ///
    /// Polls with `WNOHANG` so cancellation and the per-iteration timeout
    /// can kill the child mid-flight; after a kill the loop keeps polling
    /// until the child is actually reaped, so even killed runs report the
    /// resource usage they accumulated.
    fn reap(
        &self,
        pid: libc::pid_t,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<WaitResult, String> {
        let mut kill_reason: Option<String> = None;
        loop {
            let mut status: libc::c_int = 0;
            // SAFETY: rusage is plain old data filled in by the kernel.
            let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
            let ret = unsafe { libc::wait4(pid, &mut status, libc::WNOHANG, &mut rusage) };

            if ret == pid {
                return Ok(WaitResult {
                    status,
                    rusage,
                    kill_reason,
                });
            }
            if ret == -1 {
                return Err(format!(
                    "wait4 failed: {}",
                    std::io::Error::last_os_error()
                ));
            }

            if kill_reason.is_none() {
                if cancel.is_cancelled() {
                    kill_reason = Some("cancelled".to_string());
                    send_sigkill(pid);
                } else if Instant::now() >= deadline {
                    kill_reason = Some(format!(
                        "timed out after {:.1}s",
                        self.timeout.as_secs_f64()
                    ));
                    send_sigkill(pid);
                }
            }

            std::thread::sleep(REAP_POLL_INTERVAL);
        }
    }
}

/// Best-effort SIGKILL; the process may already be gone.
fn send_sigkill(pid: libc::pid_t) {
    let _ = unsafe { libc::kill(pid, libc::SIGKILL) };
}

/// Decode a wait status into (exit_code, failed, message).
///
/// Signal-terminated children get `-(signal number)` so "signaled" stays
/// unambiguous in the persisted record.
fn decode_status(status: libc::c_int) -> (i32, bool, Option<String>) {
    if libc::WIFEXITED(status) {
        let code = libc::WEXITSTATUS(status);
        if code == 0 {
            (0, false, None)
        } else {
            (code, true, Some(format!("exited with status {}", code)))
        }
    } else if libc::WIFSIGNALED(status) {
        let signal = libc::WTERMSIG(status);
        (
            -signal,
            true,
            Some(format!("terminated by signal {}", signal)),
        )
    } else {
        (-1, true, Some("unrecognized wait status".to_string()))
    }
}

/// User + system CPU time in milliseconds.
fn cpu_time_ms(rusage: &libc::rusage) -> f64 {
    let user = rusage.ru_utime.tv_sec as f64 * 1_000.0 + rusage.ru_utime.tv_usec as f64 / 1_000.0;
    let system =
        rusage.ru_stime.tv_sec as f64 * 1_000.0 + rusage.ru_stime.tv_usec as f64 / 1_000.0;
    user + system
}

/// Peak resident set size in kilobytes. `ru_maxrss` is kilobytes on Linux
/// but bytes on macOS.
#[cfg(target_os = "macos")]
fn max_rss_kb(rusage: &libc::rusage) -> u64 {
    (rusage.ru_maxrss as u64) / 1024
}

#[cfg(not(target_os = "macos"))]
fn max_rss_kb(rusage: &libc::rusage) -> u64 {
    rusage.ru_maxrss as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_runner(script: &str, timeout: Duration) -> ProcessRunner {
        ProcessRunner::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[test]
    fn test_successful_run() {
        let runner = sh_runner("exit 0", Duration::from_secs(10));
        let sample = runner.run(0, &CancelToken::new());

        assert!(!sample.failed, "unexpected failure: {:?}", sample.error_message);
        assert_eq!(sample.exit_code, 0);
        assert!(sample.error_message.is_none());
        assert!(sample.wall_time_ms > 0.0);
        assert!(sample.peak_memory_kb > 0);
        assert!(sample.ended_at_ms >= sample.started_at_ms);
    }

    #[test]
    fn test_nonzero_exit_is_failed() {
        let runner = sh_runner("exit 7", Duration::from_secs(10));
        let sample = runner.run(0, &CancelToken::new());

        assert!(sample.failed);
        assert_eq!(sample.exit_code, 7);
        assert!(sample.error_message.unwrap().contains("status 7"));
    }

    #[test]
    fn test_spawn_failure_is_confined_to_sample() {
        let runner = ProcessRunner::new(
            "/nonexistent/program",
            Vec::new(),
            Duration::from_secs(10),
        );
        let sample = runner.run(2, &CancelToken::new());

        assert!(sample.failed);
        assert_eq!(sample.iteration_index, 2);
        assert!(sample.error_message.unwrap().contains("failed to spawn"));
    }

    #[test]
    fn test_timeout_kills_child() {
        let runner = sh_runner("sleep 5", Duration::from_millis(200));
        let sample = runner.run(0, &CancelToken::new());

        assert!(sample.failed);
        assert!(sample.error_message.unwrap().contains("timed out"));
        // Killed well before the sleep would have finished.
        assert!(sample.wall_time_ms < 3_000.0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let runner = sh_runner("exit 0", Duration::from_secs(10));
        let cancel = CancelToken::new();
        cancel.cancel();
        let sample = runner.run(0, &cancel);

        assert!(sample.failed);
        assert!(sample.error_message.unwrap().contains("cancelled"));
    }
}
