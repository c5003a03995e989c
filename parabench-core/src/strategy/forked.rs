//! Forked-Process Strategy
//!
//! Each iteration runs in a freshly duplicated image of the harness
//! process: the forked child runs the target exactly as the sequential
//! strategy would, writes its sample back over a pipe as one
//! length-prefixed frame, and exits without unwinding. The parent
//! schedules children in waves of the concurrency degree from the calling
//! thread only: forking from pool workers is not safe while sibling
//! threads may hold allocator locks.
//!
//! A child that dies before reporting (target crash taking the worker
//! down, fork bomb protection, OOM kill) costs exactly its own iteration:
//! the parent records a failed sample for that index and the siblings are
//! untouched.

use crate::cancel::CancelToken;
use crate::frame::{self, FrameError};
use crate::runner::ProcessRunner;
use crate::sample::Sample;
use crate::strategy::StrategyError;
use std::fs::File;
use std::os::unix::io::{FromRawFd, RawFd};

/// Poll granularity while waiting for a forked worker's frame.
const PIPE_POLL_TIMEOUT_MS: i32 = 100;

/// Result of polling a worker's pipe for data.
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

struct ForkedWorker {
    pid: libc::pid_t,
    pipe: File,
    read_fd: RawFd,
    iteration_index: u64,
}

pub(super) fn execute(
    runner: &ProcessRunner,
    iterations: u64,
    degree: usize,
    cancel: &CancelToken,
) -> Result<Vec<Sample>, StrategyError> {
    let mut samples = Vec::with_capacity(iterations as usize);
    let mut next = 0u64;

    while next < iterations {
        let wave_end = (next + degree as u64).min(iterations);

        let mut wave = Vec::with_capacity((wave_end - next) as usize);
        for index in next..wave_end {
            if cancel.is_cancelled() {
                samples.push(Sample::failure(
                    index,
                    runner.elapsed_ms(),
                    "cancelled before start",
                ));
                continue;
            }
            match spawn_worker(runner, index) {
                Ok(worker) => wave.push(worker),
                Err(e) => samples.push(Sample::failure(
                    index,
                    runner.elapsed_ms(),
                    format!("fork failed: {}", e),
                )),
            }
        }

        // Children in a wave run concurrently; a sample frame is far
        // smaller than the pipe buffer, so reading them in spawn order
        // never blocks a sibling's write.
        for worker in wave {
            samples.push(reap_worker(runner, worker, cancel));
        }

        next = wave_end;
    }

    Ok(samples)
}

/// Fork one worker for the given iteration.
///
/// The child never returns from this function: it runs the iteration,
/// reports over the pipe, and `_exit`s without running destructors or
/// unwinding into the parent's state.
fn spawn_worker(runner: &ProcessRunner, index: u64) -> Result<ForkedWorker, std::io::Error> {
    let (read_fd, write_fd) = create_pipe()?;

    // SAFETY: the child only touches its own copies of the runner and the
    // write end of the pipe, then terminates via _exit.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = std::io::Error::last_os_error();
        close_fd(read_fd);
        close_fd(write_fd);
        return Err(err);
    }

    if pid == 0 {
        // Child: run the iteration and report back over the pipe. The
        // parent's cancellation flag lives in the parent's memory; the
        // parent enforces cancellation by killing this worker instead.
        close_fd(read_fd);
        let sample = runner.run(index, &CancelToken::new());
        // SAFETY: write_fd is the child's sole owner of the pipe write end.
        let mut pipe = unsafe { File::from_raw_fd(write_fd) };
        let code = match frame::write_frame(&mut pipe, &sample) {
            Ok(()) => 0,
            Err(_) => 1,
        };
        drop(pipe);
        // SAFETY: terminates the child image without unwinding.
        unsafe { libc::_exit(code) };
    }

    close_fd(write_fd);
    Ok(ForkedWorker {
        pid,
        // SAFETY: read_fd is the parent's sole owner of the pipe read end.
        pipe: unsafe { File::from_raw_fd(read_fd) },
        read_fd,
        iteration_index: index,
    })
}

/// Wait for a worker's sample frame, then reap the worker process.
fn reap_worker(runner: &ProcessRunner, mut worker: ForkedWorker, cancel: &CancelToken) -> Sample {
    let index = worker.iteration_index;

    let mut pipe_error: Option<String> = None;
    let received = loop {
        match wait_for_data(worker.read_fd, PIPE_POLL_TIMEOUT_MS) {
            // A closing pipe may still hold the frame; try the read either way.
            PollResult::DataAvailable | PollResult::PipeClosed => {
                break match frame::read_frame::<_, Sample>(&mut worker.pipe) {
                    Ok(sample) => Some(sample),
                    Err(FrameError::EndOfStream) => None,
                    Err(e) => {
                        pipe_error = Some(e.to_string());
                        None
                    }
                };
            }
            PollResult::Timeout => {
                if cancel.is_cancelled() {
                    // Kill the worker; the pipe closes and the next poll
                    // ends the loop. A frame already in flight is kept.
                    send_sigkill(worker.pid);
                }
            }
            PollResult::Error(e) => {
                pipe_error = Some(e.to_string());
                break None;
            }
        }
    };

    // Reap the worker process itself regardless of what the pipe carried.
    let mut status: libc::c_int = 0;
    // SAFETY: pid refers to a child of this process that has not been reaped.
    let _ = unsafe { libc::waitpid(worker.pid, &mut status, 0) };

    match received {
        Some(sample) => {
            debug_assert_eq!(sample.iteration_index, index);
            sample
        }
        None if cancel.is_cancelled() => {
            Sample::failure(index, runner.elapsed_ms(), "cancelled")
        }
        None => {
            let message = match pipe_error {
                Some(e) => format!("forked worker lost: {}", e),
                None => "forked worker exited without reporting a sample".to_string(),
            };
            Sample::failure(index, runner.elapsed_ms(), message)
        }
    }
}

/// Create a pipe pair, returning (read_fd, write_fd). Both ends are
/// close-on-exec so the benchmarked target never inherits them.
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: fds is a valid out-parameter for pipe(2).
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        // SAFETY: fd was just returned by pipe(2).
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    // SAFETY: fd is owned by the caller and not wrapped in a File.
    unsafe {
        libc::close(fd);
    }
}

/// Best-effort SIGKILL; the worker may already be gone.
fn send_sigkill(pid: libc::pid_t) {
    let _ = unsafe { libc::kill(pid, libc::SIGKILL) };
}

/// Wait for data on a file descriptor with a timeout.
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: pollfd is a valid single-element poll set.
    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;
    use std::time::Duration;

    fn sh_runner(script: &str) -> ProcessRunner {
        ProcessRunner::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_samples_cross_the_fork_boundary() {
        let runner = sh_runner("exit 0");
        let raw = execute(&runner, 4, 2, &CancelToken::new()).unwrap();

        let ordered = collect(raw, 4).unwrap();
        assert!(ordered.iter().all(|s| !s.failed));
        assert!(ordered.iter().all(|s| s.peak_memory_kb > 0));
    }

    #[test]
    fn test_failing_target_is_confined_per_iteration() {
        let runner = sh_runner("exit 3");
        let raw = execute(&runner, 3, 1, &CancelToken::new()).unwrap();

        let ordered = collect(raw, 3).unwrap();
        assert!(ordered.iter().all(|s| s.failed));
        assert!(ordered.iter().all(|s| s.exit_code == 3));
    }

    #[test]
    fn test_missing_target_never_loses_samples() {
        let runner = ProcessRunner::new(
            "/nonexistent/program",
            Vec::new(),
            Duration::from_secs(10),
        );
        let raw = execute(&runner, 4, 2, &CancelToken::new()).unwrap();

        let ordered = collect(raw, 4).unwrap();
        assert_eq!(ordered.len(), 4);
        assert!(ordered.iter().all(|s| s.failed));
    }
}
