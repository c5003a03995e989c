//! Isolated-Shell Strategy
//!
//! Each iteration gets a freshly spawned `sh` with a cleared environment
//! and its own scratch working directory; the shell `exec`s the target so
//! no extra interpreter process lingers between the harness and the
//! measured program. Interpreter startup stays inside the measured window,
//! reported rather than subtracted, so wall times for this strategy sit
//! above the other strategies for the same target.

use crate::cancel::CancelToken;
use crate::runner::ProcessRunner;
use crate::sample::Sample;
use crate::strategy::StrategyError;
use rayon::ThreadPoolBuilder;
use std::path::Path;
use std::process::Command;
use std::sync::mpsc;

/// PATH handed to the isolated shell; everything else is cleared.
const ISOLATED_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

pub(super) fn execute(
    runner: &ProcessRunner,
    iterations: u64,
    degree: usize,
    cancel: &CancelToken,
) -> Result<Vec<Sample>, StrategyError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(degree)
        .build()
        .map_err(|e| StrategyError::Pool(e.to_string()))?;

    let (tx, rx) = mpsc::sync_channel::<Sample>(degree);
    let samples = pool.in_place_scope(|scope| {
        for index in 0..iterations {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let _ = tx.send(run_in_shell(runner, index, cancel));
            });
        }
        drop(tx);
        rx.iter().collect::<Vec<Sample>>()
    });

    Ok(samples)
}

fn run_in_shell(runner: &ProcessRunner, index: u64, cancel: &CancelToken) -> Sample {
    let workdir = match tempfile::Builder::new().prefix("parabench-iter-").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            return Sample::failure(
                index,
                runner.elapsed_ms(),
                format!("failed to create scratch directory: {}", e),
            );
        }
    };

    let command = shell_command(runner, workdir.path());
    runner.run_prepared(index, cancel, command)
    // workdir is removed here, after the child has been reaped
}

/// Build `sh -c "exec <target> <args>"` with a cleared environment and the
/// scratch directory as working directory.
///
/// The target path is resolved to an absolute path first; the working
/// directory changes, so a relative target would otherwise stop resolving.
fn shell_command(runner: &ProcessRunner, workdir: &Path) -> Command {
    let target = std::fs::canonicalize(runner.target())
        .unwrap_or_else(|_| runner.target().to_path_buf());

    let mut script = format!("exec {}", sh_quote(&target.to_string_lossy()));
    for arg in runner.args() {
        script.push(' ');
        script.push_str(&sh_quote(arg));
    }

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(script)
        .current_dir(workdir)
        .env_clear()
        .env("PATH", ISOLATED_PATH);
    command
}

/// Single-quote a string for `sh -c`, escaping embedded single quotes.
fn sh_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;
    use std::time::Duration;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("with space"), "'with space'");
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_shell_runs_with_cleared_environment() {
        // A canary variable set in the harness must not reach the target.
        std::env::set_var("PARABENCH_ENV_CANARY", "1");
        let runner = ProcessRunner::new(
            "/bin/sh",
            vec![
                "-c".to_string(),
                "test -z \"$PARABENCH_ENV_CANARY\"".to_string(),
            ],
            Duration::from_secs(10),
        );
        let raw = execute(&runner, 1, 1, &CancelToken::new()).unwrap();
        assert_eq!(raw.len(), 1);
        assert!(
            !raw[0].failed,
            "environment not cleared: {:?}",
            raw[0].error_message
        );
    }

    #[test]
    fn test_every_iteration_produces_one_sample() {
        let runner = ProcessRunner::new(
            "/bin/sh",
            vec!["-c".to_string(), "exit 0".to_string()],
            Duration::from_secs(10),
        );
        let raw = execute(&runner, 4, 2, &CancelToken::new()).unwrap();

        let ordered = collect(raw, 4).unwrap();
        assert!(ordered.iter().all(|s| !s.failed));
    }
}
