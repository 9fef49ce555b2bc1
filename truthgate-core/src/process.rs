//! Process execution port and the std-backed runner.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build a command from a program and arguments.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Split a configured command line on whitespace. Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished (or killed) subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code, `None` when killed by a signal or timeout.
    pub exit_code: Option<i32>,
    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stdout and stderr joined by a newline.
    pub fn merged_output(&self) -> String {
        let mut merged = String::new();
        if !self.stdout.trim().is_empty() {
            merged.push_str(self.stdout.trim());
        }
        if !self.stderr.trim().is_empty() {
            if !merged.is_empty() {
                merged.push('\n');
            }
            merged.push_str(self.stderr.trim());
        }
        merged
    }
}

/// Port for running external commands so probes can be tested with canned output.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner: Send + Sync {
    /// Run a command in `cwd`, killing it once `timeout` elapses.
    ///
    /// A timeout is not an error at this level: the returned output has
    /// `timed_out` set. Failing to spawn the program is an error.
    fn run(&self, command: &CommandSpec, cwd: &Path, timeout: Duration) -> Result<CommandOutput>;
}

/// Runs commands with `std::process`, polling for completion and killing on timeout.
#[derive(Debug, Default, Clone)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandSpec, cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
        log::debug!("running `{command}` in {}", cwd.display());
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(CommandOutput {
                    stdout: join_reader(stdout),
                    stderr: join_reader(stderr),
                    exit_code: status.code(),
                    timed_out: false,
                });
            }
            if Instant::now() >= deadline {
                // SIGKILL on unix; the child may already be gone.
                let _ = child.kill();
                child.wait()?;
                log::warn!("`{command}` killed after {}s", timeout.as_secs());
                // Grandchildren can keep the pipes open, so the readers are detached.
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    timed_out: true,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).to_string()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_program_and_args() {
        let spec = CommandSpec::parse("  npx eslint . --format json ").expect("spec");
        assert_eq!(spec.program, "npx");
        assert_eq!(spec.args, vec!["eslint", ".", "--format", "json"]);
        assert_eq!(spec.to_string(), "npx eslint . --format json");
        assert!(CommandSpec::parse("   ").is_none());
    }

    #[test]
    fn merged_output_joins_streams() {
        let output = CommandOutput {
            stdout: " out \n".to_string(),
            stderr: "err".to_string(),
            exit_code: Some(1),
            timed_out: false,
        };
        assert_eq!(output.merged_output(), "out\nerr");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output() {
        let runner = SystemProcessRunner::new();
        let output = runner
            .run(
                &CommandSpec::new("sh", &["-c", "echo hello; echo oops >&2; exit 3"]),
                Path::new("."),
                Duration::from_secs(10),
            )
            .expect("run");
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_kills_on_timeout() {
        let runner = SystemProcessRunner::new();
        let started = Instant::now();
        let output = runner
            .run(
                &CommandSpec::new("sleep", &["5"]),
                Path::new("."),
                Duration::from_millis(100),
            )
            .expect("run");
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn system_runner_errors_on_missing_program() {
        let runner = SystemProcessRunner::new();
        let result = runner.run(
            &CommandSpec::new("truthgate-definitely-missing-binary", &[]),
            Path::new("."),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
