// SPDX-License-Identifier: PMPL-1.0-or-later

//! Command execution with a per-invocation deadline

use crate::cloud::command::CliCommand;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for pipe readers once the child has gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured result of one CLI invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Non-blank stdout lines, trimmed
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Case-insensitive search for any marker in stdout or stderr
    pub fn mentions_any(&self, markers: &[String]) -> bool {
        let stdout = self.stdout.to_lowercase();
        let stderr = self.stderr.to_lowercase();
        markers.iter().any(|marker| {
            let marker = marker.to_lowercase();
            !marker.is_empty() && (stderr.contains(&marker) || stdout.contains(&marker))
        })
    }

    /// Short human-readable reason for a failed invocation
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let first_line = self
            .stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no error output");
        match self.exit_code {
            Some(code) => format!("exit code {}: {}", code, first_line),
            None => format!("terminated by signal: {}", first_line),
        }
    }
}

/// Executes built CLI invocations.
///
/// Shared across the scope worker pool, hence `Send + Sync`.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CliCommand) -> io::Result<CommandOutput>;
}

/// Runs commands as child processes, killing any that outlive the deadline.
///
/// On unix each child leads its own process group and the whole group is
/// killed at the deadline, so helpers the CLI spawned (gcloud runs Python)
/// go with it. Output readers are never waited on past the deadline.
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &CliCommand) -> io::Result<CommandOutput> {
        tracing::debug!(command = %command, "spawning");
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            process.process_group(0);
        }
        let mut child = process.spawn()?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe while we poll for exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                tracing::warn!(
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "command exceeded deadline, killing"
                );
                kill_group(&mut child);
                timed_out = true;
                break child.wait()?;
            }
            thread::sleep(Duration::from_millis(20));
        };

        // A descendant outside the group can still hold the pipes open.
        let wait = if timed_out {
            DRAIN_GRACE
        } else {
            self.timeout.saturating_sub(start.elapsed()).max(DRAIN_GRACE)
        };
        let deadline = Instant::now() + wait;
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: collect(stdout, deadline),
            stderr: collect(stderr, deadline),
            timed_out,
        })
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The child was spawned with process_group(0), so its pid is the pgid.
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal; an exited group yields ESRCH.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Output read so far; a reader still blocked at `deadline` is abandoned
fn collect(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> String {
    reader
        .and_then(|rx| rx.recv_timeout(deadline.saturating_duration_since(Instant::now())).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_match_case_insensitively() {
        let output = CommandOutput {
            exit_code: Some(1),
            stderr: "ERROR: (gcloud) User does NOT have permission to access project".to_string(),
            ..Default::default()
        };
        assert!(output.mentions_any(&["does not have permission".to_string()]));
        assert!(!output.mentions_any(&["quota".to_string()]));
    }

    #[test]
    fn timed_out_output_is_never_success() {
        let output = CommandOutput {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!output.success());
        assert_eq!(output.failure_reason(), "timed out");
    }

    fn shell(script: &str) -> CliCommand {
        CliCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            target: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn deadline_bounds_a_shell_with_a_sleeping_child() {
        let runner = ProcessRunner::new(Duration::from_secs(1));
        let start = Instant::now();
        let output = runner.run(&shell("sleep 6; echo late")).expect("sh should spawn");
        let elapsed = start.elapsed();

        assert!(output.timed_out);
        assert!(!output.stdout.contains("late"));
        assert!(elapsed < Duration::from_secs(4), "deadline 1s, run took {:?}", elapsed);
    }

    #[cfg(unix)]
    #[test]
    fn detached_grandchild_holding_pipes_does_not_block() {
        // setsid moves the sleeper out of the killed group; it keeps stdout open.
        let runner = ProcessRunner::new(Duration::from_secs(1));
        let start = Instant::now();
        let output = runner
            .run(&shell("(setsid sleep 6 &); sleep 6"))
            .expect("sh should spawn");

        assert!(output.timed_out);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn fast_command_output_is_captured() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let output = runner.run(&shell("echo p1; echo oops >&2")).expect("sh should spawn");
        assert!(output.success());
        assert_eq!(output.lines(), vec!["p1"]);
        assert_eq!(output.stderr.trim(), "oops");
    }
}
