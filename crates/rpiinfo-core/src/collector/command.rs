//! Bounded execution of the `vcgencmd` diagnostics tool.

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::traits::CommandRunner;

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Failure of an external tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program}: command not found")]
    NotFound { program: String },

    #[error("{program}: failed to run: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program}: exited with {}: {stderr}", describe_exit(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program}: no result after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program}: unexpected output {output:?}")]
    Malformed { program: String, output: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Runs commands as real child processes, killing them after `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommand {
    timeout: Duration,
}

impl SystemCommand {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommand {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl CommandRunner for SystemCommand {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ToolError> {
        debug!("running {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ToolError::NotFound {
                    program: program.to_string(),
                },
                _ => ToolError::Spawn {
                    program: program.to_string(),
                    source,
                },
            })?;

        // Pipes are drained while the child runs so a large output cannot
        // fill the pipe buffer and stall it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        warn!("{} did not finish within {:?}, killing it", program, self.timeout);
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ToolError::Timeout {
                            program: program.to_string(),
                            timeout: self.timeout,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Spawn {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            return Err(ToolError::Exit {
                program: program.to_string(),
                code: status.code(),
                stderr: collect(stderr).trim().to_string(),
            });
        }

        Ok(stdout.trim().to_string())
    }
}

/// Reads a child pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let buf = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}
