//! Scripted command runner for testing `vcgencmd` readers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::collector::command::ToolError;
use crate::collector::traits::CommandRunner;

/// Canned result for one command line.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Command succeeds and prints this text.
    Output(String),
    /// Program is not installed.
    NotFound,
    /// Command exits with the given status and stderr.
    Exit(i32, String),
    /// Command hangs past the timeout.
    Timeout,
}

/// Command runner that answers from a table keyed by the full command line
/// (`"vcgencmd get_throttled"`). Unknown command lines behave like a
/// missing program.
#[derive(Debug, Default)]
pub struct MockCommand {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response for a command line.
    pub fn respond(mut self, command_line: &str, response: MockResponse) -> Self {
        self.responses.insert(command_line.to_string(), response);
        self
    }

    /// Registers a successful output for a command line.
    pub fn output(self, command_line: &str, stdout: &str) -> Self {
        self.respond(command_line, MockResponse::Output(stdout.to_string()))
    }

    /// Command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandRunner for MockCommand {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ToolError> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let program = program.to_string();
        match self.responses.get(&line) {
            Some(MockResponse::Output(out)) => Ok(out.trim().to_string()),
            Some(MockResponse::Exit(code, stderr)) => Err(ToolError::Exit {
                program,
                code: Some(*code),
                stderr: stderr.clone(),
            }),
            Some(MockResponse::Timeout) => Err(ToolError::Timeout {
                program,
                timeout: Duration::from_secs(5),
            }),
            Some(MockResponse::NotFound) | None => Err(ToolError::NotFound { program }),
        }
    }
}
