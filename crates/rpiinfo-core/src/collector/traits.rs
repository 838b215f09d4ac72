//! Abstractions for filesystem access and command execution.
//!
//! The `FileSystem` trait lets the reader work against the real `/proc` and
//! `/sys` trees on a Raspberry Pi and against a mock in tests. The
//! `CommandRunner` trait does the same for the `vcgencmd` invocations.

use std::io;
use std::path::Path;

use crate::collector::command::ToolError;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Runs an external program and returns its standard output.
///
/// Implementations must report a missing program, a non-zero exit status
/// and a timeout as distinct [`ToolError`] variants.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and returns its stdout, trimmed.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ToolError>;
}
