//! Mock filesystem and command runner for tests and non-Pi hosts.

mod command;
mod filesystem;
mod scenarios;

pub use command::{MockCommand, MockResponse};
pub use filesystem::MockFs;
