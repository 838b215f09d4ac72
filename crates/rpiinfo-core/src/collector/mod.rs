//! Raspberry Pi status collection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   SystemReader                   │
//! │   /proc/uptime            vcgencmd measure_clock │
//! │   thermal_zone0/temp      vcgencmd get_throttled │
//! └────────────┬─────────────────────────┬───────────┘
//!              │                         │
//!       ┌──────▼──────┐          ┌───────▼───────┐
//!       │  FileSystem │ (trait)  │ CommandRunner │ (trait)
//!       └──────┬──────┘          └───────┬───────┘
//!         ┌────┴────┐               ┌────┴────────┐
//!      RealFs     MockFs     SystemCommand   MockCommand
//! ```
//!
//! # Usage
//!
//! ```
//! use rpiinfo_core::collector::{MockCommand, MockFs, SystemReader};
//!
//! let reader = SystemReader::new(MockFs::raspberry_pi(), MockCommand::healthy_pi());
//! assert_eq!(reader.read_uptime().unwrap(), 12345);
//! assert_eq!(reader.read_clock_frequency().unwrap(), 600);
//! ```

pub mod command;
pub mod mock;
pub mod parser;
pub mod reader;
pub mod traits;

pub use command::{SystemCommand, ToolError};
pub use mock::{MockCommand, MockFs, MockResponse};
pub use parser::ParseError;
pub use reader::{ReadError, SystemReader};
pub use traits::{CommandRunner, FileSystem, RealFs};
