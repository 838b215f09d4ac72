//! Reader for Raspberry Pi hardware status.
//!
//! Uptime and temperature come from two pseudo-files; clock frequency and
//! the throttling bitmask come from `vcgencmd`. Nothing is cached: every
//! call reads the endpoint or spawns the tool again.

use std::io;
use std::path::{Path, PathBuf};

use crate::collector::command::ToolError;
use crate::collector::parser::{
    ParseError, parse_frequency_mhz, parse_thermal, parse_throttled, parse_uptime,
    split_key_value,
};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::flags::ThrottleFlags;

pub const DEFAULT_UPTIME_PATH: &str = "/proc/uptime";
pub const DEFAULT_THERMAL_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_VCGENCMD: &str = "vcgencmd";

/// Error type for a single status read.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The endpoint could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The endpoint or tool output had unexpected content.
    #[error("{what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: ParseError,
    },
    /// The diagnostics tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Reads uptime, temperature, clock frequency and throttling state.
pub struct SystemReader<F: FileSystem, C: CommandRunner> {
    fs: F,
    runner: C,
    uptime_path: PathBuf,
    thermal_path: PathBuf,
    vcgencmd: String,
}

impl<F: FileSystem, C: CommandRunner> SystemReader<F, C> {
    /// Creates a reader using the standard Raspberry Pi OS locations.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `runner` - Command runner used for `vcgencmd` (real or mock)
    pub fn new(fs: F, runner: C) -> Self {
        Self {
            fs,
            runner,
            uptime_path: PathBuf::from(DEFAULT_UPTIME_PATH),
            thermal_path: PathBuf::from(DEFAULT_THERMAL_PATH),
            vcgencmd: DEFAULT_VCGENCMD.to_string(),
        }
    }

    /// Overrides the uptime endpoint.
    pub fn with_uptime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.uptime_path = path.into();
        self
    }

    /// Overrides the thermal-zone endpoint.
    pub fn with_thermal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.thermal_path = path.into();
        self
    }

    /// Overrides the diagnostics program (name or path).
    pub fn with_vcgencmd(mut self, program: impl Into<String>) -> Self {
        self.vcgencmd = program.into();
        self
    }

    /// Seconds since boot, truncated.
    pub fn read_uptime(&self) -> Result<u64, ReadError> {
        let content = self.read_endpoint(&self.uptime_path)?;
        parse_uptime(&content).map_err(|source| ReadError::Parse {
            what: "uptime",
            source,
        })
    }

    /// CPU temperature in degrees Celsius with one decimal digit.
    ///
    /// The milli-degree reading is truncated with integer division by 100
    /// before the final division by 10, so sub-0.1 °C precision is lost.
    /// Likely a precision bug; existing item values depend on it.
    pub fn read_temperature(&self) -> Result<f64, ReadError> {
        let content = self.read_endpoint(&self.thermal_path)?;
        parse_thermal(&content).map_err(|source| ReadError::Parse {
            what: "temperature",
            source,
        })
    }

    /// ARM core clock in whole megahertz.
    pub fn read_clock_frequency(&self) -> Result<u64, ReadError> {
        let value = self.query(&["measure_clock", "arm"])?;
        parse_frequency_mhz(&value).map_err(|source| ReadError::Parse {
            what: "clock frequency",
            source,
        })
    }

    /// Raw throttling bitmask.
    pub fn read_throttle_bitmask(&self) -> Result<ThrottleFlags, ReadError> {
        let value = self.query(&["get_throttled"])?;
        parse_throttled(&value)
            .map(ThrottleFlags)
            .map_err(|source| ReadError::Parse {
                what: "throttle bitmask",
                source,
            })
    }

    fn read_endpoint(&self, path: &Path) -> Result<String, ReadError> {
        self.fs
            .read_to_string(path)
            .map_err(|source| ReadError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Runs `vcgencmd <args>` and returns the value after `=`.
    fn query(&self, args: &[&str]) -> Result<String, ReadError> {
        let output = self.runner.run(&self.vcgencmd, args)?;
        match split_key_value(&output) {
            Some((_, value)) => Ok(value.to_string()),
            None => Err(ToolError::Malformed {
                program: self.vcgencmd.clone(),
                output,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockCommand, MockFs, MockResponse};
    use crate::flags::{ThrottleCondition, decode};

    fn pi_reader() -> SystemReader<MockFs, MockCommand> {
        SystemReader::new(MockFs::raspberry_pi(), MockCommand::under_powered_pi())
    }

    #[test]
    fn test_read_uptime() {
        assert_eq!(pi_reader().read_uptime().unwrap(), 12345);
    }

    #[test]
    fn test_read_temperature() {
        assert_eq!(pi_reader().read_temperature().unwrap(), 45.6);
    }

    #[test]
    fn test_read_clock_frequency() {
        assert_eq!(pi_reader().read_clock_frequency().unwrap(), 600);
    }

    #[test]
    fn test_read_throttle_bitmask() {
        let flags = pi_reader().read_throttle_bitmask().unwrap();
        assert_eq!(flags, ThrottleFlags(0x50005));

        let decoded = decode(flags);
        assert!(decoded.get(ThrottleCondition::UnderVoltage));
        assert!(decoded.get(ThrottleCondition::Throttled));
        assert!(decoded.get(ThrottleCondition::UnderVoltageOccurred));
        assert!(decoded.get(ThrottleCondition::FrequencyCappedOccurred));
        assert_eq!(decoded.active().len(), 4);
    }

    #[test]
    fn test_vcgencmd_arguments() {
        let reader = SystemReader::new(MockFs::new(), MockCommand::healthy_pi())
            .with_vcgencmd("/opt/vc/bin/vcgencmd");
        // Custom program path is not in the mock table.
        assert!(reader.read_clock_frequency().is_err());

        let reader = SystemReader::new(MockFs::new(), MockCommand::healthy_pi());
        reader.read_clock_frequency().unwrap();
        reader.read_throttle_bitmask().unwrap();
        assert_eq!(
            reader.runner.calls(),
            vec!["vcgencmd measure_clock arm", "vcgencmd get_throttled"]
        );
    }

    #[test]
    fn test_missing_thermal_zone_is_io_error() {
        let mut fs = MockFs::raspberry_pi();
        fs.remove_file(DEFAULT_THERMAL_PATH);
        let reader = SystemReader::new(fs, MockCommand::healthy_pi());

        let err = reader.read_temperature().unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
        assert!(err.to_string().contains("thermal_zone0/temp"));
    }

    #[test]
    fn test_garbage_uptime_is_parse_error() {
        let mut fs = MockFs::new();
        fs.add_file(DEFAULT_UPTIME_PATH, "not-a-number 1.0\n");
        let reader = SystemReader::new(fs, MockCommand::new());

        let err = reader.read_uptime().unwrap_err();
        assert!(matches!(err, ReadError::Parse { what: "uptime", .. }));
    }

    #[test]
    fn test_output_without_separator_is_tool_error() {
        let cmd = MockCommand::new().output("vcgencmd get_throttled", "error=");
        let cmd = cmd.output("vcgencmd measure_clock arm", "VCHI initialization failed");
        let reader = SystemReader::new(MockFs::new(), cmd);

        let err = reader.read_clock_frequency().unwrap_err();
        assert!(matches!(err, ReadError::Tool(ToolError::Malformed { .. })));

        // Separator present but empty value.
        let err = reader.read_throttle_bitmask().unwrap_err();
        assert!(matches!(
            err,
            ReadError::Parse {
                what: "throttle bitmask",
                ..
            }
        ));
    }

    #[test]
    fn test_tool_failures_are_tool_errors() {
        let cmd = MockCommand::new()
            .respond("vcgencmd get_throttled", MockResponse::Timeout)
            .respond(
                "vcgencmd measure_clock arm",
                MockResponse::Exit(1, "permission denied".into()),
            );
        let reader = SystemReader::new(MockFs::new(), cmd);

        assert!(matches!(
            reader.read_throttle_bitmask().unwrap_err(),
            ReadError::Tool(ToolError::Timeout { .. })
        ));
        assert!(matches!(
            reader.read_clock_frequency().unwrap_err(),
            ReadError::Tool(ToolError::Exit { .. })
        ));
    }

    #[test]
    fn test_custom_paths() {
        let mut fs = MockFs::new();
        fs.add_file("/host/proc/uptime", "100.5 3.0\n");
        fs.add_file("/host/thermal", "51234\n");
        let reader = SystemReader::new(fs, MockCommand::new())
            .with_uptime_path("/host/proc/uptime")
            .with_thermal_path("/host/thermal");

        assert_eq!(reader.read_uptime().unwrap(), 100);
        assert_eq!(reader.read_temperature().unwrap(), 51.2);
    }
}
