//! Pre-built mock scenarios for testing.
//!
//! These provide the endpoint contents and `vcgencmd` answers of a
//! Raspberry Pi in a few typical states.

use super::command::MockCommand;
use super::filesystem::MockFs;
use crate::collector::reader::{DEFAULT_THERMAL_PATH, DEFAULT_UPTIME_PATH};

impl MockFs {
    /// A Pi that has been up for about 3.4 hours at 45.6 °C.
    pub fn raspberry_pi() -> Self {
        let mut fs = Self::new();
        fs.add_file(DEFAULT_UPTIME_PATH, "12345.67 8900.11\n");
        fs.add_file(DEFAULT_THERMAL_PATH, "45678\n");
        fs
    }
}

impl MockCommand {
    /// `vcgencmd` on a healthy Pi 4 running at 600 MHz.
    pub fn healthy_pi() -> Self {
        Self::new()
            .output("vcgencmd measure_clock arm", "frequency(48)=600000000\n")
            .output("vcgencmd get_throttled", "throttled=0x0\n")
    }

    /// `vcgencmd` on a Pi with a weak power supply: under-voltage and
    /// throttling now, and both recorded since boot.
    pub fn under_powered_pi() -> Self {
        Self::new()
            .output("vcgencmd measure_clock arm", "frequency(48)=600000000\n")
            .output("vcgencmd get_throttled", "throttled=0x50005\n")
    }
}
