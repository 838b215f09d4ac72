//! Plugin configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::command::SystemCommand;
use crate::collector::reader::{
    DEFAULT_THERMAL_PATH, DEFAULT_UPTIME_PATH, DEFAULT_VCGENCMD, SystemReader,
};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::poll::coordinator::{DEFAULT_SHORTNAME, Plugin, Poller};
use crate::poll::items::ItemRegistry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("poll_cycle must be a positive number of seconds")]
    ZeroPollCycle,
    #[error("tool_timeout_ms must be positive")]
    ZeroToolTimeout,
    #[error("shortname must not be empty")]
    EmptyShortname,
}

/// Settings for one plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Writer identity attached to every push.
    pub shortname: String,
    /// Seconds between polls.
    pub poll_cycle: u64,
    pub uptime_path: PathBuf,
    pub thermal_path: PathBuf,
    /// Diagnostics program, name or absolute path.
    pub vcgencmd: String,
    /// Upper bound for one `vcgencmd` call, in milliseconds.
    pub tool_timeout_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            shortname: DEFAULT_SHORTNAME.to_string(),
            poll_cycle: 300,
            uptime_path: PathBuf::from(DEFAULT_UPTIME_PATH),
            thermal_path: PathBuf::from(DEFAULT_THERMAL_PATH),
            vcgencmd: DEFAULT_VCGENCMD.to_string(),
            tool_timeout_ms: 5000,
        }
    }
}

impl PluginConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_cycle == 0 {
            return Err(ConfigError::ZeroPollCycle);
        }
        if self.tool_timeout_ms == 0 {
            return Err(ConfigError::ZeroToolTimeout);
        }
        if self.shortname.trim().is_empty() {
            return Err(ConfigError::EmptyShortname);
        }
        Ok(())
    }

    pub fn poll_cycle(&self) -> Duration {
        Duration::from_secs(self.poll_cycle)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    /// Command runner bounded by the configured timeout.
    pub fn command(&self) -> SystemCommand {
        SystemCommand::new(self.tool_timeout())
    }

    /// Reader over `fs` and `runner` using the configured endpoints.
    pub fn reader<F: FileSystem, C: CommandRunner>(&self, fs: F, runner: C) -> SystemReader<F, C> {
        SystemReader::new(fs, runner)
            .with_uptime_path(&self.uptime_path)
            .with_thermal_path(&self.thermal_path)
            .with_vcgencmd(&self.vcgencmd)
    }

    /// Validates the configuration and builds a stopped plugin.
    pub fn build_plugin<F, C>(
        &self,
        fs: F,
        runner: C,
        items: ItemRegistry,
    ) -> Result<Plugin<F, C>, ConfigError>
    where
        F: FileSystem + 'static,
        C: CommandRunner + 'static,
    {
        self.validate()?;
        let poller = Poller::new(self.reader(fs, runner), items).with_writer(&self.shortname);
        Ok(Plugin::new(poller, self.poll_cycle()))
    }
}
