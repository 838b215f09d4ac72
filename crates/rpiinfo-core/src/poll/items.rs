//! Item binding and the update sink the host implements.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::flags::ThrottleCondition;

/// A status function an item can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoFunc {
    Uptime,
    UptimeString,
    Temp,
    Frequency,
    Condition(ThrottleCondition),
}

impl InfoFunc {
    /// Every function, in the order a poll pushes them.
    pub const ALL: [InfoFunc; 12] = [
        InfoFunc::Uptime,
        InfoFunc::UptimeString,
        InfoFunc::Temp,
        InfoFunc::Frequency,
        InfoFunc::Condition(ThrottleCondition::UnderVoltage),
        InfoFunc::Condition(ThrottleCondition::FrequencyCapped),
        InfoFunc::Condition(ThrottleCondition::Throttled),
        InfoFunc::Condition(ThrottleCondition::SoftTempLimit),
        InfoFunc::Condition(ThrottleCondition::UnderVoltageOccurred),
        InfoFunc::Condition(ThrottleCondition::ThrottledOccurred),
        InfoFunc::Condition(ThrottleCondition::FrequencyCappedOccurred),
        InfoFunc::Condition(ThrottleCondition::SoftTempLimitOccurred),
    ];

    /// Name used in item configuration.
    pub const fn name(self) -> &'static str {
        match self {
            InfoFunc::Uptime => "uptime",
            InfoFunc::UptimeString => "uptime_string",
            InfoFunc::Temp => "temp",
            InfoFunc::Frequency => "frequency",
            InfoFunc::Condition(c) => match c {
                ThrottleCondition::UnderVoltage => "under_voltage",
                ThrottleCondition::FrequencyCapped => "frequency_capped",
                ThrottleCondition::Throttled => "throttled",
                ThrottleCondition::SoftTempLimit => "temp_limit",
                ThrottleCondition::UnderVoltageOccurred => "under_voltage_last_reboot",
                ThrottleCondition::ThrottledOccurred => "throttled_last_reboot",
                ThrottleCondition::FrequencyCappedOccurred => "frequency_capped_last_reboot",
                ThrottleCondition::SoftTempLimitOccurred => "temp_limit_last_reboot",
            },
        }
    }
}

impl fmt::Display for InfoFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status function {0:?}")]
pub struct UnknownFunc(pub String);

impl FromStr for InfoFunc {
    type Err = UnknownFunc;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        InfoFunc::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFunc(s.to_string()))
    }
}

/// A value pushed to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

/// Receiver of pushed values, implemented by the host for each item.
///
/// `writer` identifies the component that produced the value so the host
/// can tell self-driven updates from external ones.
pub trait UpdateSink: Send + Sync {
    /// Item path, used in log messages.
    fn path(&self) -> &str;

    fn push(&self, value: Value, writer: &str, source: Option<&str>, dest: Option<&str>);
}

/// Items bound to status functions.
#[derive(Clone, Default)]
pub struct ItemRegistry {
    items: Vec<(InfoFunc, Arc<dyn UpdateSink>)>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an item to a status function.
    pub fn bind(&mut self, func: InfoFunc, sink: Arc<dyn UpdateSink>) {
        tracing::debug!("bind item {} to {}", sink.path(), func);
        self.items.push((func, sink));
    }

    /// Binds an item by the function name from its configuration.
    pub fn bind_by_name(&mut self, func: &str, sink: Arc<dyn UpdateSink>) -> Result<(), UnknownFunc> {
        let func = func.parse()?;
        self.bind(func, sink);
        Ok(())
    }

    /// Items bound to `func`.
    pub fn sinks_for(&self, func: InfoFunc) -> impl Iterator<Item = &Arc<dyn UpdateSink>> {
        self.items
            .iter()
            .filter(move |(f, _)| *f == func)
            .map(|(_, sink)| sink)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One recorded push.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub value: Value,
    pub writer: String,
    pub source: Option<String>,
    pub dest: Option<String>,
}

/// Sink that keeps every push in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    path: String,
    updates: Mutex<Vec<Update>>,
}

impl RecordingSink {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updates(&self) -> Vec<Update> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Most recent value, if any.
    pub fn last(&self) -> Option<Value> {
        self.updates
            .lock()
            .ok()
            .and_then(|u| u.last().map(|up| up.value.clone()))
    }
}

impl UpdateSink for RecordingSink {
    fn path(&self) -> &str {
        &self.path
    }

    fn push(&self, value: Value, writer: &str, source: Option<&str>, dest: Option<&str>) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(Update {
                value,
                writer: writer.to_string(),
                source: source.map(str::to_string),
                dest: dest.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_func_names_round_trip() {
        for func in InfoFunc::ALL {
            assert_eq!(func.name().parse::<InfoFunc>().unwrap(), func);
            assert_eq!(func.to_string(), func.name());
        }
        assert_eq!(
            "temp_limit_last_reboot".parse::<InfoFunc>().unwrap(),
            InfoFunc::Condition(ThrottleCondition::SoftTempLimitOccurred)
        );
    }

    #[test]
    fn test_info_func_unknown_name() {
        let err = "cpu_load".parse::<InfoFunc>().unwrap_err();
        assert_eq!(err, UnknownFunc("cpu_load".into()));
        assert_eq!(err.to_string(), "unknown status function \"cpu_load\"");
    }

    #[test]
    fn test_registry_binds_by_name() {
        let mut registry = ItemRegistry::new();
        let temp = Arc::new(RecordingSink::new("pi.temp"));
        let other = Arc::new(RecordingSink::new("pi.temp_copy"));
        registry.bind_by_name("temp", temp).unwrap();
        registry.bind(InfoFunc::Temp, other);
        assert!(registry.bind_by_name("nope", Arc::new(RecordingSink::new("x"))).is_err());

        assert_eq!(registry.len(), 2);
        let paths: Vec<&str> = registry.sinks_for(InfoFunc::Temp).map(|s| s.path()).collect();
        assert_eq!(paths, vec!["pi.temp", "pi.temp_copy"]);
        assert_eq!(registry.sinks_for(InfoFunc::Uptime).count(), 0);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(600).to_string(), "600");
        assert_eq!(Value::Float(45.6).to_string(), "45.6");
        assert_eq!(Value::Text("1 day, 0:00:00".into()).to_string(), "1 day, 0:00:00");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new("pi.uptime");
        assert_eq!(sink.last(), None);
        sink.push(Value::Int(1), "rpi_info", None, Some("knx"));
        sink.push(Value::Int(2), "rpi_info", None, None);

        let updates = sink.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].dest.as_deref(), Some("knx"));
        assert_eq!(sink.last(), Some(Value::Int(2)));
    }
}
