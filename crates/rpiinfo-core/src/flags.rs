//! Decoding of the `vcgencmd get_throttled` bitmask.
//!
//! Bits 0-3 describe the current state of the board. Bits 16-19 are sticky
//! counterparts that stay set once the matching condition has occurred
//! since the last reboot. All other bits are ignored.

use std::fmt;

/// Raw throttling bitmask as reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ThrottleFlags(pub u32);

impl ThrottleFlags {
    /// Returns whether the bit of `condition` is set.
    pub fn is_set(self, condition: ThrottleCondition) -> bool {
        (self.0 >> condition.bit()) & 1 == 1
    }
}

impl From<u32> for ThrottleFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::LowerHex for ThrottleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// One named condition of the throttling bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThrottleCondition {
    UnderVoltage,
    FrequencyCapped,
    Throttled,
    SoftTempLimit,
    UnderVoltageOccurred,
    ThrottledOccurred,
    FrequencyCappedOccurred,
    SoftTempLimitOccurred,
}

impl ThrottleCondition {
    /// All conditions in bit order.
    pub const ALL: [ThrottleCondition; 8] = [
        ThrottleCondition::UnderVoltage,
        ThrottleCondition::FrequencyCapped,
        ThrottleCondition::Throttled,
        ThrottleCondition::SoftTempLimit,
        ThrottleCondition::UnderVoltageOccurred,
        ThrottleCondition::ThrottledOccurred,
        ThrottleCondition::FrequencyCappedOccurred,
        ThrottleCondition::SoftTempLimitOccurred,
    ];

    /// Bit position in the bitmask.
    pub const fn bit(self) -> u32 {
        match self {
            ThrottleCondition::UnderVoltage => 0,
            ThrottleCondition::FrequencyCapped => 1,
            ThrottleCondition::Throttled => 2,
            ThrottleCondition::SoftTempLimit => 3,
            ThrottleCondition::UnderVoltageOccurred => 16,
            ThrottleCondition::ThrottledOccurred => 17,
            ThrottleCondition::FrequencyCappedOccurred => 18,
            ThrottleCondition::SoftTempLimitOccurred => 19,
        }
    }

    /// Human-readable label used in logs and displays.
    pub const fn label(self) -> &'static str {
        match self {
            ThrottleCondition::UnderVoltage => "Under-voltage!",
            ThrottleCondition::FrequencyCapped => "ARM frequency capped!",
            ThrottleCondition::Throttled => "Currently throttled!",
            ThrottleCondition::SoftTempLimit => "Soft temperature limit active",
            ThrottleCondition::UnderVoltageOccurred => {
                "Under-voltage has occurred since last reboot."
            }
            ThrottleCondition::ThrottledOccurred => "Throttling has occurred since last reboot.",
            ThrottleCondition::FrequencyCappedOccurred => {
                "ARM frequency capped has occurred since last reboot."
            }
            ThrottleCondition::SoftTempLimitOccurred => "Soft temperature limit has occurred",
        }
    }

    /// Whether this is one of the sticky "since last reboot" bits.
    pub const fn is_historic(self) -> bool {
        self.bit() >= 16
    }
}

impl fmt::Display for ThrottleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded state of every [`ThrottleCondition`], in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedFlags([bool; 8]);

impl DecodedFlags {
    pub fn get(&self, condition: ThrottleCondition) -> bool {
        self.0[index_of(condition)]
    }

    /// Iterates over `(condition, value)` pairs in bit order.
    pub fn iter(&self) -> impl Iterator<Item = (ThrottleCondition, bool)> + '_ {
        ThrottleCondition::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Conditions that are set.
    pub fn active(&self) -> Vec<ThrottleCondition> {
        self.iter().filter(|(_, set)| *set).map(|(c, _)| c).collect()
    }

    /// Labels of the conditions that are set.
    pub fn labels(&self) -> Vec<&'static str> {
        self.active().into_iter().map(ThrottleCondition::label).collect()
    }
}

fn index_of(condition: ThrottleCondition) -> usize {
    match condition {
        ThrottleCondition::UnderVoltage => 0,
        ThrottleCondition::FrequencyCapped => 1,
        ThrottleCondition::Throttled => 2,
        ThrottleCondition::SoftTempLimit => 3,
        ThrottleCondition::UnderVoltageOccurred => 4,
        ThrottleCondition::ThrottledOccurred => 5,
        ThrottleCondition::FrequencyCappedOccurred => 6,
        ThrottleCondition::SoftTempLimitOccurred => 7,
    }
}

/// Decodes a bitmask into the eight named conditions.
pub fn decode(flags: ThrottleFlags) -> DecodedFlags {
    let mut decoded = [false; 8];
    for (slot, condition) in decoded.iter_mut().zip(ThrottleCondition::ALL) {
        *slot = flags.is_set(condition);
    }
    DecodedFlags(decoded)
}
