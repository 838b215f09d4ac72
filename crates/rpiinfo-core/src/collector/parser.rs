//! Parsers for the uptime and thermal endpoints and for `vcgencmd` output.
//!
//! These are pure functions over the raw text, so they are tested with
//! string inputs and never touch the system.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Parses `/proc/uptime` content into whole seconds since boot.
///
/// Format: `<uptime> <idle>`; only the first token is used and its
/// fractional part is truncated.
pub fn parse_uptime(content: &str) -> Result<u64, ParseError> {
    let token = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let seconds: f64 = token
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime {:?}", token)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ParseError::new(format!("invalid uptime {:?}", token)));
    }
    Ok(seconds as u64)
}

/// Parses a thermal-zone reading (milli-degrees Celsius) into degrees.
///
/// The reading is first truncated to whole tenths of a hundred
/// milli-degrees with integer division, then divided by ten in floating
/// point: `45678` becomes `456` and then `45.6`. Everything below 0.1 °C
/// is dropped before the final division.
pub fn parse_thermal(content: &str) -> Result<f64, ParseError> {
    let trimmed = content.trim();
    let milli: i64 = trimmed
        .parse()
        .map_err(|_| ParseError::new(format!("invalid temperature {:?}", trimmed)))?;
    Ok((milli / 100) as f64 / 10.0)
}

/// Splits `vcgencmd` output of the form `key=value` at the first `=`.
///
/// Returns `None` when there is no separator.
pub fn split_key_value(output: &str) -> Option<(&str, &str)> {
    output
        .trim()
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
}

/// Parses the value of `frequency(48)=<hz>` into whole megahertz.
pub fn parse_frequency_mhz(value: &str) -> Result<u64, ParseError> {
    let hz: u64 = value
        .parse()
        .map_err(|_| ParseError::new(format!("invalid frequency {:?}", value)))?;
    Ok(hz / 1_000_000)
}

/// Parses the value of `throttled=<hex>` into the raw bitmask.
///
/// The `0x` prefix is optional.
pub fn parse_throttled(value: &str) -> Result<u32, ParseError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
        .map_err(|_| ParseError::new(format!("invalid throttle bitmask {:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("12345.67 8900.11\n").unwrap(), 12345);
        assert_eq!(parse_uptime("0.99 0.50").unwrap(), 0);
        assert_eq!(parse_uptime("42").unwrap(), 42);
    }

    #[test]
    fn test_parse_uptime_invalid() {
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("   \n").is_err());
        assert!(parse_uptime("abc 1.0").is_err());
        assert!(parse_uptime("-5.0 1.0").is_err());
        assert!(parse_uptime("inf 1.0").is_err());
    }

    #[test]
    fn test_parse_thermal_truncates_before_dividing() {
        assert_eq!(parse_thermal("45678").unwrap(), 45.6);
        assert_eq!(parse_thermal("45699\n").unwrap(), 45.6);
        assert_eq!(parse_thermal("45000").unwrap(), 45.0);
        assert_eq!(parse_thermal("99").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_thermal_negative_truncates_toward_zero() {
        assert_eq!(parse_thermal("-1550").unwrap(), -1.5);
    }

    #[test]
    fn test_parse_thermal_invalid() {
        assert!(parse_thermal("").is_err());
        assert!(parse_thermal("45.678").is_err());
        assert!(parse_thermal("hot").is_err());
    }

    #[test]
    fn test_split_key_value() {
        assert_eq!(
            split_key_value("frequency(48)=600000000\n"),
            Some(("frequency(48)", "600000000"))
        );
        assert_eq!(split_key_value("throttled=0x0"), Some(("throttled", "0x0")));
        assert_eq!(split_key_value("error"), None);
    }

    #[test]
    fn test_parse_frequency_mhz() {
        assert_eq!(parse_frequency_mhz("600000000").unwrap(), 600);
        assert_eq!(parse_frequency_mhz("1500398464").unwrap(), 1500);
        assert_eq!(parse_frequency_mhz("999999").unwrap(), 0);
        assert!(parse_frequency_mhz("fast").is_err());
    }

    #[test]
    fn test_parse_throttled() {
        assert_eq!(parse_throttled("0x50005").unwrap(), 0x50005);
        assert_eq!(parse_throttled("0X80008").unwrap(), 0x80008);
        assert_eq!(parse_throttled("50005").unwrap(), 0x50005);
        assert_eq!(parse_throttled("0x0").unwrap(), 0);
        assert_eq!(parse_throttled("0xffffffff").unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_throttled_invalid() {
        assert!(parse_throttled("").is_err());
        assert!(parse_throttled("0x").is_err());
        assert!(parse_throttled("0xZZ").is_err());
        assert!(parse_throttled("0x100000000").is_err());
    }
}
