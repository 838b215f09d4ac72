//! Shared formatting helpers.

/// Format an uptime in seconds the way home-automation frontends expect it:
/// `"H:MM:SS"`, prefixed with `"1 day, "` or `"N days, "` once it exceeds
/// a day.
///
/// `0` → `"0:00:00"`, `3723` → `"1:02:03"`, `90061` → `"1 day, 1:01:01"`
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let clock = format!("{}:{:02}:{:02}", hours, minutes, seconds);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Format a temperature in degrees Celsius with one decimal digit.
pub fn format_temperature(celsius: f64) -> String {
    format!("{:.1}°C", celsius)
}
