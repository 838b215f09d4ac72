//! rpiinfod - Raspberry Pi status daemon.
//!
//! Polls uptime, CPU temperature, ARM clock and throttling flags on a fixed
//! cycle and reports every value to the log, or as JSON lines on stdout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_os = "linux"))]
use rpiinfo_core::collector::{MockCommand, MockFs};
#[cfg(target_os = "linux")]
use rpiinfo_core::collector::RealFs;
use rpiinfo_core::collector::{CommandRunner, FileSystem};
use rpiinfo_core::config::PluginConfig;
use rpiinfo_core::fmt::format_temperature;
use rpiinfo_core::poll::{InfoFunc, ItemRegistry, ThreadScheduler, UpdateSink, Value};

/// Raspberry Pi status daemon.
#[derive(Parser)]
#[command(name = "rpiinfod", about = "Raspberry Pi status daemon", version)]
struct Args {
    /// Poll cycle in seconds.
    #[arg(short = 'i', long, default_value = "300")]
    poll_cycle: u64,

    /// Writer identity attached to every update.
    #[arg(long, default_value = "rpi_info")]
    shortname: String,

    /// Path to the uptime counter.
    #[arg(long, default_value = "/proc/uptime")]
    uptime_path: String,

    /// Path to the thermal zone counter.
    #[arg(long, default_value = "/sys/class/thermal/thermal_zone0/temp")]
    thermal_path: String,

    /// Diagnostics program used for clock and throttling state.
    #[arg(long, default_value = "vcgencmd")]
    vcgencmd: String,

    /// Timeout for one vcgencmd call, in milliseconds.
    #[arg(long, default_value = "5000")]
    tool_timeout_ms: u64,

    /// Comma-separated status functions to report (default: all).
    #[arg(long, value_delimiter = ',', value_parser = parse_func)]
    items: Vec<InfoFunc>,

    /// Poll once, print the values and exit.
    #[arg(long)]
    once: bool,

    /// Print updates as JSON lines on stdout instead of logging them.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn config(&self) -> PluginConfig {
        PluginConfig {
            shortname: self.shortname.clone(),
            poll_cycle: self.poll_cycle,
            uptime_path: self.uptime_path.clone().into(),
            thermal_path: self.thermal_path.clone().into(),
            vcgencmd: self.vcgencmd.clone(),
            tool_timeout_ms: self.tool_timeout_ms,
        }
    }

    fn funcs(&self) -> Vec<InfoFunc> {
        if self.items.is_empty() {
            InfoFunc::ALL.to_vec()
        } else {
            self.items.clone()
        }
    }
}

fn parse_func(s: &str) -> Result<InfoFunc, String> {
    s.parse().map_err(|e: rpiinfo_core::poll::UnknownFunc| e.to_string())
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["rpiinfod", "rpiinfo_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// One update as printed with `--json`.
#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    item: &'a str,
    value: &'a Value,
    writer: &'a str,
}

/// Item sink that reports updates on the console.
struct ConsoleSink {
    path: String,
    func: InfoFunc,
    json: bool,
}

impl ConsoleSink {
    fn new(func: InfoFunc, json: bool) -> Self {
        Self {
            path: format!("rpi.{}", func),
            func,
            json,
        }
    }

    fn render(&self, value: &Value) -> String {
        match (self.func, value) {
            (InfoFunc::Temp, Value::Float(c)) => format_temperature(*c),
            (InfoFunc::Frequency, Value::Int(mhz)) => format!("{} MHz", mhz),
            (InfoFunc::Condition(condition), Value::Bool(true)) => {
                format!("true ({})", condition.label())
            }
            _ => value.to_string(),
        }
    }
}

impl UpdateSink for ConsoleSink {
    fn path(&self) -> &str {
        &self.path
    }

    fn push(&self, value: Value, writer: &str, _source: Option<&str>, _dest: Option<&str>) {
        if self.json {
            let record = Record {
                timestamp: chrono::Utc::now().to_rfc3339(),
                item: &self.path,
                value: &value,
                writer,
            };
            match serde_json::to_string(&record) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("cannot encode {}: {}", self.path, e),
            }
        } else {
            info!("{} = {}", self.path, self.render(&value));
        }
    }
}

fn bind_items(funcs: &[InfoFunc], json: bool) -> ItemRegistry {
    let mut items = ItemRegistry::new();
    for &func in funcs {
        items.bind(func, Arc::new(ConsoleSink::new(func, json)));
    }
    items
}

fn run<F, C>(args: &Args, fs: F, runner: C) -> anyhow::Result<()>
where
    F: FileSystem + 'static,
    C: CommandRunner + 'static,
{
    let config = args.config();
    for path in [&config.uptime_path, &config.thermal_path] {
        if !fs.exists(path) {
            warn!("{} does not exist, its values will be missing", path.display());
        }
    }

    let items = bind_items(&args.funcs(), args.json);
    let mut plugin = config
        .build_plugin(fs, runner, items)
        .context("invalid configuration")?;

    if args.once {
        let summary = plugin.poll_now();
        debug!("poll took {:?}", summary.elapsed);
        if !summary.is_complete() {
            bail!("could not read {}", summary.failed.join(", "));
        }
        return Ok(());
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    // The scheduler waits one cycle before the first tick.
    let summary = plugin.poll_now();
    info!(
        "Initial poll: {} updates, {} failures",
        summary.pushed,
        summary.failed.len()
    );

    let scheduler = ThreadScheduler::new();
    plugin
        .start(&scheduler)
        .context("cannot schedule poll cycle")?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Shutting down...");
    plugin
        .stop(&scheduler)
        .context("cannot stop poll cycle")?;
    info!("Shutdown complete");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("rpiinfod {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: poll_cycle={}s, uptime={}, thermal={}, vcgencmd={} (timeout {}ms)",
        args.poll_cycle, args.uptime_path, args.thermal_path, args.vcgencmd, args.tool_timeout_ms
    );

    #[cfg(target_os = "linux")]
    let result = run(&args, RealFs::new(), args.config().command());
    #[cfg(not(target_os = "linux"))]
    let result = {
        warn!("not running on Linux, reporting simulated values");
        run(&args, MockFs::raspberry_pi(), MockCommand::healthy_pi())
    };

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpiinfo_core::flags::ThrottleCondition;

    #[test]
    fn args_default_to_all_items() {
        let args = Args::parse_from(["rpiinfod"]);
        assert_eq!(args.funcs().len(), 12);
        assert_eq!(args.config(), PluginConfig::default());
    }

    #[test]
    fn args_parse_item_list() {
        let args = Args::parse_from(["rpiinfod", "--items", "temp,under_voltage", "-i", "60"]);
        assert_eq!(
            args.funcs(),
            vec![
                InfoFunc::Temp,
                InfoFunc::Condition(ThrottleCondition::UnderVoltage)
            ]
        );
        assert_eq!(args.config().poll_cycle, 60);
    }

    #[test]
    fn args_reject_unknown_item() {
        assert!(Args::try_parse_from(["rpiinfod", "--items", "cpu_load"]).is_err());
    }

    #[test]
    fn console_sink_renders_units_and_labels() {
        let temp = ConsoleSink::new(InfoFunc::Temp, false);
        assert_eq!(temp.path(), "rpi.temp");
        assert_eq!(temp.render(&Value::Float(45.6)), "45.6°C");

        let freq = ConsoleSink::new(InfoFunc::Frequency, false);
        assert_eq!(freq.render(&Value::Int(600)), "600 MHz");

        let uv = ConsoleSink::new(InfoFunc::Condition(ThrottleCondition::UnderVoltage), false);
        assert_eq!(uv.render(&Value::Bool(true)), "true (Under-voltage!)");
        assert_eq!(uv.render(&Value::Bool(false)), "false");
    }

    #[test]
    fn record_serializes_plain_values() {
        let value = Value::Float(45.6);
        let record = Record {
            timestamp: "2024-01-01T00:00:00+00:00".into(),
            item: "rpi.temp",
            value: &value,
            writer: "rpi_info",
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["item"], "rpi.temp");
        assert_eq!(json["value"], 45.6);
        assert_eq!(json["writer"], "rpi_info");
    }
}
