//! Poll cycle coordination.
//!
//! `Poller` runs one read-decode-push cycle. `Plugin` wraps it in the
//! Stopped/Running state machine and wires it to the host scheduler.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::collector::reader::{ReadError, SystemReader};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::flags::decode;
use crate::fmt::format_uptime;
use crate::poll::items::{InfoFunc, ItemRegistry, Value};
use crate::poll::scheduler::{Scheduler, SchedulerError};

/// Name of the recurring job registered with the host scheduler.
pub const POLL_JOB: &str = "poll_device";

/// Default writer identity attached to every push.
pub const DEFAULT_SHORTNAME: &str = "rpi_info";

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Number of pushes to item sinks.
    pub pushed: usize,
    /// Names of the values that could not be read.
    pub failed: Vec<&'static str>,
    /// Wall time of the cycle.
    pub elapsed: Duration,
}

impl PollSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs poll cycles against a reader and pushes results to bound items.
///
/// Every value is read independently: a failing read is logged and the
/// remaining values are still read and pushed. Cycles are serialized: a
/// `poll` started while another is in flight waits for it to finish.
pub struct Poller<F: FileSystem, C: CommandRunner> {
    reader: SystemReader<F, C>,
    items: ItemRegistry,
    writer: String,
    cycle: Mutex<()>,
}

impl<F: FileSystem, C: CommandRunner> Poller<F, C> {
    pub fn new(reader: SystemReader<F, C>, items: ItemRegistry) -> Self {
        Self {
            reader,
            items,
            writer: DEFAULT_SHORTNAME.to_string(),
            cycle: Mutex::new(()),
        }
    }

    /// Sets the writer identity attached to pushes.
    pub fn with_writer(mut self, writer: impl Into<String>) -> Self {
        self.writer = writer.into();
        self
    }

    pub fn writer(&self) -> &str {
        &self.writer
    }

    /// Runs one full cycle.
    pub fn poll(&self) -> PollSummary {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let mut summary = PollSummary::default();

        match self.reader.read_uptime() {
            Ok(secs) => {
                summary.pushed += self.push(InfoFunc::Uptime, Value::Int(secs));
                summary.pushed +=
                    self.push(InfoFunc::UptimeString, Value::Text(format_uptime(secs)));
            }
            Err(e) => self.failed(&mut summary, "uptime", &e),
        }

        match self.reader.read_temperature() {
            Ok(celsius) => summary.pushed += self.push(InfoFunc::Temp, Value::Float(celsius)),
            Err(e) => self.failed(&mut summary, "temperature", &e),
        }

        match self.reader.read_clock_frequency() {
            Ok(mhz) => summary.pushed += self.push(InfoFunc::Frequency, Value::Int(mhz)),
            Err(e) => self.failed(&mut summary, "clock frequency", &e),
        }

        match self.reader.read_throttle_bitmask() {
            Ok(flags) => {
                let decoded = decode(flags);
                let labels = decoded.labels();
                if labels.is_empty() {
                    debug!("throttled=0x{:x}: no conditions", flags);
                } else {
                    debug!("throttled=0x{:x}: {}", flags, labels.join(" "));
                }
                for (condition, set) in decoded.iter() {
                    summary.pushed += self.push(InfoFunc::Condition(condition), Value::Bool(set));
                }
            }
            Err(e) => self.failed(&mut summary, "throttle bitmask", &e),
        }

        summary.elapsed = start.elapsed();
        summary
    }

    /// Pushes `value` to every item bound to `func`, returning the count.
    fn push(&self, func: InfoFunc, value: Value) -> usize {
        let mut count = 0;
        for sink in self.items.sinks_for(func) {
            debug!("{} = {} ({})", sink.path(), value, func);
            sink.push(value.clone(), &self.writer, None, None);
            count += 1;
        }
        count
    }

    fn failed(&self, summary: &mut PollSummary, what: &'static str, err: &ReadError) {
        warn!("poll: cannot read {}: {}", what, err);
        summary.failed.push(what);
    }
}

/// Lifecycle state of the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Stopped,
    Running,
}

/// Poll cycle coordinator with an explicit Stopped/Running state.
pub struct Plugin<F: FileSystem, C: CommandRunner> {
    poller: Arc<Poller<F, C>>,
    poll_cycle: Duration,
    state: PollState,
}

impl<F, C> Plugin<F, C>
where
    F: FileSystem + 'static,
    C: CommandRunner + 'static,
{
    pub fn new(poller: Poller<F, C>, poll_cycle: Duration) -> Self {
        Self {
            poller: Arc::new(poller),
            poll_cycle,
            state: PollState::Stopped,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn poll_cycle(&self) -> Duration {
        self.poll_cycle
    }

    pub fn writer(&self) -> &str {
        self.poller.writer()
    }

    /// Registers the recurring poll and enters `Running`.
    pub fn start(&mut self, scheduler: &dyn Scheduler) -> Result<(), SchedulerError> {
        if self.state == PollState::Running {
            warn!("start called while already running");
            return Ok(());
        }
        debug!("registering {} every {:?}", POLL_JOB, self.poll_cycle);

        let poller = Arc::clone(&self.poller);
        scheduler.register(
            POLL_JOB,
            Box::new(move || {
                let summary = poller.poll();
                debug!(
                    "poll: {} pushes, {} failures in {:?}",
                    summary.pushed,
                    summary.failed.len(),
                    summary.elapsed
                );
            }),
            self.poll_cycle,
        )?;

        self.state = PollState::Running;
        info!(
            "{} running, polling every {:?}",
            self.poller.writer(),
            self.poll_cycle
        );
        Ok(())
    }

    /// Deregisters the recurring poll and enters `Stopped`.
    ///
    /// The state is `Stopped` afterwards even if the scheduler reports an
    /// error.
    pub fn stop(&mut self, scheduler: &dyn Scheduler) -> Result<(), SchedulerError> {
        if self.state == PollState::Stopped {
            return Ok(());
        }
        debug!("deregistering {}", POLL_JOB);
        self.state = PollState::Stopped;
        scheduler.deregister(POLL_JOB)
    }

    /// Runs one cycle immediately, outside the scheduler.
    pub fn poll_now(&self) -> PollSummary {
        self.poller.poll()
    }

    /// Host notification that an item bound to this plugin changed.
    ///
    /// Returns `true` when the change came from outside the plugin while
    /// it is running. Changes written by the plugin itself are ignored.
    pub fn item_changed(
        &self,
        item: &str,
        caller: Option<&str>,
        source: Option<&str>,
        dest: Option<&str>,
    ) -> bool {
        if self.state != PollState::Running || caller == Some(self.poller.writer()) {
            return false;
        }
        info!("{} changed outside {}", item, self.poller.writer());
        debug!(
            "{} changed by caller={:?} source={:?} dest={:?}",
            item, caller, source, dest
        );
        true
    }
}
