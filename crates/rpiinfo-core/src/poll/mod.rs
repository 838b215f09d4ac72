//! Periodic polling: item binding, scheduling and the poll cycle itself.

pub mod coordinator;
pub mod items;
pub mod scheduler;

pub use coordinator::{DEFAULT_SHORTNAME, POLL_JOB, PollState, PollSummary, Poller, Plugin};
pub use items::{InfoFunc, ItemRegistry, RecordingSink, UnknownFunc, Update, UpdateSink, Value};
pub use scheduler::{Job, ManualScheduler, Scheduler, SchedulerError, ThreadScheduler};
