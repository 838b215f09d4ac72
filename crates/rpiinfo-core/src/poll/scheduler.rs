//! The host scheduler interface and a thread-backed implementation.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error};

/// Callback invoked on every tick of a job.
pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Steps in which the sleep between ticks is checked for cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job {0:?} is already registered")]
    AlreadyRegistered(String),
    #[error("job {0:?} is not registered")]
    NotRegistered(String),
    #[error("cannot start job thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Periodic job registry provided by the host.
///
/// A registered job never runs concurrently with itself. After
/// `deregister` returns, no new tick of that job starts.
pub trait Scheduler: Send + Sync {
    fn register(&self, name: &str, job: Job, period: Duration) -> Result<(), SchedulerError>;

    fn deregister(&self, name: &str) -> Result<(), SchedulerError>;
}

struct JobHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Runs each job on its own thread, first tick one period after
/// registration.
#[derive(Default)]
pub struct ThreadScheduler {
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Deregisters every job.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.lock().keys().cloned().collect();
        for name in names {
            let _ = self.deregister(&name);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobHandle>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ThreadScheduler {
    fn register(&self, name: &str, mut job: Job, period: Duration) -> Result<(), SchedulerError> {
        let mut jobs = self.lock();
        if jobs.contains_key(name) {
            return Err(SchedulerError::AlreadyRegistered(name.to_string()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        let thread = std::thread::Builder::new()
            .name(format!("sched-{}", name))
            .spawn(move || {
                while r.load(Ordering::SeqCst) {
                    let mut remaining = period;
                    while remaining > Duration::ZERO && r.load(Ordering::SeqCst) {
                        let sleep_time = remaining.min(SLEEP_SLICE);
                        std::thread::sleep(sleep_time);
                        remaining = remaining.saturating_sub(sleep_time);
                    }
                    if !r.load(Ordering::SeqCst) {
                        break;
                    }
                    job();
                }
            })?;

        debug!("registered job {} every {:?}", name, period);
        jobs.insert(name.to_string(), JobHandle { running, thread });
        Ok(())
    }

    fn deregister(&self, name: &str) -> Result<(), SchedulerError> {
        let handle = self
            .lock()
            .remove(name)
            .ok_or_else(|| SchedulerError::NotRegistered(name.to_string()))?;

        handle.running.store(false, Ordering::SeqCst);
        // A job deregistering itself cannot wait for its own thread.
        if handle.thread.thread().id() != std::thread::current().id()
            && handle.thread.join().is_err()
        {
            error!("job {} panicked", name);
        }
        debug!("deregistered job {}", name);
        Ok(())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scheduler that only runs a job when told to.
///
/// Lets hosts and tests drive ticks deterministically. A job may call back
/// into the scheduler, including to deregister itself.
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<HashMap<String, (Arc<Mutex<Job>>, Duration)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one tick of `name`. Returns `false` if it is not registered.
    pub fn fire(&self, name: &str) -> bool {
        let Some(job) = self.lock().get(name).map(|(job, _)| Arc::clone(job)) else {
            return false;
        };
        let mut job = job.lock().unwrap_or_else(PoisonError::into_inner);
        job();
        true
    }

    pub fn period(&self, name: &str) -> Option<Duration> {
        self.lock().get(name).map(|(_, period)| *period)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.period(name).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Arc<Mutex<Job>>, Duration)>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn register(&self, name: &str, job: Job, period: Duration) -> Result<(), SchedulerError> {
        let mut jobs = self.lock();
        if jobs.contains_key(name) {
            return Err(SchedulerError::AlreadyRegistered(name.to_string()));
        }
        jobs.insert(name.to_string(), (Arc::new(Mutex::new(job)), period));
        Ok(())
    }

    fn deregister(&self, name: &str) -> Result<(), SchedulerError> {
        self.lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::NotRegistered(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn counter_job(count: &Arc<AtomicUsize>) -> Job {
        let count = count.clone();
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_thread_scheduler_ticks_until_deregistered() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("poll", counter_job(&count), Duration::from_millis(10))
            .unwrap();
        assert!(scheduler.is_registered("poll"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        scheduler.deregister("poll").unwrap();
        assert!(!scheduler.is_registered("poll"));

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_thread_scheduler_rejects_duplicates() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("poll", counter_job(&count), Duration::from_secs(60))
            .unwrap();
        let err = scheduler
            .register("poll", counter_job(&count), Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRegistered(_)));
        assert!(matches!(
            scheduler.deregister("other").unwrap_err(),
            SchedulerError::NotRegistered(_)
        ));
    }

    #[test]
    fn test_thread_scheduler_stops_promptly_during_long_period() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("poll", counter_job(&count), Duration::from_secs(3600))
            .unwrap();

        let start = Instant::now();
        scheduler.deregister("poll").unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_scheduler() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("poll", counter_job(&count), Duration::from_secs(300))
            .unwrap();

        assert_eq!(scheduler.period("poll"), Some(Duration::from_secs(300)));
        assert!(scheduler.fire("poll"));
        assert!(scheduler.fire("poll"));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scheduler.deregister("poll").unwrap();
        assert!(!scheduler.fire("poll"));
        assert!(!scheduler.is_registered("poll"));
    }

    #[test]
    fn test_manual_job_can_deregister_itself() {
        let scheduler = Arc::new(ManualScheduler::new());
        let count = Arc::new(AtomicUsize::new(0));
        let (s, c) = (Arc::clone(&scheduler), Arc::clone(&count));
        scheduler
            .register(
                "once",
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    s.deregister("once").unwrap();
                }),
                Duration::from_secs(1),
            )
            .unwrap();

        assert!(scheduler.fire("once"));
        assert!(!scheduler.is_registered("once"));
        assert!(!scheduler.fire("once"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poisoned_registry_still_deregisters() {
        let scheduler = ThreadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("poll", counter_job(&count), Duration::from_secs(3600))
            .unwrap();

        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = scheduler.jobs.lock().unwrap();
                panic!("poison the job table");
            })
            .join()
        });
        assert!(scheduler.jobs.is_poisoned());

        assert!(scheduler.is_registered("poll"));
        scheduler.deregister("poll").unwrap();
        assert!(!scheduler.is_registered("poll"));
    }
}
