//! Scheduler adapter: jobs fired by cron expressions.
//!
//! ```rust,ignore
//! let mut scheduler = CronScheduler::new();
//! scheduler.add("purge", "0 */5 * * * *", use_cron("purge", ByClone(Purge::default()), builder))?;
//! let handle = scheduler.start()?;
//! // ...
//! handle.shutdown();
//! ```
//!
//! Expressions have a leading seconds field (`sec min hour dom month dow [year]`)
//! and are evaluated in UTC.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{debug, error, info, warn};

use crate::context::{ContextBuilder, RequestContext};
use crate::handler::Job;
use crate::replicate::Replicate;

/// Poll interval of the scheduler's driver thread.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Adapt a job into a scheduler entry point.
///
/// The job runs against a detached context named `name`, normally the name
/// of the scheduler entry it is registered under. Errors from `run` are
/// logged and returned. Panics are not contained.
pub fn use_cron<H, R>(
    name: &str,
    source: R,
    builder: ContextBuilder,
) -> impl Fn() -> Result<()> + Send + Sync + Clone + 'static
where
    H: Job + 'static,
    R: Replicate<H>,
{
    let source = Arc::new(source);
    let name: Arc<str> = Arc::from(name);
    move || {
        let mut job = source.replicate();
        builder.attach(&mut job, RequestContext::detached(&name));

        job.pre_use();
        let result = job.run();
        if let Err(err) = &result {
            job.log().error(format_args!("[cron error] {name}: {err:#}"));
        }
        result
    }
}

/// What to do when an entry comes due while its previous run is still going.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overlap {
    /// Start another run alongside the previous one
    #[default]
    Allow,
    /// Skip this fire
    Skip,
}

/// Scheduler error
#[derive(Debug)]
pub enum CronError {
    /// The cron expression could not be parsed
    InvalidExpression { expr: String, reason: String },
    /// The driver thread could not be started
    Spawn(std::io::Error),
}

impl fmt::Display for CronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronError::InvalidExpression { expr, reason } => {
                write!(f, "invalid cron expression '{expr}': {reason}")
            }
            CronError::Spawn(e) => write!(f, "failed to start scheduler: {e}"),
        }
    }
}

impl std::error::Error for CronError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CronError::InvalidExpression { .. } => None,
            CronError::Spawn(e) => Some(e),
        }
    }
}

type JobFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

struct Entry {
    name: String,
    schedule: Schedule,
    job: JobFn,
    overlap: Overlap,
    running: Arc<AtomicBool>,
}

/// Clears an entry's running flag when the fire thread ends, unwinding included.
struct RunningGuard(Option<Arc<AtomicBool>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Some(flag) = &self.0 {
            flag.store(false, Ordering::Release);
        }
    }
}

impl Entry {
    fn next_after(&self, at: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(at).next()
    }

    /// Start one run on its own thread. Returns `false` when the fire was skipped.
    fn fire(&self) -> bool {
        let track = self.overlap == Overlap::Skip;
        if track && self.running.swap(true, Ordering::AcqRel) {
            debug!(job = %self.name, "Previous run still in progress, skipping fire");
            return false;
        }

        let job = Arc::clone(&self.job);
        let name = self.name.clone();
        let guard = RunningGuard(track.then(|| Arc::clone(&self.running)));
        let spawned = thread::Builder::new()
            .name(format!("cron-{}", self.name))
            .spawn(move || {
                let _guard = guard;
                run_fired(&name, &job);
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                // The closure, and with it the guard, was dropped by the failed spawn.
                error!(job = %self.name, error = %e, "Failed to spawn scheduled job thread");
                false
            }
        }
    }
}

/// Body of a fire thread. A job's error is its own to report, as
/// [`use_cron`] does, and is not logged again here.
fn run_fired(name: &str, job: &JobFn) {
    debug!(job = %name, "Scheduled job start");
    let _ = job();
}

/// Timer that fires registered jobs on their cron schedules.
pub struct CronScheduler {
    entries: Vec<Entry>,
    tick: Duration,
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CronScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            tick: DEFAULT_TICK,
        }
    }

    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Register a re-entrant job.
    pub fn add<F>(&mut self, name: &str, expr: &str, job: F) -> Result<&mut Self, CronError>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.add_with_overlap(name, expr, Overlap::Allow, job)
    }

    pub fn add_with_overlap<F>(
        &mut self,
        name: &str,
        expr: &str,
        overlap: Overlap,
        job: F,
    ) -> Result<&mut Self, CronError>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let schedule = Schedule::from_str(expr).map_err(|e| CronError::InvalidExpression {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        self.entries.push(Entry {
            name: name.to_string(),
            schedule,
            job: Arc::new(job),
            overlap,
            running: Arc::new(AtomicBool::new(false)),
        });
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the driver thread. Fires are missed, not replayed, if the
    /// driver falls behind by more than one period.
    pub fn start(self) -> Result<CronHandle, CronError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let CronScheduler { entries, tick } = self;

        let driver = thread::Builder::new()
            .name("cron-driver".to_string())
            .spawn(move || drive(&entries, tick, &stop_flag))
            .map_err(CronError::Spawn)?;

        Ok(CronHandle {
            stop,
            driver: Some(driver),
        })
    }
}

fn drive(entries: &[Entry], tick: Duration, stop: &AtomicBool) {
    info!(entries = entries.len(), "Scheduler started");
    let started = Utc::now();
    let mut due: Vec<Option<DateTime<Utc>>> =
        entries.iter().map(|e| e.next_after(&started)).collect();

    while !stop.load(Ordering::Acquire) {
        let now = Utc::now();
        for (entry, next) in entries.iter().zip(due.iter_mut()) {
            match *next {
                Some(at) if at <= now => {
                    entry.fire();
                    *next = entry.next_after(&now);
                }
                _ => {}
            }
        }
        thread::sleep(tick);
    }
    info!("Scheduler stopped");
}

/// Running scheduler. Dropping it stops the driver.
pub struct CronHandle {
    stop: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl CronHandle {
    /// Stop firing and wait for the driver thread. Runs already started are
    /// left to finish on their own threads.
    pub fn shutdown(mut self) {
        self.stop_driver();
    }

    fn stop_driver(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                warn!("Scheduler driver thread panicked");
            }
        }
    }
}

impl Drop for CronHandle {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handler::{Contextual, HandlerBase};
    use crate::replicate::ByClone;
    use std::io::{self, Write};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Instant;

    fn entry(overlap: Overlap, job: JobFn) -> Entry {
        Entry {
            name: "test".to_string(),
            schedule: Schedule::from_str("* * * * * *").unwrap(),
            job,
            overlap,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_invalid_expression() {
        let mut scheduler = CronScheduler::new();
        let err = scheduler
            .add("bad", "every tuesday", || Ok(()))
            .err()
            .unwrap();
        assert!(matches!(err, CronError::InvalidExpression { .. }));
        assert!(err.to_string().contains("every tuesday"));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_skip_refuses_while_running() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let job: JobFn = Arc::new(move || {
            let _ = release_rx.lock().unwrap().recv();
            Ok(())
        });
        let e = entry(Overlap::Skip, job);

        assert!(e.fire());
        assert!(!e.fire());

        release_tx.send(()).unwrap();
        assert!(wait_until(|| !e.running.load(Ordering::Acquire)));
        assert!(e.fire());
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_skip_flag_cleared_after_panic() {
        let job: JobFn = Arc::new(|| -> Result<()> { panic!("job exploded") });
        let e = entry(Overlap::Skip, job);
        assert!(e.fire());
        assert!(wait_until(|| !e.running.load(Ordering::Acquire)));
    }

    #[test]
    fn test_allow_fires_concurrently() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let job: JobFn = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Ok(())
        });
        let e = entry(Overlap::Allow, job);
        assert!(e.fire());
        assert!(e.fire());
        assert!(wait_until(|| count.load(Ordering::SeqCst) == 2));
    }

    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || Sink(Arc::clone(&writer)))
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    #[derive(Clone, Default)]
    struct DiskFull {
        base: HandlerBase,
    }

    impl Contextual for DiskFull {
        fn base(&self) -> &HandlerBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut HandlerBase {
            &mut self.base
        }
    }

    impl Job for DiskFull {
        fn run(&mut self) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_failed_fire_reported_once() {
        let builder = ContextBuilder::new(AppConfig::new("pet-store", "10.9.8.7"));
        let job: JobFn = Arc::new(use_cron("purge", ByClone(DiskFull::default()), builder));

        let events = captured(|| run_fired("purge", &job));
        let reports: Vec<_> = events
            .iter()
            .filter(|e| e["level"] == "ERROR" || e["level"] == "WARN")
            .collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0]["fields"]["message"], "[cron error] purge: disk full");
        assert_eq!(reports[0]["fields"]["local_ip"], "10.9.8.7");
    }

    #[test]
    fn test_scheduler_fires_due_job() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut scheduler = CronScheduler::new().with_tick(Duration::from_millis(20));
        scheduler
            .add("tick", "* * * * * *", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        let handle = scheduler.start().unwrap();
        assert!(wait_until(|| count.load(Ordering::SeqCst) >= 1));
        handle.shutdown();
    }
}
