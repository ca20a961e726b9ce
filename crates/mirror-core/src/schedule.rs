//! Fixed-interval pass scheduling
//!
//! Runs a pass, waits, runs the next. Passes never overlap: the wait starts
//! only once the previous pass has returned, however long it took.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info};

use crate::config::MirrorConfig;
use crate::reconciler::PassReport;
use crate::Result;

/// Source of waiting. Tests inject a clock that records instead of sleeping.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Asks a running [`Scheduler`] to stop after the current pass.
#[derive(Debug, Default, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Totals across all passes of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u64,
    pub failed_passes: u64,
    /// Events applied by successful passes
    pub events: usize,
}

/// Drives passes on a fixed interval.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_passes: Option<u64>,
    fail_fast: bool,
    stop: StopHandle,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_passes: None,
            fail_fast: false,
            stop: StopHandle::default(),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.interval())
            .with_max_passes(config.max_passes)
            .with_fail_fast(config.fail_fast)
    }

    pub fn with_max_passes(mut self, max_passes: Option<u64>) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run passes until the pass limit is hit or a stop is requested.
    ///
    /// A failed pass is logged and the loop carries on, unless fail-fast is
    /// set, in which case its error is returned.
    pub fn run<K, P>(&self, clock: &K, mut pass: P) -> Result<RunSummary>
    where
        K: Clock + ?Sized,
        P: FnMut() -> Result<PassReport>,
    {
        let mut summary = RunSummary::default();

        while !self.stop.is_stopped() {
            summary.passes += 1;
            match pass() {
                Ok(report) => {
                    summary.events += report.events.len();
                    info!(
                        pass = summary.passes,
                        events = report.events.len(),
                        files_compared = report.files_compared,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Synchronization pass complete"
                    );
                }
                Err(e) => {
                    summary.failed_passes += 1;
                    error!(pass = summary.passes, error = %e, "Synchronization pass failed");
                    if self.fail_fast {
                        return Err(e);
                    }
                }
            }

            let limit_reached = self.max_passes.is_some_and(|max| summary.passes >= max);
            if limit_reached || self.stop.is_stopped() {
                break;
            }
            clock.sleep(self.interval);
        }

        Ok(summary)
    }
}
