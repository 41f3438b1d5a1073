//! Background poll loop.
//!
//! Two states, Running and Stopped. Each cycle sleeps for the poll interval,
//! takes the controller lock, refreshes the controller flag and every axis,
//! then releases the lock. The running flag is checked outside the lock, so
//! shutdown waits at most one interval plus one cycle.

use crate::controller::ControllerShared;
use atto_common::motor::{MotorError, MotorResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cycle timing statistics for the poll loop.
#[derive(Debug, Default)]
struct TimingStats {
    /// Number of cycles executed
    cycle_count: u64,
    /// Cycles that took longer than the poll interval
    overruns: u64,
    /// Maximum observed cycle time
    max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    total_cycle_time_us: u64,
}

impl TimingStats {
    fn record(&mut self, cycle_time: Duration, interval: Duration, port: &str) {
        let cycle_time_us = u64::try_from(cycle_time.as_micros()).unwrap_or(u64::MAX);
        self.cycle_count += 1;
        self.total_cycle_time_us = self.total_cycle_time_us.saturating_add(cycle_time_us);
        self.max_cycle_time_us = self.max_cycle_time_us.max(cycle_time_us);

        if cycle_time > interval {
            self.overruns += 1;
            if self.overruns <= 10 || self.overruns % 1000 == 0 {
                warn!(
                    "Poll overrun #{} on {}: cycle took {}us (interval {}ms)",
                    self.overruns,
                    port,
                    cycle_time_us,
                    interval.as_millis()
                );
            }
        }
    }

    fn average_us(&self) -> u64 {
        self.total_cycle_time_us.checked_div(self.cycle_count).unwrap_or(0)
    }
}

/// Handle to a running poll thread.
#[derive(Debug)]
pub(crate) struct PollLoop {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    /// Spawn the poll thread for `shared`.
    pub(crate) fn start(shared: Arc<ControllerShared>) -> MotorResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("atto-poll-{}", shared.port))
            .spawn(move || run(&shared, &flag))
            .map_err(|e| MotorError::PollThread(e.to_string()))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Signal the loop to stop and join it. Idempotent.
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &ControllerShared, running: &AtomicBool) {
    let interval = shared.timing.poll_interval;
    let port = shared.port.as_str();
    let mut stats = TimingStats::default();
    info!("Poll loop running for {} (interval={}ms)", port, interval.as_millis());

    while running.load(Ordering::SeqCst) {
        // park_timeout may wake early; unpark from stop() cuts the sleep short.
        let deadline = Instant::now() + interval;
        loop {
            let now = Instant::now();
            if now >= deadline || !running.load(Ordering::SeqCst) {
                break;
            }
            thread::park_timeout(deadline - now);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let cycle_start = Instant::now();
        {
            let mut state = shared.state.lock();
            shared.poll_cycle(&mut state);
        }
        shared.poll_cycles.fetch_add(1, Ordering::Relaxed);
        stats.record(cycle_start.elapsed(), interval, port);

        if stats.cycle_count % 600 == 0 {
            debug!(
                "Poll loop {}: {} cycles, avg={}us, max={}us, overruns={}",
                port,
                stats.cycle_count,
                stats.average_us(),
                stats.max_cycle_time_us,
                stats.overruns
            );
        }
    }

    info!(
        "Poll loop stopped for {} after {} cycles (avg={}us, max={}us)",
        port,
        stats.cycle_count,
        stats.average_us(),
        stats.max_cycle_time_us
    );
}
