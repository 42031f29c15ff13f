//! Fixed-cadence analysis ticker
//!
//! Runs a tick callback on a dedicated thread against absolute deadlines
//! (`start + n * interval`), so slow ticks do not accumulate drift. When a
//! tick overruns one or more deadlines the missed ones are skipped, not
//! replayed in a burst.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Longest single sleep, bounds how long `stop` waits for the thread
const MAX_SLEEP: Duration = Duration::from_millis(10);

/// Spawns the tick thread
#[derive(Debug, Clone)]
pub struct SpectralSampler {
    interval: Duration,
    name: String,
}

/// Handle returned by [`SpectralSampler::spawn`] to stop ticking
pub struct SamplerHandle {
    stop_flag: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    missed: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl SpectralSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            name: "fsk-sampler".to_string(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking; `on_tick` returns `false` to end the thread
    pub fn spawn<F>(self, mut on_tick: F) -> Result<SamplerHandle>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));
        let missed = Arc::new(AtomicU64::new(0));

        let thread_stop = Arc::clone(&stop_flag);
        let thread_ticks = Arc::clone(&ticks);
        let thread_missed = Arc::clone(&missed);
        let interval = self.interval;

        let thread = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    // Sleep towards the deadline in short slices so stop is prompt
                    loop {
                        if thread_stop.load(Ordering::Acquire) {
                            return;
                        }
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        std::thread::sleep((deadline - now).min(MAX_SLEEP));
                    }

                    if !on_tick() {
                        tracing::debug!("Sampler tick requested exit");
                        return;
                    }
                    thread_ticks.fetch_add(1, Ordering::Relaxed);

                    deadline += interval;
                    let now = Instant::now();
                    while deadline <= now {
                        deadline += interval;
                        thread_missed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })?;

        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Sampler started");

        Ok(SamplerHandle {
            stop_flag,
            ticks,
            missed,
            thread: Some(thread),
        })
    }
}

impl SamplerHandle {
    /// Stop the tick thread and wait for it to finish
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(h) = self.thread.take() {
            if h.join().is_err() {
                tracing::error!("Sampler thread panicked");
            }
        }
    }

    /// Check if the tick thread is still alive
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Deadlines skipped because a tick overran
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
