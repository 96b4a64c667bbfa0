//! The pacing driver.
//!
//! A `TickTimer` invokes a callback on a fixed wall-clock period from a
//! dedicated thread. Deadlines advance by the period rather than from
//! "now", so a slow callback does not accumulate drift. The period is a
//! wall-clock quantity and is independent of the executor's plan-unit
//! quantum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct TickTimer {
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TickTimer {
    pub fn new(period: Duration) -> Self {
        TickTimer {
            period,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start invoking `f` once per period. A timer already running is
    /// stopped first.
    pub fn start<F>(&mut self, mut f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let period = self.period;
        self.handle = Some(thread::spawn(move || {
            let mut deadline = Instant::now() + period;
            while running.load(Ordering::Acquire) {
                f();
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                }
                deadline += period;
            }
        }));
    }

    /// Stop the timer and join its thread. An in-progress callback
    /// finishes first.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_timer_fires_repeatedly_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let mut timer = TickTimer::new(Duration::from_millis(5));
        timer.start(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(40));
        timer.stop();
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 2, "expected repeated firings, got {fired}");

        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), fired);
    }

    #[test]
    fn test_restart_replaces_previous_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut timer = TickTimer::new(Duration::from_millis(5));
        let seen = count.clone();
        timer.start(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let seen = count.clone();
        timer.start(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_running());
        timer.stop();
        assert!(!timer.is_running());
    }
}
