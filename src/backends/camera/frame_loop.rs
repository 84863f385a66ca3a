// SPDX-License-Identifier: GPL-3.0-only

//! Delivery-thread lifecycle and the bounded frame handoff
//!
//! The capture source delivers frames from a GStreamer streaming thread;
//! conversion and drawing run on a dedicated delivery thread owned by a
//! [`CaptureLoopController`]. Between the two sits a [`DeliverySlot`]: a
//! depth-one, latest-wins handoff, so a slow consumer drops frames instead
//! of queuing them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the loop body wants to happen after one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run another iteration
    Continue,
    /// Wind the loop down cleanly
    Stop,
}

/// Bounded handoff holding at most one pending value
///
/// `offer` replaces any value already waiting and returns the displaced one,
/// keeping both memory and latency bounded under sustained overload.
pub struct DeliverySlot<T> {
    pending: Mutex<Option<T>>,
    available: Condvar,
    dropped: AtomicU64,
}

impl<T> DeliverySlot<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            available: Condvar::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Publish a value, displacing any unconsumed predecessor
    pub fn offer(&self, value: T) -> Option<T> {
        let displaced = {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.replace(value)
        };
        if displaced.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.available.notify_one();
        displaced
    }

    /// Take the pending value, waiting up to `timeout` for one to arrive
    pub fn take(&self, timeout: Duration) -> Option<T> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if pending.is_none() {
            let (guard, _timed_out) = self
                .available
                .wait_timeout(pending, timeout)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending = guard;
        }
        pending.take()
    }

    /// Number of values displaced before consumption
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Current queue depth; never exceeds one
    pub fn depth(&self) -> usize {
        self.pending
            .lock()
            .map(|p| usize::from(p.is_some()))
            .unwrap_or(0)
    }
}

impl<T> Default for DeliverySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller for a delivery loop running in a separate thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start a delivery loop with one-time initialization
    ///
    /// `init_fn` runs once on the new thread to set up state (GPU resources
    /// live on the delivery thread). If it fails, the thread exits and the
    /// error is logged; the loop closure never runs.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting delivery loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Delivery loop thread started, initializing");

            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Delivery loop initialization failed");
                    return;
                }
            };

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Delivery loop stop signal observed");
                    break;
                }

                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Delivery loop body requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Delivery loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Start a delivery loop with no initialization state
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting delivery loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending a stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for delivery loop thread");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Delivery loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn loop_runs_until_its_body_requests_stop() {
        let iterations = Arc::new(AtomicU32::new(0));
        let body_iterations = Arc::clone(&iterations);

        let mut controller = CaptureLoopController::start("delivery-test", move || {
            if body_iterations.fetch_add(1, Ordering::SeqCst) < 4 {
                LoopAction::Continue
            } else {
                LoopAction::Stop
            }
        });

        controller.join();
        // Four Continue iterations plus the one that returned Stop
        assert_eq!(iterations.load(Ordering::SeqCst), 5);
        assert!(!controller.is_running());
    }

    #[test]
    fn stop_signal_interrupts_a_busy_loop() {
        let iterations = Arc::new(AtomicU32::new(0));
        let body_iterations = Arc::clone(&iterations);

        let mut controller = CaptureLoopController::start("delivery-test", move || {
            body_iterations.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        });

        // Give it a few iterations, then request shutdown from outside
        thread::sleep(Duration::from_millis(30));
        controller.stop();

        let after_stop = iterations.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        // Joined means no further iterations can run
        thread::sleep(Duration::from_millis(15));
        assert_eq!(iterations.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn failed_init_never_runs_the_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let body_ran = Arc::clone(&ran);

        let mut controller = CaptureLoopController::start_with_init(
            "delivery-test",
            || Err::<u32, _>("no GPU adapter".to_string()),
            move |_state| {
                body_ran.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        controller.join();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn slot_holds_latest_value_only() {
        let slot = DeliverySlot::new();
        assert_eq!(slot.offer(1), None);
        assert_eq!(slot.offer(2), Some(1));
        assert_eq!(slot.offer(3), Some(2));
        assert_eq!(slot.depth(), 1);
        assert_eq!(slot.dropped_count(), 2);
        assert_eq!(slot.take(Duration::from_millis(1)), Some(3));
        assert_eq!(slot.depth(), 0);
    }

    #[test]
    fn slot_take_times_out_when_empty() {
        let slot: DeliverySlot<u32> = DeliverySlot::new();
        assert_eq!(slot.take(Duration::from_millis(5)), None);
    }

    #[test]
    fn slot_depth_bounded_under_overload() {
        let slot = Arc::new(DeliverySlot::new());
        let producer_slot = Arc::clone(&slot);

        let producer = thread::spawn(move || {
            for i in 0..10_000u64 {
                producer_slot.offer(i);
            }
        });

        // Consumer deliberately slower than the producer
        let mut taken = Vec::new();
        for _ in 0..10 {
            if let Some(v) = slot.take(Duration::from_millis(5)) {
                taken.push(v);
            }
            assert!(slot.depth() <= 1);
        }

        producer.join().unwrap();
        assert!(slot.depth() <= 1);
        assert!(slot.dropped_count() > 0);
        // Values are delivered in order even when most are dropped
        assert!(taken.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn slot_crossing_threads_delivers_value() {
        let slot = Arc::new(DeliverySlot::new());
        let sender_slot = Arc::clone(&slot);

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender_slot.offer(42u32);
        });

        let value = slot.take(Duration::from_millis(500));
        sender.join().unwrap();
        assert_eq!(value, Some(42));
    }
}
