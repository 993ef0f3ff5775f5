//! Per-path pulse detection
//!
//! Finishing a level rewrites the stats file a handful of times in quick
//! succession (2 to 4 writes). Unrelated saves write it once. A burst is a
//! run of pulses each at most one window after the previous one:
//!
//! - the 2nd pulse of a burst arms a delayed split
//! - the 5th pulse cancels it (too many writes for a level finish)
//! - the armed split fires once the burst has been silent for longer than
//!   the window, and only if the burst ended with 2 to 4 pulses
//!
//! All state lives behind one mutex per detector. The critical sections are
//! bounded and perform no I/O; the split callback runs after the lock is
//! released.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Invoked once per detected split
pub type SplitCallback = Arc<dyn Fn() + Send + Sync>;

/// Pulse count that arms the delayed split
const ARM_AT: u32 = 2;
/// Pulse count that cancels it
const DISARM_AT: u32 = 5;
/// Pulse counts that produce a split when the burst ends
const SPLIT_RANGE: std::ops::RangeInclusive<u32> = 2..=4;

/// A burst is over once the gap exceeds the window; timers have
/// millisecond resolution.
const SETTLE_SLACK: Duration = Duration::from_millis(1);

/// Point-in-time view of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSnapshot {
    pub pulse_count: u32,
    pub split_armed: bool,
    pub splits: u64,
}

#[derive(Debug, Default)]
struct PulseState {
    pulse_count: u32,
    last_event: Option<Instant>,
    /// Generation of the armed split, if one is pending
    armed: Option<u64>,
    next_generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// What a pending split should do when it wakes up
enum Settle {
    /// Burst still running; sleep until this instant and look again
    Wait(Instant),
    Split,
    Quiet,
    /// Cancelled or superseded since arming
    Stale,
}

impl PulseState {
    fn in_burst(&self, now: Instant, window: Duration) -> bool {
        self.last_event
            .is_some_and(|last| now.saturating_duration_since(last) <= window)
    }

    fn disarm(&mut self) {
        self.armed = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Decide a pending split armed under `generation`
    fn settle(&mut self, generation: u64, window: Duration, now: Instant) -> Settle {
        if self.armed != Some(generation) {
            return Settle::Stale;
        }

        if let Some(last) = self.last_event {
            let due = last + window + SETTLE_SLACK;
            if now < due {
                return Settle::Wait(due);
            }
        }

        self.armed = None;
        self.timer = None;
        if SPLIT_RANGE.contains(&self.pulse_count) {
            Settle::Split
        } else {
            Settle::Quiet
        }
    }
}

/// Burst detector for one watched path
pub struct PulseDetector {
    state: Arc<Mutex<PulseState>>,
    window: Duration,
    on_split: SplitCallback,
    splits: Arc<AtomicU64>,
    runtime: Handle,
}

impl PulseDetector {
    /// Create a detector
    ///
    /// Delayed splits are scheduled on `runtime`.
    pub fn new(window: Duration, runtime: Handle, on_split: SplitCallback) -> Self {
        Self {
            state: Arc::new(Mutex::new(PulseState::default())),
            window,
            on_split,
            splits: Arc::new(AtomicU64::new(0)),
            runtime,
        }
    }

    /// Record one qualifying event observed at `now`
    pub fn on_raw_event(&self, now: Instant) {
        let settled_split = {
            let mut state = self.state.lock();
            let mut settled_split = false;

            if state.in_burst(now, self.window) {
                state.pulse_count += 1;
                state.last_event = Some(now);
                let count = state.pulse_count;
                trace!("Pulse {} in burst", count);

                match count {
                    ARM_AT => self.arm(&mut state, now),
                    DISARM_AT => {
                        debug!("Burst exceeded {} pulses, cancelling split", DISARM_AT - 1);
                        state.disarm();
                    }
                    _ => {}
                }
            } else {
                // The timer of the previous burst may not have run yet; its
                // burst is provably over, so decide it here.
                if state.armed.take().is_some() && SPLIT_RANGE.contains(&state.pulse_count) {
                    settled_split = true;
                }
                state.disarm();
                state.pulse_count = 1;
                state.last_event = Some(now);
                trace!("Pulse 1, new burst");
            }

            settled_split
        };

        if settled_split {
            self.fire();
        }
    }

    /// Forget the current burst and cancel any pending split
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.disarm();
        state.pulse_count = 0;
        state.last_event = None;
    }

    pub fn snapshot(&self) -> PulseSnapshot {
        let state = self.state.lock();
        PulseSnapshot {
            pulse_count: state.pulse_count,
            split_armed: state.armed.is_some(),
            splits: self.splits.load(Ordering::Relaxed),
        }
    }

    fn arm(&self, state: &mut PulseState, now: Instant) {
        let generation = state.next_generation;
        state.next_generation += 1;
        state.armed = Some(generation);

        let shared = Arc::clone(&self.state);
        let window = self.window;
        let on_split = Arc::clone(&self.on_split);
        let splits = Arc::clone(&self.splits);

        let timer = self.runtime.spawn(async move {
            let mut deadline = now + window + SETTLE_SLACK;
            loop {
                sleep_until(deadline).await;
                let decision = shared.lock().settle(generation, window, Instant::now());
                match decision {
                    Settle::Wait(next) => deadline = next,
                    Settle::Split => {
                        splits.fetch_add(1, Ordering::Relaxed);
                        on_split();
                        return;
                    }
                    Settle::Quiet | Settle::Stale => return,
                }
            }
        });

        if let Some(previous) = state.timer.replace(timer) {
            previous.abort();
        }
        trace!("Split armed");
    }

    fn fire(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
        (self.on_split)();
    }
}

impl Drop for PulseDetector {
    fn drop(&mut self) {
        self.state.lock().disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_millis(45);

    fn detector() -> (PulseDetector, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&count);
        let detector = PulseDetector::new(
            WINDOW,
            Handle::current(),
            Arc::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (detector, count)
    }

    /// Deliver pulses separated by `gaps`, then stay silent long enough for
    /// any pending split to settle
    async fn burst(detector: &PulseDetector, gaps: &[u64]) {
        detector.on_raw_event(Instant::now());
        for gap in gaps {
            sleep(Duration::from_millis(*gap)).await;
            detector.on_raw_event(Instant::now());
        }
        sleep(WINDOW * 4).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_pulse_never_splits() {
        let (detector, splits) = detector();
        burst(&detector, &[]).await;

        assert_eq!(splits.load(Ordering::SeqCst), 0);
        assert_eq!(detector.snapshot().pulse_count, 1);
        assert!(!detector.snapshot().split_armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_to_four_pulses_split_once() {
        for gaps in [&[10][..], &[10, 20], &[30, 30, 30], &[45, 45, 45]] {
            let (detector, splits) = detector();
            burst(&detector, gaps).await;
            assert_eq!(splits.load(Ordering::SeqCst), 1, "gaps {gaps:?}");
            assert_eq!(detector.snapshot().splits, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_waits_one_window_after_second_pulse() {
        let (detector, splits) = detector();

        detector.on_raw_event(Instant::now());
        sleep(Duration::from_millis(10)).await;
        detector.on_raw_event(Instant::now());
        assert!(detector.snapshot().split_armed);

        sleep(WINDOW - Duration::from_millis(1)).await;
        assert_eq!(splits.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(5)).await;
        assert_eq!(splits.load(Ordering::SeqCst), 1);
        assert!(!detector.snapshot().split_armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_pulses_never_split() {
        let (detector, splits) = detector();
        burst(&detector, &[10, 10, 10, 10]).await;

        assert_eq!(splits.load(Ordering::SeqCst), 0);
        assert_eq!(detector.snapshot().pulse_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifth_pulse_after_armed_window_still_cancels() {
        // Every gap is exactly one window, so the 2nd pulse's own window
        // elapses while the burst is still running.
        let (detector, splits) = detector();
        burst(&detector, &[45, 45, 45, 45]).await;

        assert_eq!(splits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_burst_stays_suppressed() {
        let (detector, splits) = detector();
        burst(&detector, &[5; 11]).await;

        assert_eq!(splits.load(Ordering::SeqCst), 0);
        assert_eq!(detector.snapshot().pulse_count, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_over_window_starts_new_burst() {
        let (detector, splits) = detector();

        detector.on_raw_event(Instant::now());
        sleep(WINDOW + Duration::from_millis(1)).await;
        detector.on_raw_event(Instant::now());

        assert_eq!(detector.snapshot().pulse_count, 1);
        assert!(!detector.snapshot().split_armed);

        sleep(WINDOW * 4).await;
        assert_eq!(splits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_equal_to_window_continues_burst() {
        let (detector, _) = detector();

        detector.on_raw_event(Instant::now());
        sleep(WINDOW).await;
        detector.on_raw_event(Instant::now());

        assert_eq!(detector.snapshot().pulse_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_bursts_split_independently() {
        let (detector, splits) = detector();

        burst(&detector, &[10, 10]).await;
        burst(&detector, &[10, 10, 10]).await;
        burst(&detector, &[10, 10, 10, 10, 10]).await;
        burst(&detector, &[20]).await;

        assert_eq!(splits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_timer_is_settled_by_next_burst() {
        let (detector, splits) = detector();
        let start = Instant::now();

        // Timestamps run ahead of the clock, as if the timer task were
        // delayed behind event delivery.
        detector.on_raw_event(start);
        detector.on_raw_event(start + Duration::from_millis(20));
        detector.on_raw_event(start + Duration::from_millis(200));

        assert_eq!(splits.load(Ordering::SeqCst), 1);
        assert_eq!(detector.snapshot().pulse_count, 1);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(splits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_split() {
        let (detector, splits) = detector();

        detector.on_raw_event(Instant::now());
        sleep(Duration::from_millis(10)).await;
        detector.on_raw_event(Instant::now());
        assert!(detector.snapshot().split_armed);

        detector.reset();
        assert_eq!(detector.snapshot().pulse_count, 0);
        assert!(!detector.snapshot().split_armed);

        sleep(WINDOW * 4).await;
        assert_eq!(splits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_pulse_after_reset_starts_at_one() {
        let (detector, _) = detector();

        detector.on_raw_event(Instant::now());
        detector.reset();
        detector.on_raw_event(Instant::now());

        assert_eq!(detector.snapshot().pulse_count, 1);
    }
}
