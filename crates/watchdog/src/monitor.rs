//! Monitoring loop
//!
//! check cancellation → read last beat → fire if silence > threshold →
//! sleep threshold/2 (interruptible) → repeat.
//!
//! Holds only a `Weak` to the watchdog, so dropping the last handle ends
//! the loop instead of keeping it alive forever.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::millis_to_datetime;
use crate::config::FiringMode;
use crate::error::{panic_message, WatchdogError};
use crate::events::{EventBus, StoppedEvent, WatchdogEvent};
use crate::logger::Loggers;
use crate::watchdog::{Inner, Watchdog};

pub(crate) struct Monitor {
    watchdog: Weak<Inner>,
    token: CancellationToken,
    id: Uuid,
    name: String,
    label: String,
    loggers: Loggers,
    events: Arc<EventBus>,
}

impl Monitor {
    pub(crate) fn new(watchdog: &Watchdog, token: CancellationToken) -> Self {
        let inner = &watchdog.inner;
        Self {
            watchdog: Arc::downgrade(inner),
            token,
            id: inner.id,
            name: inner.name.clone(),
            label: inner.label.clone(),
            loggers: inner.loggers.clone(),
            events: inner.events.clone(),
        }
    }

    /// Task body. Never returns an error: failures end here, in the logs.
    pub(crate) async fn run(self) {
        match AssertUnwindSafe(self.watch()).catch_unwind().await {
            Ok(()) => {
                tracing::debug!(watchdog = %self.name, id = %self.id, "Watchdog cancelled");
                self.loggers
                    .debug(&format!("{} has been cancelled", self.label));
                self.events.publish(WatchdogEvent::Cancelled);
            }
            Err(payload) => {
                let err = WatchdogError::MonitorPanicked(panic_message(payload.as_ref()));
                tracing::error!(
                    watchdog = %self.name,
                    id = %self.id,
                    error = %err,
                    "Watchdog failed"
                );
                self.loggers.error(&err, &format!("{} failed", self.label));
                self.events.publish(WatchdogEvent::Failed {
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Returns when cancelled or when the watchdog itself is gone.
    async fn watch(&self) {
        // Only consulted in OncePerStall mode
        let mut armed = true;

        loop {
            if self.token.is_cancelled() {
                return;
            }

            let Some(inner) = self.watchdog.upgrade() else {
                // Last handle dropped: reported the same as a cancellation.
                return;
            };
            let watchdog = Watchdog { inner };
            let interval = watchdog.inner.threshold.check_interval();
            self.tick(&watchdog, &mut armed);
            // No strong reference may survive into the sleep.
            drop(watchdog);

            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    fn tick(&self, watchdog: &Watchdog, armed: &mut bool) {
        let inner = &watchdog.inner;
        let last_beat = inner.last_beat_ms.load(Ordering::Acquire);
        let elapsed_ms = inner.clock.now_millis().saturating_sub(last_beat);

        if !inner.threshold.is_exceeded_by(elapsed_ms) {
            tracing::trace!(watchdog = %self.name, elapsed_ms, "Alive");
            *armed = true;
            return;
        }

        if inner.firing_mode == FiringMode::OncePerStall && !*armed {
            return;
        }
        *armed = false;

        tracing::warn!(
            watchdog = %self.name,
            id = %self.id,
            elapsed_ms,
            threshold_ms = inner.threshold.as_millis(),
            "No beat within alert threshold"
        );
        self.events.publish(WatchdogEvent::Stopped { elapsed_ms });

        let event = StoppedEvent {
            last_beat: millis_to_datetime(last_beat),
            elapsed_ms,
        };
        for failure in inner.subscribers.dispatch(watchdog, &event) {
            tracing::error!(
                watchdog = %self.name,
                id = %self.id,
                error = %failure,
                "Stopped subscriber failed"
            );
            self.loggers
                .error(&failure, &format!("{} subscriber failed", self.label));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests::ManualClock;
    use crate::clock::Clock;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn manual_watchdog(mode: FiringMode) -> (Watchdog, Arc<ManualClock>, Arc<AtomicUsize>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let watchdog = Watchdog::builder(1000u64)
            .clock(clock.clone())
            .firing_mode(mode)
            .on_stopped(move |_, _| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        (watchdog, clock, fired)
    }

    #[test]
    fn test_tick_threshold_boundary() {
        let (watchdog, clock, fired) = manual_watchdog(FiringMode::EveryTick);
        let monitor = Monitor::new(&watchdog, CancellationToken::new());
        let mut armed = true;

        clock.advance_millis(1000);
        monitor.tick(&watchdog, &mut armed);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        clock.advance_millis(1);
        monitor.tick(&watchdog, &mut armed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        monitor.tick(&watchdog, &mut armed);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tick_once_per_stall() {
        let (watchdog, clock, fired) = manual_watchdog(FiringMode::OncePerStall);
        let monitor = Monitor::new(&watchdog, CancellationToken::new());
        let mut armed = true;

        clock.advance_millis(1500);
        monitor.tick(&watchdog, &mut armed);
        monitor.tick(&watchdog, &mut armed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        watchdog.beat();
        monitor.tick(&watchdog, &mut armed);
        assert!(armed);

        clock.advance_millis(2000);
        monitor.tick(&watchdog, &mut armed);
        monitor.tick(&watchdog, &mut armed);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tick_reports_last_beat_in_event() {
        let (watchdog, clock, _) = manual_watchdog(FiringMode::EveryTick);
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        watchdog.subscribe(move |_, event| *s.lock() = Some(event.clone()));

        let beat_at = clock.now();
        watchdog.beat_at(beat_at);
        clock.advance_millis(4200);

        let monitor = Monitor::new(&watchdog, CancellationToken::new());
        monitor.tick(&watchdog, &mut true);

        let event = seen.lock().clone().unwrap();
        assert_eq!(event.last_beat, beat_at);
        assert_eq!(event.elapsed_ms, 4200);
    }

    /// Panics on every call after the first one.
    struct BrokenClock {
        calls: AtomicUsize,
    }

    impl Clock for BrokenClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                panic!("clock source unavailable");
            }
            Utc::now()
        }
    }

    #[tokio::test]
    async fn test_loop_failure_is_logged_and_terminal() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        let watchdog = Watchdog::builder(100u64)
            .name("broken")
            .clock(Arc::new(BrokenClock {
                calls: AtomicUsize::new(0),
            }))
            .loggers(Loggers::new().with_error(move |err, msg| {
                e.lock().push(format!("{}: {}", msg, err));
            }))
            .build()
            .unwrap();
        let mut rx = watchdog.events();

        watchdog.start_at(Some(Utc::now()), None).unwrap();
        assert_eq!(rx.recv().await.unwrap(), WatchdogEvent::Started);
        match rx.recv().await.unwrap() {
            WatchdogEvent::Failed { reason } => {
                assert!(reason.contains("clock source unavailable"))
            }
            other => panic!("Expected Failed event, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!watchdog.is_running());
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Watchdog broken failed: Monitoring loop panicked"));
    }
}
