//! Heartbeat Watchdog - detects work that stopped beating
//!
//! One atomic timestamp, one monitoring task, one ordered subscriber list.
//!
//! Lifecycle: idle → running → idle, repeatable. `start` rejects while a loop
//! is still alive; `stop` only signals, `stop_and_wait` also joins. Dropping
//! the last handle cancels whatever loop is running.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::{millis_to_datetime, Clock, SystemClock};
use crate::config::{FiringMode, WatchdogConfig};
use crate::error::{Result, WatchdogError};
use crate::events::{EventBus, StoppedEvent, WatchdogEvent};
use crate::logger::Loggers;
use crate::monitor::Monitor;
use crate::subscribers::{StoppedHandler, SubscriberList, SubscriptionId};
use crate::threshold::AlertThreshold;

/// Shared watchdog state. The monitoring task only holds a `Weak` to it.
pub(crate) struct Inner {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) threshold: AlertThreshold,
    pub(crate) firing_mode: FiringMode,
    /// Epoch millis of the last beat. Hot path: atomic, never locked.
    pub(crate) last_beat_ms: AtomicI64,
    pub(crate) subscribers: SubscriberList,
    pub(crate) loggers: Loggers,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<EventBus>,
    run: Mutex<Option<MonitorRun>>,
}

/// One monitoring loop run: its cancellation and its task
struct MonitorRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.token.cancel();
        }
    }
}

/// Liveness watchdog handle. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Watchdog {
    pub(crate) inner: Arc<Inner>,
}

impl Watchdog {
    /// Watchdog with default name, no-op loggers and every-tick firing
    pub fn new<T>(alert_threshold: T) -> Result<Self>
    where
        T: TryInto<AlertThreshold, Error = WatchdogError>,
    {
        Self::builder(alert_threshold).build()
    }

    pub fn builder<T>(alert_threshold: T) -> WatchdogBuilder
    where
        T: TryInto<AlertThreshold, Error = WatchdogError>,
    {
        WatchdogBuilder::new(alert_threshold.try_into())
    }

    pub fn from_config(config: &WatchdogConfig) -> Result<Self> {
        WatchdogBuilder::from_config(config).build()
    }

    /// Construct, register `on_stopped`, and start in one call
    pub fn start_new<T, F>(
        alert_threshold: T,
        on_stopped: F,
        name: impl Into<String>,
        cancellation: Option<CancellationToken>,
        loggers: Loggers,
    ) -> Result<Self>
    where
        T: TryInto<AlertThreshold, Error = WatchdogError>,
        F: Fn(&Watchdog, &StoppedEvent) + Send + Sync + 'static,
    {
        let watchdog = Self::builder(alert_threshold)
            .name(name)
            .loggers(loggers)
            .on_stopped(on_stopped)
            .build()?;
        watchdog.start(cancellation)?;
        Ok(watchdog)
    }

    /// Record that the monitored work is alive, at the current time
    pub fn beat(&self) {
        self.record_beat(self.inner.clock.now_millis());
    }

    /// Record a beat at an explicit time. Past and future values are taken literally.
    pub fn beat_at(&self, now: DateTime<Utc>) {
        self.record_beat(now.timestamp_millis());
    }

    fn record_beat(&self, millis: i64) {
        self.inner.last_beat_ms.store(millis, Ordering::Release);
        self.log_beat();
    }

    fn log_beat(&self) {
        tracing::debug!(watchdog = %self.inner.name, id = %self.inner.id, "Beat");
        self.inner.loggers.debug(&format!("{} got a beat", self.inner.label));
    }

    /// Start monitoring, seeding the first beat with the current time.
    ///
    /// `cancellation` is linked with the watchdog's own: cancelling either
    /// ends the loop. Cancelling the watchdog never cancels `cancellation`.
    pub fn start(&self, cancellation: Option<CancellationToken>) -> Result<()> {
        self.start_at(None, cancellation)
    }

    /// Start monitoring with an explicit initial beat
    pub fn start_at(
        &self,
        now: Option<DateTime<Utc>>,
        cancellation: Option<CancellationToken>,
    ) -> Result<()> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WatchdogError::NoRuntime)?;

        // User loggers run only after the run slot is released: they may call back in.
        {
            let mut run = self.inner.run.lock();
            if let Some(active) = run.as_ref() {
                if !active.handle.is_finished() {
                    return Err(WatchdogError::AlreadyRunning(self.inner.name.clone()));
                }
            }

            let seed = match now {
                Some(now) => now.timestamp_millis(),
                None => self.inner.clock.now_millis(),
            };
            self.inner.last_beat_ms.store(seed, Ordering::Release);

            let token = match cancellation {
                Some(outer) => outer.child_token(),
                None => CancellationToken::new(),
            };
            // Published before the task exists so Started always precedes its outcome.
            self.inner.events.publish(WatchdogEvent::Started);

            let monitor = Monitor::new(self, token.clone());
            let handle = runtime.spawn(monitor.run());
            *run = Some(MonitorRun { token, handle });
        }

        self.log_beat();
        tracing::info!(
            watchdog = %self.inner.name,
            id = %self.inner.id,
            threshold_ms = self.inner.threshold.as_millis(),
            "Watchdog started"
        );
        self.inner
            .loggers
            .info(&format!("{} has been started", self.inner.label));
        Ok(())
    }

    /// Signal the monitoring loop to exit. Idempotent, does not block.
    pub fn stop(&self) {
        if let Some(run) = self.inner.run.lock().as_ref() {
            run.token.cancel();
        }
    }

    /// Signal the loop to exit and wait until its task has finished
    pub async fn stop_and_wait(&self) {
        let run = self.inner.run.lock().take();
        if let Some(run) = run {
            run.token.cancel();
            // The loop catches its own panics; a join error only means runtime shutdown.
            let _ = run.handle.await;
        }
    }

    /// Register a stopped-notification subscriber
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Watchdog, &StoppedEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.register(Arc::new(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    /// Receiver for lifecycle events published from now on
    pub fn events(&self) -> broadcast::Receiver<WatchdogEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .run
            .lock()
            .as_ref()
            .map(|run| !run.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn alert_threshold(&self) -> AlertThreshold {
        self.inner.threshold
    }

    pub fn firing_mode(&self) -> FiringMode {
        self.inner.firing_mode
    }

    pub fn last_beat(&self) -> DateTime<Utc> {
        millis_to_datetime(self.inner.last_beat_ms.load(Ordering::Acquire))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("threshold", &self.inner.threshold)
            .field("firing_mode", &self.inner.firing_mode)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Fluent construction for everything `Watchdog::new` leaves at defaults
pub struct WatchdogBuilder {
    threshold: Result<AlertThreshold>,
    name: String,
    loggers: Loggers,
    firing_mode: FiringMode,
    clock: Arc<dyn Clock>,
    handlers: Vec<StoppedHandler>,
}

impl WatchdogBuilder {
    fn new(threshold: Result<AlertThreshold>) -> Self {
        Self {
            threshold,
            name: String::new(),
            loggers: Loggers::default(),
            firing_mode: FiringMode::default(),
            clock: Arc::new(SystemClock),
            handlers: Vec::new(),
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(config.threshold())
            .name(config.name.clone())
            .firing_mode(config.firing_mode)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn loggers(mut self, loggers: Loggers) -> Self {
        self.loggers = loggers;
        self
    }

    pub fn firing_mode(mut self, mode: FiringMode) -> Self {
        self.firing_mode = mode;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a stopped subscriber up front
    pub fn on_stopped<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Watchdog, &StoppedEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Watchdog> {
        let threshold = self.threshold?;
        let label = if self.name.is_empty() {
            "Watchdog".to_string()
        } else {
            format!("Watchdog {}", self.name)
        };

        let subscribers = SubscriberList::new();
        for handler in self.handlers {
            subscribers.register(handler);
        }

        let last_beat = self.clock.now_millis();
        Ok(Watchdog {
            inner: Arc::new(Inner {
                id: Uuid::now_v7(),
                name: self.name,
                label,
                threshold,
                firing_mode: self.firing_mode,
                last_beat_ms: AtomicI64::new(last_beat),
                subscribers,
                loggers: self.loggers,
                clock: self.clock,
                events: Arc::new(EventBus::new()),
                run: Mutex::new(None),
            }),
        })
    }
}
