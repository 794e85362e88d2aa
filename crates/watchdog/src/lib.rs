//! Heartbeat Watchdog - liveness monitoring for periodic work
//!
//! The monitored work calls [`Watchdog::beat`] while it makes progress. A
//! background task checks the silence every half alert threshold and calls
//! the stopped subscribers once it exceeds the threshold.
//!
//! ```ignore
//! let watchdog = Watchdog::builder(Duration::from_secs(5))
//!     .name("ingest")
//!     .loggers(Loggers::tracing())
//!     .on_stopped(|w, event| eprintln!("{} silent for {}ms", w.name(), event.elapsed_ms))
//!     .build()?;
//! watchdog.start(None)?;
//!
//! loop {
//!     do_work().await;
//!     watchdog.beat();
//! }
//! ```
//!
//! # Design
//!
//! 1. **One atomic**: the last beat is an `AtomicI64` of epoch millis, so `beat` never blocks
//! 2. **One task per watchdog**: linked `CancellationToken`, interruptible sleep
//! 3. **Failures stay in the loop**: subscriber and loop panics go to the error logger

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
mod monitor;
pub mod subscribers;
pub mod threshold;
pub mod watchdog;

pub use clock::{Clock, SystemClock};
pub use config::{FiringMode, WatchdogConfig};
pub use error::{Result, WatchdogError};
pub use events::{EventBus, StoppedEvent, WatchdogEvent};
pub use logger::Loggers;
pub use subscribers::{StoppedHandler, SubscriptionId};
pub use threshold::AlertThreshold;
pub use watchdog::{Watchdog, WatchdogBuilder};

pub use tokio_util::sync::CancellationToken;
