//! Event Bus - lifecycle events for async observers
//!
//! Stopped subscribers are called synchronously from the loop. Anything that
//! would rather `.await` the watchdog's lifecycle listens on this bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Payload handed to stopped subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedEvent {
    /// Last beat observed by the tick that fired
    pub last_beat: DateTime<Utc>,
    /// Silence at the moment of the tick, in milliseconds
    pub elapsed_ms: i64,
}

/// Watchdog lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogEvent {
    Started,
    Stopped { elapsed_ms: i64 },
    Cancelled,
    Failed { reason: String },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<WatchdogEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: WatchdogEvent) {
        let _ = self.tx.send(event); // No receivers is fine
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<WatchdogEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
