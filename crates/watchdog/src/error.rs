//! Error types for watchdog operations
//!
//! Flat hierarchy. Only construction and `start` errors reach the caller;
//! everything raised inside the monitoring loop goes to the error logger.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchdogError>;

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Alert threshold must be a positive number of milliseconds, got {0:?}")]
    InvalidThreshold(Duration),

    #[error("Alert threshold must be positive, got {0}ms")]
    NegativeThreshold(i64),

    #[error("Watchdog {0} is already running")]
    AlreadyRunning(String),

    #[error("No tokio runtime available to spawn the monitoring loop")]
    NoRuntime,

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Stopped subscriber #{index} panicked: {message}")]
    SubscriberPanicked { index: usize, message: String },

    #[error("Monitoring loop panicked: {0}")]
    MonitorPanicked(String),
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(boxed.as_ref()), "owned boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_error_display() {
        let err = WatchdogError::AlreadyRunning("worker".to_string());
        assert_eq!(err.to_string(), "Watchdog worker is already running");

        let err = WatchdogError::SubscriberPanicked {
            index: 1,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "Stopped subscriber #1 panicked: bad");
    }
}
