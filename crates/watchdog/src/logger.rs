//! Injected logger callbacks
//!
//! The watchdog never inspects what a logger does. Missing loggers are no-ops.
//! Internal `tracing` events are emitted independently of these.

use std::fmt;
use std::sync::Arc;

use crate::error::WatchdogError;

/// Info/debug sink: a single message argument
pub type MessageLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Error sink: the error plus a message naming the watchdog
pub type ErrorLogger = Arc<dyn Fn(&WatchdogError, &str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Loggers {
    info: Option<MessageLogger>,
    debug: Option<MessageLogger>,
    error: Option<ErrorLogger>,
}

impl Loggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.info = Some(Arc::new(logger));
        self
    }

    pub fn with_debug(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug = Some(Arc::new(logger));
        self
    }

    pub fn with_error(
        mut self,
        logger: impl Fn(&WatchdogError, &str) + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Arc::new(logger));
        self
    }

    /// Forward all three sinks to `tracing` under the `heartbeat_watchdog` target.
    pub fn tracing() -> Self {
        Self::new()
            .with_info(|msg| tracing::info!(target: "heartbeat_watchdog", "{}", msg))
            .with_debug(|msg| tracing::debug!(target: "heartbeat_watchdog", "{}", msg))
            .with_error(|err, msg| {
                tracing::error!(target: "heartbeat_watchdog", "{}: {}", msg, err)
            })
    }

    pub(crate) fn info(&self, msg: &str) {
        if let Some(logger) = &self.info {
            logger(msg);
        }
    }

    pub(crate) fn debug(&self, msg: &str) {
        if let Some(logger) = &self.debug {
            logger(msg);
        }
    }

    pub(crate) fn error(&self, err: &WatchdogError, msg: &str) {
        if let Some(logger) = &self.error {
            logger(err, msg);
        }
    }
}

impl fmt::Debug for Loggers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loggers")
            .field("info", &self.info.is_some())
            .field("debug", &self.debug.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_default_loggers_are_noops() {
        let loggers = Loggers::default();
        loggers.info("ignored");
        loggers.debug("ignored");
        loggers.error(&WatchdogError::NoRuntime, "ignored");
    }

    #[test]
    fn test_each_sink_receives_its_own_calls() {
        let lines = Arc::new(Mutex::new(Vec::new()));

        let info_lines = lines.clone();
        let debug_lines = lines.clone();
        let error_lines = lines.clone();
        let loggers = Loggers::new()
            .with_info(move |m| info_lines.lock().push(format!("info:{}", m)))
            .with_debug(move |m| debug_lines.lock().push(format!("debug:{}", m)))
            .with_error(move |e, m| error_lines.lock().push(format!("error:{}:{}", m, e)));

        loggers.info("a");
        loggers.debug("b");
        loggers.error(&WatchdogError::NoRuntime, "c");

        let lines = lines.lock();
        assert_eq!(lines[0], "info:a");
        assert_eq!(lines[1], "debug:b");
        assert!(lines[2].starts_with("error:c:No tokio runtime"));
    }
}
