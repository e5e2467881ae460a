//! Engine Notifications
//!
//! Step-starting, step-completed, progress and log notifications are
//! broadcast to any number of subscribers. Nobody has to listen: the
//! engine never waits on observers, and a lagging subscriber only loses
//! old events.

use std::fmt;

use log::log;
use tokio::sync::broadcast;

use super::outcome::StepOutcome;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Severity of a log notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A notification emitted by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A step is about to execute
    StepStarting { index: usize, step_type: String },
    /// A step finished (or was skipped)
    StepCompleted {
        index: usize,
        step_type: String,
        outcome: StepOutcome,
    },
    /// Run progress, `current` is 1-based
    Progress {
        current: usize,
        total: usize,
        label: String,
    },
    /// Free-form log line
    Log { message: String, level: LogLevel },
}

/// Fan-out channel for engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes a log notification and mirrors it to the `log` facade.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        log!(log::Level::from(level), "{}", message);
        self.emit(EngineEvent::Log { message, level });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(EngineEvent::Progress {
            current: 1,
            total: 1,
            label: "only".to_string(),
        });
        bus.log(LogLevel::Info, "nobody listens");
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();

        bus.emit(EngineEvent::StepStarting {
            index: 0,
            step_type: "Delay".to_string(),
        });
        bus.log(LogLevel::Warning, "slow device");

        match receiver.try_recv().unwrap() {
            EngineEvent::StepStarting { index, step_type } => {
                assert_eq!(index, 0);
                assert_eq!(step_type, "Delay");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match receiver.try_recv().unwrap() {
            EngineEvent::Log { message, level } => {
                assert_eq!(message, "slow device");
                assert_eq!(level, LogLevel::Warning);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(log::Level::from(LogLevel::Warning), log::Level::Warn);
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }
}
