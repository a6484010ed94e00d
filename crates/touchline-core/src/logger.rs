//! Logger contract for the turn loop.
//!
//! The turn loop and order senders report through a caller-supplied
//! [`Logger`] so bots can route per-turn diagnostics wherever they like.
//! [`TracingLogger`] is the default and forwards to `tracing` events tagged
//! with the participant identity.

use std::sync::{Mutex, PoisonError};

use touchline_proto::TeamSide;

use crate::config::SessionConfig;

/// Leveled message sink used by the turn loop and order senders.
pub trait Logger: Send + Sync + 'static {
    /// Per-turn diagnostics.
    fn debug(&self, message: &str);

    /// Stream lifecycle events.
    fn info(&self, message: &str);

    /// Stream failures.
    fn error(&self, message: &str);
}

/// Logger that emits `tracing` events tagged with participant number and side.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    number: u32,
    team_side: TeamSide,
}

impl TracingLogger {
    /// Logger for the given participant.
    pub fn new(number: u32, team_side: TeamSide) -> Self {
        Self { number, team_side }
    }

    /// Logger for the participant described by `config`.
    pub fn for_config(config: &SessionConfig) -> Self {
        Self::new(config.number, config.team_side)
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(number = self.number, side = ?self.team_side, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(number = self.number, side = ?self.team_side, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(number = self.number, side = ?self.team_side, "{message}");
    }
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// [`Logger::debug`].
    Debug,
    /// [`Logger::info`].
    Info,
    /// [`Logger::error`].
    Error,
}

/// Logger that keeps every message in memory.
///
/// Useful for asserting on loop lifecycle events and for bots that surface
/// session diagnostics in their own UI.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
    /// Empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded messages in emission order.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded messages at `level`.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|(l, message)| (l == level).then_some(message))
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_order_and_levels() {
        let logger = RecordingLogger::new();
        logger.debug("turn 1");
        logger.error("boom");
        logger.info("closed");

        assert_eq!(
            logger.entries(),
            vec![
                (LogLevel::Debug, "turn 1".to_string()),
                (LogLevel::Error, "boom".to_string()),
                (LogLevel::Info, "closed".to_string()),
            ]
        );
        assert_eq!(logger.messages_at(LogLevel::Error), vec!["boom".to_string()]);
    }
}
