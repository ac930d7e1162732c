//! Pool log hook.
//!
//! Every significant transition (create, acquire, queue, release, destroy,
//! drain) is reported through a [`LogSink`]. The default sink forwards to
//! `tracing`, which stays silent until a subscriber is installed.

use std::fmt;
use std::sync::Arc;

/// Severity of a pool log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogLevel {
    /// Per-operation detail (acquire, release, queueing).
    Verbose,
    /// Lifecycle milestones (create, destroy, drain).
    Info,
    /// Caller misuse that the pool tolerates (double release).
    Warn,
    /// Factory failures.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Receiver for pool log lines.
///
/// Implemented for any `Fn(&str, LogLevel)` closure.
pub trait PoolLogger: Send + Sync {
    /// Record one log line.
    fn log(&self, message: &str, level: LogLevel);
}

impl<F> PoolLogger for F
where
    F: Fn(&str, LogLevel) + Send + Sync,
{
    fn log(&self, message: &str, level: LogLevel) {
        self(message, level);
    }
}

/// Where pool log lines go.
#[derive(Clone, Default)]
pub enum LogSink {
    /// Discard everything.
    Off,
    /// Emit `tracing` events tagged with the pool name.
    #[default]
    Tracing,
    /// Forward to a user supplied logger.
    Custom(Arc<dyn PoolLogger>),
}

impl LogSink {
    /// Wrap a logger or closure.
    pub fn custom<L: PoolLogger + 'static>(logger: L) -> Self {
        Self::Custom(Arc::new(logger))
    }

    pub(crate) fn emit(&self, pool: &str, level: LogLevel, message: fmt::Arguments<'_>) {
        match self {
            Self::Off => {}
            Self::Tracing => match level {
                LogLevel::Verbose => tracing::debug!(pool, "{message}"),
                LogLevel::Info => tracing::info!(pool, "{message}"),
                LogLevel::Warn => tracing::warn!(pool, "{message}"),
                LogLevel::Error => tracing::error!(pool, "{message}"),
            },
            Self::Custom(logger) => {
                let line = format!("[{pool}] {message}");
                logger.log(&line, level);
            }
        }
    }
}

impl From<bool> for LogSink {
    /// `false` silences the pool, `true` keeps the tracing default.
    fn from(enabled: bool) -> Self {
        if enabled { Self::Tracing } else { Self::Off }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Tracing => f.write_str("Tracing"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
