//! Error types for pool operations
use thiserror::Error;

/// Boxed error carried by factory failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the pool and its factory.
///
/// Errors raised by a [`Pool::with`](crate::Pool::with) callback are not
/// wrapped here: the callback's own error type is returned unchanged.
/// Releasing a resource twice is not an error either; it is logged and
/// ignored.
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The factory failed to create a resource
    #[error("Failed to create resource for pool '{pool}': {source}")]
    Creation {
        /// The pool name
        pool: String,
        /// The underlying error
        #[source]
        source: BoxError,
    },

    /// The factory failed to destroy a resource
    #[error("Failed to destroy resource for pool '{pool}': {source}")]
    Destruction {
        /// The pool name
        pool: String,
        /// The underlying error
        #[source]
        source: BoxError,
    },

    /// The pool is draining or drained and accepts no new acquisitions
    #[error("Pool '{pool}' is draining and no longer accepts acquire requests")]
    Draining {
        /// The pool name
        pool: String,
    },

    /// A queued request was dropped unanswered because a log hook or
    /// factory callback panicked while the pool was handing it a result
    #[error("Pool '{pool}' abandoned a queued request after a panic")]
    Closed {
        /// The pool name
        pool: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a creation error from any error source
    pub fn creation<S, E>(pool: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::Creation {
            pool: pool.into(),
            source: source.into(),
        }
    }

    /// Create a destruction error from any error source
    pub fn destruction<S, E>(pool: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::Destruction {
            pool: pool.into(),
            source: source.into(),
        }
    }

    /// Create a draining error
    pub fn draining<S: Into<String>>(pool: S) -> Self {
        Self::Draining { pool: pool.into() }
    }

    /// Create a closed error
    pub fn closed<S: Into<String>>(pool: S) -> Self {
        Self::Closed { pool: pool.into() }
    }

    /// Check if this error is retryable
    ///
    /// A failed creation does not consume capacity, so the next attempt may
    /// succeed. Draining and closed pools never come back.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }

    /// Get the pool name associated with this error (if any)
    #[must_use]
    pub fn pool_name(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } => None,
            Self::Creation { pool, .. }
            | Self::Destruction { pool, .. }
            | Self::Draining { pool }
            | Self::Closed { pool } => Some(pool.as_str()),
        }
    }
}
