//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::LogSink;

/// Configuration for a resource pool
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Label used in log lines and errors
    pub name: Option<String>,
    /// Resources created eagerly by `Pool::start` and `Pool::maintain`
    pub min_size: usize,
    /// Hard ceiling on resources in existence (idle, in use or being created)
    pub max_size: usize,
    /// Push released resources to the front of the idle set instead of the back
    pub return_to_head: bool,
    /// Number of waiter priority levels; priority `0` is served first
    pub priority_levels: usize,
    /// Idle resources unused for longer than this are destroyed
    #[cfg_attr(feature = "serde", serde(with = "opt_millis"))]
    pub idle_timeout: Option<Duration>,
    /// Resources older than this are destroyed instead of reused
    #[cfg_attr(feature = "serde", serde(with = "opt_millis"))]
    pub max_lifetime: Option<Duration>,
    /// Destination for pool log lines
    #[cfg_attr(feature = "serde", serde(skip))]
    pub log: LogSink,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: None,
            min_size: 0,
            max_size: 10,
            return_to_head: false,
            priority_levels: 1,
            idle_timeout: None,
            max_lifetime: None,
            log: LogSink::default(),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be greater than 0"));
        }
        if self.min_size > self.max_size {
            return Err(Error::configuration(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.priority_levels == 0 {
            return Err(Error::configuration(
                "priority_levels must be greater than 0",
            ));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "idle_timeout must be greater than zero when set",
            ));
        }
        if self.max_lifetime.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "max_lifetime must be greater than zero when set",
            ));
        }
        Ok(())
    }

    /// Set the pool name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the minimum and maximum pool size.
    pub fn with_size(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    /// Set the idle-set insertion policy.
    pub fn with_return_to_head(mut self, return_to_head: bool) -> Self {
        self.return_to_head = return_to_head;
        self
    }

    /// Set the number of waiter priority levels.
    pub fn with_priority_levels(mut self, levels: usize) -> Self {
        self.priority_levels = levels;
        self
    }

    /// Set the log destination.
    pub fn with_log(mut self, log: impl Into<LogSink>) -> Self {
        self.log = log.into();
        self
    }
}

#[cfg(feature = "serde")]
mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
