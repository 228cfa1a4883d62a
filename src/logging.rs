//! Build-scoped progress and warning output.
//!
//! Callers choose a [`LogPolicy`]; it is resolved once at build start into a
//! [`Logger`] holding two capabilities (`log` and `warn`) that every stage
//! receives by reference.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

/// Severity of a message delivered to a custom sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Progress information.
    Log,
    /// Non-fatal problem (dropped attribute, tolerated download failure).
    Warn,
}

/// Caller-supplied message sink.
pub type LogSink = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// How build messages are reported.
#[derive(Clone, Default)]
pub enum LogPolicy {
    /// Discard every message.
    Silent,
    /// Forward messages to `tracing` (`info` for progress, `warn` for warnings).
    #[default]
    Standard,
    /// Forward messages to a caller-supplied sink.
    Custom(LogSink),
}

impl fmt::Debug for LogPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Silent => f.write_str("Silent"),
            Self::Standard => f.write_str("Standard"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for LogPolicy {
    /// JSON configs carry the historical boolean `verbose` flag.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let verbose = bool::deserialize(deserializer)?;
        Ok(if verbose { Self::Standard } else { Self::Silent })
    }
}

/// Resolved `log`/`warn` capabilities shared by all build stages.
#[derive(Clone)]
pub struct Logger {
    log: LogFn,
    warn: LogFn,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::from_policy(&LogPolicy::default())
    }
}

impl Logger {
    /// Resolves a policy into concrete capabilities.
    #[must_use]
    pub fn from_policy(policy: &LogPolicy) -> Self {
        match policy {
            LogPolicy::Silent => {
                let noop: LogFn = Arc::new(|_: &str| {});
                Self {
                    log: Arc::clone(&noop),
                    warn: noop,
                }
            }
            LogPolicy::Standard => Self {
                log: Arc::new(|message: &str| tracing::info!("{message}")),
                warn: Arc::new(|message: &str| tracing::warn!("{message}")),
            },
            LogPolicy::Custom(sink) => {
                let log_sink = Arc::clone(sink);
                let warn_sink = Arc::clone(sink);
                Self {
                    log: Arc::new(move |message: &str| log_sink(LogLevel::Log, message)),
                    warn: Arc::new(move |message: &str| warn_sink(LogLevel::Warn, message)),
                }
            }
        }
    }

    /// Reports build progress.
    pub fn log(&self, message: &str) {
        (self.log)(message);
    }

    /// Reports a non-fatal problem.
    pub fn warn(&self, message: &str) {
        (self.warn)(message);
    }
}
