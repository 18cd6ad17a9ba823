//! Structured [`Logger`] scoped by an originating module.

use serde_json::Value;
use strum::Display;

/// Channel a log record belongs to.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    /// Application flow.
    #[default]
    Application,

    /// Domain rules and state changes.
    Domain,

    /// Infrastructure collaborators (database, cache, etc).
    Infrastructure,

    /// Authentication and authorization.
    Security,

    /// Timings and resource usage.
    Performance,

    /// Records kept for auditing.
    Audit,
}

/// Level of a log record.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum Level {
    /// Diagnostic details.
    Debug,

    /// Regular operation.
    Info,

    /// Something unexpected, but recoverable.
    Warning,

    /// Operation failed.
    Error,

    /// Operation failed and requires immediate attention.
    Critical,

    /// Something happened in the domain.
    Event,

    /// Something must be kept for auditing.
    Audit,
}

/// Structured logger tagged with a statically known module name.
///
/// Records are emitted as [`tracing`] events carrying `module`, `channel`
/// and `context` fields.
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    /// Name of the module this [`Logger`] logs for.
    module: &'static str,

    /// [`Channel`] this [`Logger`] logs into.
    channel: Channel,
}

impl Logger {
    /// Creates a new [`Logger`] for the provided `module` logging into the
    /// [`Channel::Application`].
    #[must_use]
    pub const fn for_module(module: &'static str) -> Self {
        Self {
            module,
            channel: Channel::Application,
        }
    }

    /// Returns a copy of this [`Logger`] logging into the provided [`Channel`].
    #[must_use]
    pub const fn with_channel(self, channel: Channel) -> Self {
        Self {
            module: self.module,
            channel,
        }
    }

    /// Returns the module name of this [`Logger`].
    #[must_use]
    pub const fn module(&self) -> &'static str {
        self.module
    }

    /// Returns the [`Channel`] of this [`Logger`].
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Emits a record with the provided [`Level`], `message` and `context`.
    pub fn log(&self, level: Level, message: &str, context: &Value) {
        let Self { module, channel } = *self;
        match level {
            Level::Debug => {
                tracing::debug!(module, %channel, %context, "{message}");
            }
            Level::Info => {
                tracing::info!(module, %channel, %context, "{message}");
            }
            Level::Warning => {
                tracing::warn!(module, %channel, %context, "{message}");
            }
            Level::Error => {
                tracing::error!(module, %channel, %context, "{message}");
            }
            Level::Critical => tracing::error!(
                module,
                %channel,
                %context,
                critical = true,
                "{message}",
            ),
            Level::Event => tracing::info!(
                module,
                %channel,
                %context,
                kind = "event",
                "{message}",
            ),
            Level::Audit => tracing::info!(
                module,
                channel = %Channel::Audit,
                %context,
                kind = "audit",
                "{message}",
            ),
        }
    }

    /// Emits a [`Level::Debug`] record.
    pub fn debug(&self, message: &str, context: &Value) {
        self.log(Level::Debug, message, context);
    }

    /// Emits a [`Level::Info`] record.
    pub fn info(&self, message: &str, context: &Value) {
        self.log(Level::Info, message, context);
    }

    /// Emits a [`Level::Warning`] record.
    pub fn warning(&self, message: &str, context: &Value) {
        self.log(Level::Warning, message, context);
    }

    /// Emits a [`Level::Error`] record.
    pub fn error(&self, message: &str, context: &Value) {
        self.log(Level::Error, message, context);
    }

    /// Emits a [`Level::Critical`] record.
    pub fn critical(&self, message: &str, context: &Value) {
        self.log(Level::Critical, message, context);
    }

    /// Emits a [`Level::Event`] record.
    pub fn event(&self, message: &str, context: &Value) {
        self.log(Level::Event, message, context);
    }

    /// Emits a [`Level::Audit`] record.
    ///
    /// Audit records always go into the [`Channel::Audit`].
    pub fn audit(&self, message: &str, context: &Value) {
        self.log(Level::Audit, message, context);
    }
}

#[cfg(test)]
mod spec {
    use super::{Channel, Level, Logger};

    #[test]
    fn tags_module_and_channel() {
        let log = Logger::for_module("User");
        assert_eq!(log.module(), "User");
        assert_eq!(log.channel(), Channel::Application);

        let log = log.with_channel(Channel::Security);
        assert_eq!(log.module(), "User");
        assert_eq!(log.channel(), Channel::Security);
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(Channel::Infrastructure.to_string(), "infrastructure");
        assert_eq!(Level::Critical.to_string(), "critical");
    }
}
