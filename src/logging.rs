//! Logging configuration and the tracing bridge
//!
//! The binary initializes a `tracing-subscriber` registry with an `EnvFilter`
//! and a formatting layer. Embedding applications can additionally install
//! [`AuditLayer`], which turns every tracing event emitted outside this crate
//! into an unspecified-event candidate for the [`Auditor`].
//!
//! [`Auditor`]: crate::audit::Auditor

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event as TracingEvent, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::audit::Auditor;
use crate::error::{AuditError, AuditResult};

/// Target prefix of everything this crate logs
const CRATE_TARGET: &str = "change_audit";

/// Severity used for filtering, per-module log lines and unspecified events
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        if *level == Level::TRACE {
            LogLevel::Trace
        } else if *level == Level::DEBUG {
            LogLevel::Debug
        } else if *level == Level::INFO {
            LogLevel::Info
        } else if *level == Level::WARN {
            LogLevel::Warn
        } else {
            LogLevel::Error
        }
    }
}

impl FromStr for LogLevel {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(AuditError::Config(format!("Invalid log level: {}", s))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Emit `message` at a level chosen at runtime
pub(crate) fn emit(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!("{}", message),
        LogLevel::Debug => tracing::debug!("{}", message),
        LogLevel::Info => tracing::info!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
    }
}

/// Subscriber configuration for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level shown
    pub level: LogLevel,

    /// Extra filter directives, e.g. `change_audit::storage=debug`
    pub filter_directives: Option<String>,

    /// Include file and line number in log lines
    pub include_location: bool,

    /// Include target module names in log lines
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            filter_directives: None,
            include_location: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Read overrides from the environment
    ///
    /// - `CHANGE_AUDIT_LOG_LEVEL`: trace, debug, info, warn, error
    /// - `CHANGE_AUDIT_LOG_FILTER`: additional filter directives
    /// - `CHANGE_AUDIT_LOG_LOCATION`: include file/line (true/false)
    pub fn from_env() -> AuditResult<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("CHANGE_AUDIT_LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Ok(filter) = std::env::var("CHANGE_AUDIT_LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        if let Ok(val) = std::env::var("CHANGE_AUDIT_LOG_LOCATION") {
            config.include_location = val.parse().unwrap_or(false);
        }

        Ok(config)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Build the filter: `RUST_LOG` first, then the level, then extra directives
    pub fn env_filter(&self) -> AuditResult<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                let parsed = directive.trim().parse().map_err(|e| {
                    AuditError::Config(format!("Invalid filter directive '{}': {}", directive, e))
                })?;
                filter = filter.add_directive(parsed);
            }
        }

        Ok(filter)
    }
}

/// Install the global subscriber; logs go to stderr so command output stays clean
pub fn init_logging(config: &LogConfig) -> AuditResult<()> {
    let layer = fmt_layer::layer()
        .with_writer(std::io::stderr)
        .with_target(config.include_targets)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(layer)
        .try_init()
        .map_err(|e| AuditError::Config(format!("Failed to initialize logging: {}", e)))
}

/// A log message as it reaches the audit engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub level: LogLevel,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Module path of the emitting code, e.g. `shop::billing`
    pub module_path: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            file: None,
            line: None,
            module_path: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn in_module(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = Some(module_path.into());
        self
    }

    /// Owning application: the first segment of the module path
    pub fn application(&self) -> Option<&str> {
        self.module_path
            .as_deref()
            .and_then(|m| m.split("::").next())
            .filter(|s| !s.is_empty())
    }
}

/// Collects the message and any extra fields of a tracing event
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

/// Tracing layer forwarding foreign log events to [`Auditor::record_log`]
pub struct AuditLayer {
    auditor: Arc<Auditor>,
}

impl AuditLayer {
    pub fn new(auditor: Arc<Auditor>) -> Self {
        Self { auditor }
    }
}

impl<S: Subscriber> Layer<S> for AuditLayer {
    fn on_event(&self, event: &TracingEvent<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(CRATE_TARGET) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            message: visitor.finish(),
            level: LogLevel::from(metadata.level()),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            module_path: metadata.module_path().map(str::to_string),
        };

        self.auditor.record_log(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::from(&Level::WARN), LogLevel::Warn);
    }

    #[test]
    fn test_filter_rejects_bad_directive() {
        let mut config = LogConfig::default().with_level(LogLevel::Debug);
        config.filter_directives = Some("change_audit=notalevel".to_string());
        assert!(config.env_filter().is_err());

        config.filter_directives = Some("change_audit::storage=trace".to_string());
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_log_record_application() {
        let record = LogRecord::new(LogLevel::Info, "hello").in_module("shop::billing");
        assert_eq!(record.application(), Some("shop"));

        let bare = LogRecord::new(LogLevel::Info, "hello");
        assert_eq!(bare.application(), None);
    }

    #[test]
    fn test_audit_layer_forwards_foreign_events() {
        use crate::config::ConfigHandle;
        use crate::models::InMemoryEntities;
        use crate::storage::MemorySink;

        let sink = Arc::new(MemorySink::new());
        let auditor = Arc::new(Auditor::new(
            Arc::new(ConfigHandle::default()),
            Arc::new(InMemoryEntities::new()),
            sink.clone(),
        ));
        let subscriber = tracing_subscriber::registry().with(AuditLayer::new(auditor));

        let line = tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "change_audit::storage", "internal detail");
            let line = line!() + 1;
            tracing::warn!(target: "billing::worker", attempt = 3, "disk almost full");
            line
        });

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let log = events[0].as_unspecified().unwrap();
        assert_eq!(log.message, "disk almost full attempt=3");
        assert_eq!(log.level, LogLevel::Warn);
        assert_eq!(log.file.as_deref(), Some(file!()));
        assert_eq!(log.line, Some(line));
        assert_eq!(log.application.as_deref(), Some("change_audit"));
    }
}
