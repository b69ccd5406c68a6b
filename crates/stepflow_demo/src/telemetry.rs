//! Tracing subscriber setup for the demo binary.
//!
//! [`TracingConfig`] collects the level, output format and an optional filter
//! string, then [`TracingConfig::init`] installs a `tracing_subscriber`
//! registry with an [`EnvFilter`] and a formatting layer.
//!
//! # Filter precedence
//!
//! 1. An explicit [`with_env_filter`](TracingConfig::with_env_filter) string
//! 2. `RUST_LOG`, if set and valid
//! 3. The configured level, applied to every target

use core::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

/// Error returned when a format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tracing format '{0}', expected pretty, compact or json")]
pub struct UnknownFormat(pub String);

impl FromStr for TracingFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration.
///
/// # Example
///
/// ```
/// use stepflow_demo::telemetry::{TracingConfig, TracingFormat};
/// use tracing::Level;
///
/// let config = TracingConfig::new()
///     .with_level(Level::DEBUG)
///     .with_format(TracingFormat::Compact)
///     .with_env_filter("stepflow_dag=trace");
/// config.init();
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Maximum log level.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Filter directives (e.g., "`stepflow_dag=debug`").
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }

    /// Installs the global subscriber.
    ///
    /// A subscriber that is already installed is left in place.
    pub fn init(&self) {
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };
        let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(span_events);
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            TracingFormat::Pretty => fmt_layer.pretty().boxed(),
            TracingFormat::Compact => fmt_layer.compact().boxed(),
            TracingFormat::Json => fmt_layer.json().boxed(),
        };

        let installed = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(self.filter())
            .try_init()
            .is_ok();

        tracing::debug!(
            level = %self.level,
            format = ?self.format,
            installed,
            "tracing initialized"
        );
    }
}
