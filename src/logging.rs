//! Logging setup for the coordinator and its workers.
//!
//! The subscriber is installed once in the coordinator. Forked workers
//! inherit it, so their events land in the same sinks.
//!
//! # Environment Variables
//!
//! - `FORKPOOL_LOG` - Log filter (overrides RUST_LOG)
//! - `FORKPOOL_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `FORKPOOL_LOG_FORMAT` - Output format: pretty, compact, json
//! - `FORKPOOL_LOG_FILE` - Path to log file (in addition to stderr)
//! - `RUST_LOG` - Standard Rust log filter (fallback)
//!
//! # Example
//!
//! ```no_run
//! use forkpool::logging::{LogConfig, init};
//!
//! init(LogConfig::for_cli(1, false).with_env_overrides());
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log file name used when the configured path has none.
const DEFAULT_LOG_FILE_NAME: &str = "forkpool.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable format
    #[default]
    Pretty,
    /// Single-line format
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: pretty, compact, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Rotation policy for the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    /// Single file, appended to across runs
    #[default]
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            _ => Err(format!(
                "Unknown log rotation: '{}'. Valid options: hourly, daily, never",
                s
            )),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration.
///
/// Build one with the presets or builder methods, then pass it to [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level, used when no filter is set
    pub level: Level,
    pub format: LogFormat,
    /// Extra log file next to stderr
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Emit an event when a span closes, with its timing
    pub span_events: bool,
    /// EnvFilter directive string, overrides `level`
    pub filter: Option<String>,
    pub show_target: bool,
    pub show_line_numbers: bool,
    /// Colorize stderr output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: false,
            filter: None,
            show_target: true,
            show_line_numbers: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for the command-line front-end.
    ///
    /// Warnings (evictions, failed workers) show by default; each `-v`
    /// raises the level one step and `quiet` keeps errors only. At `-vvv`
    /// span timings (the whole pool run) are logged as well.
    pub fn for_cli(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            Level::ERROR
        } else {
            match verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        let config = Self {
            show_target: verbose >= 2,
            ..Self::default()
        };
        config
            .with_level(level)
            .with_format(LogFormat::Compact)
            .with_span_events(verbose >= 3)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: String) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Apply environment variable overrides.
    ///
    /// A filter already set by the caller wins over `FORKPOOL_LOG`,
    /// `RUST_LOG` and `FORKPOOL_LOG_LEVEL`. Format and file always apply.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self.filter.is_none() {
            self.filter = var("FORKPOOL_LOG").or_else(|| var("RUST_LOG"));
        }

        if self.filter.is_none()
            && let Some(level) = var("FORKPOOL_LOG_LEVEL").as_deref().and_then(parse_level)
        {
            self.level = level;
        }

        if let Some(format) = var("FORKPOOL_LOG_FORMAT").and_then(|f| f.parse().ok()) {
            self.format = format;
        }

        if let Some(path) = var("FORKPOOL_LOG_FILE") {
            self.file_path = Some(PathBuf::from(path));
        }

        self
    }

    fn build_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string().to_lowercase());
        match self.filter {
            Some(ref filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("Warning: Invalid log filter '{}', using default", filter);
                fallback()
            }),
            None => fallback(),
        }
    }

    fn file_appender(&self) -> Option<RollingFileAppender> {
        let path = self.file_path.as_ref()?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE_NAME);
        RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(file_name)
            .build(parent)
            .map_err(|e| eprintln!("Warning: cannot open log file {}: {}", path.display(), e))
            .ok()
    }

    fn layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let span_events = if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(self.show_target)
            .with_ansi(ansi)
            .with_writer(writer);

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer
                .compact()
                .with_line_number(self.show_line_numbers)
                .boxed(),
            LogFormat::Pretty => layer.with_line_number(self.show_line_numbers).boxed(),
        }
    }
}

/// Parse a log level string.
fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr, and also to `config.file_path` when set. The file
/// writer is blocking so events from a worker are written before it exits.
/// Calling this more than once is a no-op.
pub fn init(config: LogConfig) {
    let filter = config.build_filter();

    let mut layers = vec![config.layer(std::io::stderr, config.ansi)];
    if let Some(appender) = config.file_appender() {
        layers.push(config.layer(appender, false));
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn test_log_rotation_from_str() {
        assert_eq!("Hourly".parse::<LogRotation>().unwrap(), LogRotation::Hourly);
        assert_eq!("never".parse::<LogRotation>().unwrap(), LogRotation::Never);
        assert!("weekly".parse::<LogRotation>().is_err());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_for_cli_levels() {
        assert_eq!(LogConfig::for_cli(0, false).level, Level::WARN);
        assert_eq!(LogConfig::for_cli(1, false).level, Level::INFO);
        assert_eq!(LogConfig::for_cli(2, false).level, Level::DEBUG);
        assert_eq!(LogConfig::for_cli(7, false).level, Level::TRACE);
        assert_eq!(LogConfig::for_cli(0, true).level, Level::ERROR);
        assert!(!LogConfig::for_cli(0, false).show_target);
        assert_eq!(LogConfig::for_cli(1, false).format, LogFormat::Compact);
        assert!(!LogConfig::for_cli(2, false).span_events);
        assert!(LogConfig::for_cli(3, false).span_events);
    }

    #[test]
    fn test_env_filter_precedence() {
        let config = LogConfig::new().with_overrides_from(vars(&[
            ("FORKPOOL_LOG", "forkpool=trace"),
            ("RUST_LOG", "debug"),
        ]));
        assert_eq!(config.filter.as_deref(), Some("forkpool=trace"));

        let config = LogConfig::new().with_overrides_from(vars(&[("RUST_LOG", "debug")]));
        assert_eq!(config.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_filter_beats_env() {
        let config = LogConfig::new()
            .with_filter("warn".to_string())
            .with_overrides_from(vars(&[
                ("FORKPOOL_LOG", "trace"),
                ("FORKPOOL_LOG_LEVEL", "debug"),
            ]));
        assert_eq!(config.filter.as_deref(), Some("warn"));
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_env_level_format_and_file() {
        let config = LogConfig::new().with_overrides_from(vars(&[
            ("FORKPOOL_LOG_LEVEL", "debug"),
            ("FORKPOOL_LOG_FORMAT", "json"),
            ("FORKPOOL_LOG_FILE", "/tmp/pool.log"),
        ]));
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/pool.log")));
    }

    #[test]
    fn test_unknown_env_format_is_ignored() {
        let config = LogConfig::new()
            .with_format(LogFormat::Compact)
            .with_overrides_from(vars(&[("FORKPOOL_LOG_FORMAT", "xml")]));
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_file_appender_writes_into_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new()
            .with_file(dir.path().join("run.log"))
            .with_rotation(LogRotation::Never);
        assert!(config.file_appender().is_some());
        assert!(dir.path().join("run.log").exists());
        assert!(LogConfig::new().file_appender().is_none());
    }
}
