//! Tracing management for xian.
//!
//! Builds the global subscriber from a stdout layer and an optional file layer. Each layer
//! carries its own [`LogFormat`] and filter directives on top of the verbosity chosen by the
//! caller.

use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use clap::ValueEnum;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{
    filter::Directive, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use tracing_appender::non_blocking::WorkerGuard as FileWorkerGuard;

// Re-export tracing crates
pub use tracing;
pub use tracing_subscriber;

/// A boxed tracing [Layer].
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// The format of the log messages.
#[derive(Debug, Copy, Clone, ValueEnum, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[value(name = "json")]
    Json,

    /// `key=value` pairs, for log collectors.
    #[value(name = "log-fmt")]
    LogFmt,

    /// Human readable output.
    #[value(name = "terminal")]
    Terminal,
}

impl LogFormat {
    /// Builds the layer for this format. When `writer` is given, events go to the file behind it
    /// instead of stdout, without ANSI codes.
    pub fn apply(
        &self,
        filter: EnvFilter,
        color: Option<String>,
        writer: Option<NonBlocking>,
    ) -> BoxedLayer<Registry> {
        let ansi = match color {
            Some(color) if writer.is_none() => std::env::var("RUST_LOG_STYLE")
                .map(|val| val != "never")
                .unwrap_or(color != "never"),
            _ => false,
        };
        let target = std::env::var("RUST_LOG_TARGET").map(|val| val != "0").unwrap_or(true);

        match (self, writer) {
            (LogFormat::Json, Some(writer)) => tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(target)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
            (LogFormat::Json, None) => tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(ansi)
                .with_target(target)
                .with_filter(filter)
                .boxed(),
            (LogFormat::LogFmt, None) => tracing_logfmt::layer().with_filter(filter).boxed(),
            // logfmt only writes to stdout, so files fall back to the plain terminal layout
            (LogFormat::LogFmt, Some(writer)) | (LogFormat::Terminal, Some(writer)) => {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(target)
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed()
            }
            (LogFormat::Terminal, None) => tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_target(target)
                .with_filter(filter)
                .boxed(),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::LogFmt => write!(f, "log-fmt"),
            LogFormat::Terminal => write!(f, "terminal"),
        }
    }
}

/// Configuration of a single tracing layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    format: LogFormat,
    default_directive: String,
    filters: String,
    color: Option<String>,
}

impl LayerInfo {
    /// Creates a new [LayerInfo].
    ///
    /// `default_directive` is the level used when `RUST_LOG` is unset, `filters` is a comma
    /// separated list of extra directives, and `color` is the color mode, if any.
    pub fn new(
        format: LogFormat,
        default_directive: String,
        filters: String,
        color: Option<String>,
    ) -> Self {
        Self { format, default_directive, filters, color }
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            default_directive: "info".to_string(),
            filters: String::new(),
            color: Some("always".to_string()),
        }
    }
}

/// Where to write the log file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    dir: PathBuf,
    file_name: String,
}

impl FileInfo {
    /// Creates a new [FileInfo] writing `file_name` inside `dir`.
    pub fn new(dir: PathBuf, file_name: String) -> Self {
        Self { dir, file_name }
    }
}

/// A type that can install itself as the global tracing subscriber.
pub trait Tracer {
    /// Installs the subscriber. The returned guard, if any, must be held for as long as logs
    /// should be flushed to the log file.
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>>;
}

/// The xian tracer: a stdout layer plus an optional file layer.
#[derive(Debug, Clone)]
pub struct XianTracer {
    stdout: LayerInfo,
    file: Option<(LayerInfo, FileInfo)>,
}

impl XianTracer {
    /// Creates a tracer that logs `info` and above to stdout.
    pub fn new() -> Self {
        Self { stdout: LayerInfo::default(), file: None }
    }

    /// Replaces the stdout layer.
    pub fn with_stdout(mut self, config: LayerInfo) -> Self {
        self.stdout = config;
        self
    }

    /// Adds a layer writing to a file.
    pub fn with_file(mut self, config: LayerInfo, file: FileInfo) -> Self {
        self.file = Some((config, file));
        self
    }
}

impl Default for XianTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for XianTracer {
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>> {
        let mut layers: Vec<BoxedLayer<Registry>> = Vec::new();

        layers.push(self.stdout.format.apply(
            build_env_filter(Some(self.stdout.default_directive.parse()?), &self.stdout.filters)?,
            self.stdout.color,
            None,
        ));

        let mut guard = None;
        if let Some((config, file)) = self.file {
            let appender = tracing_appender::rolling::never(&file.dir, &file.file_name);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            layers.push(config.format.apply(
                build_env_filter(Some(config.default_directive.parse()?), &config.filters)?,
                None,
                Some(writer),
            ));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry().with(layers).try_init()?;
        Ok(guard)
    }
}

/// Builds an [EnvFilter] from `RUST_LOG`, falling back to `default_directive`, and adds each
/// comma separated directive in `directives` on top.
pub fn build_env_filter(
    default_directive: Option<Directive>,
    directives: &str,
) -> eyre::Result<EnvFilter> {
    let env_filter = if let Some(default_directive) = default_directive {
        EnvFilter::builder().with_default_directive(default_directive).from_env_lossy()
    } else {
        EnvFilter::builder().from_env_lossy()
    };

    directives
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .try_fold(env_filter, |env_filter, directive| {
            Ok(env_filter.add_directive(directive.parse()?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_display_matches_value_names() {
        for format in LogFormat::value_variants() {
            let parsed =
                LogFormat::from_str(&format.to_string(), false).expect("format should parse");
            assert_eq!(&parsed, format);
        }
    }

    #[test]
    fn test_build_env_filter_accepts_directives() {
        let filter = build_env_filter(Some(tracing::Level::WARN.into()), "xian_decompiler=debug, ")
            .expect("filter should build");
        assert!(filter.to_string().contains("xian_decompiler=debug"));
    }
}
