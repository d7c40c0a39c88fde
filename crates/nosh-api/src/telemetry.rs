//! Tracing subscriber setup.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `LOG_FORMAT` | `text` or `json` | `text` |
//! | `LOG_FILE` | log to this file, rotated daily | stdout |
//! | `LOG_ANSI` | force colours on or off | on for stdout, off for files |
//! | `RUST_LOG` | `EnvFilter` directives | [`DEFAULT_LOG_FILTER`] |

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub const DEFAULT_LOG_FILTER: &str =
    "nosh_api=debug,nosh_core=debug,nosh_platform=info,tower_http=debug";

const DEFAULT_LOG_FILE_NAME: &str = "nosh-api.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Output settings for the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSettings {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("LOG_FORMAT") {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let file = lookup("LOG_FILE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let ansi = lookup("LOG_ANSI").map(|v| matches!(v.trim(), "true" | "1"));
        Self { format, file, ansi }
    }

    /// Colours unless disabled; files stay plain unless forced.
    pub fn use_ansi(&self) -> bool {
        self.ansi.unwrap_or(self.file.is_none())
    }

    /// Where events go, for the startup log line.
    pub fn target(&self) -> String {
        self.file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stdout)".to_string())
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (writer, guard) = match &settings.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .unwrap_or(OsStr::new(DEFAULT_LOG_FILE_NAME));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let output = fmt::layer()
        .with_writer(writer)
        .with_ansi(settings.use_ansi());
    let output: Box<dyn Layer<Registry> + Send + Sync> = match settings.format {
        LogFormat::Json => output.json().boxed(),
        LogFormat::Text => output.boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> LogSettings {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(move |key: &str| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn test_defaults_to_coloured_text_on_stdout() {
        let s = settings(&[]);
        assert_eq!(s, LogSettings::default());
        assert!(s.use_ansi());
        assert_eq!(s.target(), "(stdout)");
    }

    #[test]
    fn test_file_output_is_plain_unless_forced() {
        let s = settings(&[("LOG_FILE", "/var/log/nosh/api.log"), ("LOG_FORMAT", "JSON")]);
        assert_eq!(s.format, LogFormat::Json);
        assert_eq!(s.file.as_deref(), Some(Path::new("/var/log/nosh/api.log")));
        assert!(!s.use_ansi());

        let forced = settings(&[("LOG_FILE", "api.log"), ("LOG_ANSI", "1")]);
        assert!(forced.use_ansi());
    }

    #[test]
    fn test_blank_file_and_unknown_format_fall_back() {
        let s = settings(&[("LOG_FILE", "  "), ("LOG_FORMAT", "pretty"), ("LOG_ANSI", "no")]);
        assert_eq!(s.format, LogFormat::Text);
        assert!(s.file.is_none());
        assert_eq!(s.ansi, Some(false));
        assert!(!s.use_ansi());
    }
}
