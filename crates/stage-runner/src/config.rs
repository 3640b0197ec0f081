//! Runner configuration.

use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Per-invocation runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Directory searched for `<name>.yaml` component specs.
    pub spec_dir: Option<PathBuf>,
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let log_format = std::env::var("STAGE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let log_filter = std::env::var("STAGE_LOG_FILTER")
            .unwrap_or_else(|_| default_log_filter().to_string());

        let spec_dir = std::env::var("STAGE_SPEC_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            log_format,
            log_filter,
            spec_dir,
        }
    }

    /// Override the log format.
    pub fn with_log_format(mut self, log_format: Option<LogFormat>) -> Self {
        if let Some(format) = log_format {
            self.log_format = format;
        }
        self
    }
}

fn default_log_filter() -> &'static str {
    "info,stage_runner=debug,stage_engines=debug"
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            log_filter: default_log_filter().to_string(),
            spec_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RunnerConfig::default();
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.spec_dir.is_none());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_cli_override() {
        let config = RunnerConfig::default().with_log_format(Some(LogFormat::Json));
        assert_eq!(config.log_format, LogFormat::Json);

        let config = config.with_log_format(None);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
