//! Logging and tracing initialization.
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` wins over the level
//! passed in; noisy HTTP crates are capped at `warn` either way.

use metricbuf_domain::{impl_state_conversions, MetricbufError, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, ANSI colors when stdout is a terminal
    #[default]
    Text,
    /// One JSON object per event, for log aggregation
    Json,
    /// Single-line output without targets
    Compact,
}

impl_state_conversions!(LogFormat {
    Text => "text",
    Json => "json",
    Compact => "compact",
});

const QUIET_DIRECTIVES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "tower=warn"];

/// Build the event filter for `level` (trace, debug, info, warn, error).
pub fn build_filter(level: &str) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    QUIET_DIRECTIVES
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(filter, EnvFilter::add_directive)
}

/// Initializes the logging subsystem.
///
/// # Errors
/// Returns `MetricbufError::Internal` if a global subscriber is already set.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            registry
                .with(fmt::layer().with_target(true).with_ansi(is_terminal))
                .try_init()
        }
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_ansi(false))
            .try_init(),
    };

    result.map_err(|e| MetricbufError::Internal(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert_eq!(LogFormat::default().to_string(), "text");
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn filter_carries_quiet_directives() {
        let rendered = build_filter("debug").to_string();
        assert!(rendered.contains("hyper=warn"), "{rendered}");
        assert!(rendered.contains("reqwest=warn"), "{rendered}");
    }

    #[test]
    fn second_init_reports_an_error() {
        let _ = init_logging("info", LogFormat::Compact);
        assert!(matches!(init_logging("info", LogFormat::Text), Err(MetricbufError::Internal(_))));
    }
}
