//! Subscriber setup for hosts embedding the engine.

use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_env_value(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "trellis=debug,info"
    } else {
        "trellis=info,warn"
    }
}

/// Build the filter from `TRELLIS_LOG`, falling back to the defaults.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("TRELLIS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env::var("DEBUG").is_ok())))
}

/// Install the global tracing subscriber.
///
/// Format comes from `TRELLIS_LOG_FORMAT` (`compact` or `json`). Calling this
/// twice is harmless; the second install is ignored.
pub fn init_tracing() {
    let format = LogFormat::from_env_value(env::var("TRELLIS_LOG_FORMAT").ok().as_deref());
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_compact() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Compact);
        assert_eq!(LogFormat::from_env_value(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Compact);
    }

    #[test]
    fn default_directives_target_trellis() {
        assert!(default_directives(false).starts_with("trellis=info"));
        assert!(default_directives(true).starts_with("trellis=debug"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
