//! Logging for meshpath nodes.
//!
//! All crates emit structured events through `tracing`; this crate installs
//! the global subscriber that renders them.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Verbosity above the default `info` level (1 = debug, 2+ = trace).
    #[serde(default)]
    pub verbosity: u8,

    /// Only show errors. Overrides every other setting.
    #[serde(default)]
    pub quiet: bool,

    /// Extra comma-separated filter directives, e.g. `meshpath_circuit=trace`.
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit one JSON object per event instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

/// Build the event filter for `config`.
///
/// Precedence:
/// 1. If `quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or the level derived from `verbosity`
/// 3. Apply any extra directives from `filter`
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    if config.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match config.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &config.filter {
        for directive in custom_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring invalid log directive {directive:?}: {e}"),
            }
        }
    }

    filter
}

/// Install the global `tracing` subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> eyre::Result<()> {
    let stdout_layer = fmt::Layer::new().with_target(true);
    let stdout_layer = if config.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(build_filter(config))
        .try_init()?;

    tracing::debug!(?config, "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_everything() {
        let config = LogConfig {
            verbosity: 2,
            quiet: true,
            filter: Some("meshpath_circuit=trace".to_string()),
            json: false,
        };
        assert_eq!(build_filter(&config).to_string(), "error");
    }

    #[test]
    fn test_custom_directives_are_applied() {
        let config = LogConfig {
            filter: Some("meshpath_circuit=trace, ,meshpath_net_exchange=debug".to_string()),
            ..Default::default()
        };
        let rendered = build_filter(&config).to_string();
        assert!(rendered.contains("meshpath_circuit=trace"));
        assert!(rendered.contains("meshpath_net_exchange=debug"));
    }

    #[test]
    fn test_config_defaults_from_empty_document() {
        let config: LogConfig = toml::from_str("").unwrap();
        assert_eq!(config, LogConfig::default());

        let config: LogConfig = toml::from_str("verbosity = 1\njson = true").unwrap();
        assert_eq!(config.verbosity, 1);
        assert!(config.json);
    }
}
