use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Default filter directives: Vela components at info, chatty transport dependencies
/// quietened. `RUST_LOG` overrides the whole set.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn,redis=warn";

/// Output format of Vela logs.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output, for development and backtest runs.
    #[default]
    Text,
    /// Flattened JSON, for log aggregation in live deployments.
    Json,
}

/// Initialise process-wide logging in the provided format.
///
/// Call once at startup; a second initialisation panics (the subscriber is global).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parses_from_config() {
        assert_eq!(
            serde_json::from_str::<LogFormat>(r#""json""#).unwrap(),
            LogFormat::Json
        );
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
