use serde::{Deserialize, Serialize};
use thiserror::Error;
use vela_data::DataError;
use vela_execution::ExecutionError;
use vela_risk::RiskError;

/// Stable error vocabulary surfaced at every API boundary.
///
/// The transport layer may map kinds onto status codes, but the kind itself is the
/// authoritative signal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    RuleViolation,
    InsufficientPosition,
    ExchangeRejected,
    ExchangeTimeout,
    StateCorruption,
    ConfigError,
}

/// All errors surfaced by the `vela` crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VelaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("order rejected by rule {rule}: {reason}")]
    RuleViolation { rule: String, reason: String },

    #[error("market data: {0}")]
    MarketData(#[from] DataError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    #[error("risk: {0}")]
    Risk(#[from] RiskError),

    #[error("engine: {0}")]
    Engine(#[from] crate::engine::error::EngineError),
}

impl VelaError {
    /// The stable [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VelaError::InvalidInput(_) => ErrorKind::InvalidInput,
            VelaError::RuleViolation { .. } => ErrorKind::RuleViolation,
            VelaError::MarketData(_) => ErrorKind::InvalidInput,
            VelaError::Execution(error) => match error {
                ExecutionError::InsufficientPosition { .. } => ErrorKind::InsufficientPosition,
                ExecutionError::Timeout { .. } => ErrorKind::ExchangeTimeout,
                ExecutionError::Rejected(_) | ExecutionError::RateLimit => {
                    ErrorKind::ExchangeRejected
                }
                ExecutionError::Network(_) => ErrorKind::ExchangeTimeout,
                _ => ErrorKind::InvalidInput,
            },
            VelaError::Risk(error) => match error {
                RiskError::RulePrecondition { .. } | RiskError::ConfigError(_) => {
                    ErrorKind::ConfigError
                }
                _ => ErrorKind::StateCorruption,
            },
            VelaError::Engine(error) => match error {
                crate::engine::error::EngineError::StateCorruption(_) => {
                    ErrorKind::StateCorruption
                }
                _ => ErrorKind::InvalidInput,
            },
        }
    }
}

/// Serialisable API response body: `{ok, value} | {err: {kind, message, details?}}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Ok { ok: bool, value: T },
    Err { ok: bool, err: ApiError },
}

/// Error body of an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(value: T) -> Self {
        Self::Ok { ok: true, value }
    }

    pub fn err(error: &VelaError) -> Self {
        Self::Err {
            ok: false,
            err: ApiError {
                kind: error.kind(),
                message: error.to_string(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let error = VelaError::RuleViolation {
            rule: String::from("order_size_limit"),
            reason: String::from("Order size too large"),
        };
        assert_eq!(error.kind(), ErrorKind::RuleViolation);

        let error = VelaError::Execution(ExecutionError::Timeout { attempts: 4 });
        assert_eq!(error.kind(), ErrorKind::ExchangeTimeout);

        let error = VelaError::Execution(ExecutionError::InsufficientPosition {
            requested: String::from("2"),
            held: String::from("1"),
        });
        assert_eq!(error.kind(), ErrorKind::InsufficientPosition);
    }

    #[test]
    fn test_api_response_serialises_kind_snake_case() {
        let error = VelaError::InvalidInput(String::from("unknown symbol"));
        let body = serde_json::to_value(ApiResponse::<()>::err(&error)).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["err"]["kind"], "invalid_input");
    }
}
