use thiserror::Error;

/// All errors generated by the backtest engine and event bus.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("BuilderIncomplete: {0}")]
    BuilderIncomplete(&'static str),

    #[error("market data unavailable for {0}")]
    MarketDataUnavailable(String),

    #[error("execution failure: {0}")]
    Execution(String),

    #[error("portfolio accounting identity violated: {0}")]
    StateCorruption(String),

    #[error("unknown order: {0}")]
    UnknownOrder(String),
}

impl From<vela_execution::ExecutionError> for EngineError {
    fn from(error: vela_execution::ExecutionError) -> Self {
        Self::Execution(error.to_string())
    }
}
