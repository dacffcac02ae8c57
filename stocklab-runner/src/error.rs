//! Run-level error taxonomy with stable wire kinds.

use stocklab_core::data::SelectorError;
use stocklab_core::engine::EngineError;
use stocklab_core::strategy::StrategyError;
use stocklab_core::venue::{ClassifyError, RulesError};
use thiserror::Error;

/// Tagged failure for a whole run. Surfaced before any bar iterates, except
/// `Internal`, which aborts a run mid-way and discards partial state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    UnknownSymbol(#[from] ClassifyError),

    #[error("no data for '{symbol}' in the requested range")]
    NoData { symbol: String },

    #[error("data adapters unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("run cancelled before it started")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Stable kind string for the API surface.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::InvalidConfig(_) => "INVALID_CONFIG",
            RunError::UnknownSymbol(_) => "UNKNOWN_SYMBOL",
            RunError::NoData { .. } => "NO_DATA",
            RunError::AdapterUnavailable(_) => "ADAPTER_UNAVAILABLE",
            RunError::Cancelled => "CANCELLED",
            RunError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<SelectorError> for RunError {
    fn from(err: SelectorError) -> Self {
        match err {
            SelectorError::NoData { symbol } => RunError::NoData { symbol },
            other => RunError::AdapterUnavailable(other.to_string()),
        }
    }
}

impl From<RulesError> for RunError {
    fn from(err: RulesError) -> Self {
        // A missing or inapplicable layer is a configuration problem.
        RunError::InvalidConfig(err.to_string())
    }
}

impl From<StrategyError> for RunError {
    fn from(err: StrategyError) -> Self {
        RunError::InvalidConfig(err.to_string())
    }
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        RunError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RunError::InvalidConfig("x".into()).kind(), "INVALID_CONFIG");
        assert_eq!(
            RunError::UnknownSymbol(ClassifyError::UnknownSymbol("!!".into())).kind(),
            "UNKNOWN_SYMBOL"
        );
        assert_eq!(RunError::NoData { symbol: "s".into() }.kind(), "NO_DATA");
        assert_eq!(
            RunError::AdapterUnavailable("down".into()).kind(),
            "ADAPTER_UNAVAILABLE"
        );
        assert_eq!(RunError::Cancelled.kind(), "CANCELLED");
        assert_eq!(RunError::Internal("bug".into()).kind(), "INTERNAL");
    }

    #[test]
    fn selector_errors_map_by_kind() {
        let e: RunError = SelectorError::NoData { symbol: "600000".into() }.into();
        assert_eq!(e.kind(), "NO_DATA");
        let e: RunError = SelectorError::AllAdaptersFailed {
            last_error: "timeout".into(),
        }
        .into();
        assert_eq!(e.kind(), "ADAPTER_UNAVAILABLE");
    }
}
