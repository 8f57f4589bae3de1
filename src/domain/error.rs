//! Domain error types.

/// Top-level error type for swingtrader.
#[derive(Debug, thiserror::Error)]
pub enum SwingError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("invalid quantity: {reason}")]
    InvalidQuantity { reason: String },

    #[error("unknown or closed position #{id}")]
    UnknownPosition { id: u64 },

    #[error("already holding {symbol}")]
    AlreadyHolding { symbol: String },

    #[error("ledger invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("a cycle is already in flight")]
    SchedulerOverlap,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SwingError {
    /// Errors that drop a symbol or signal for one cycle without failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SwingError::DataUnavailable { .. }
                | SwingError::InsufficientFunds { .. }
                | SwingError::AlreadyHolding { .. }
        )
    }
}

impl From<&SwingError> for std::process::ExitCode {
    fn from(err: &SwingError) -> Self {
        let code: u8 = match err {
            SwingError::Io(_) => 1,
            SwingError::ConfigParse { .. }
            | SwingError::ConfigMissing { .. }
            | SwingError::ConfigInvalid { .. } => 2,
            SwingError::Database { .. } | SwingError::DatabaseQuery { .. } => 3,
            SwingError::InsufficientFunds { .. }
            | SwingError::InvalidQuantity { .. }
            | SwingError::UnknownPosition { .. }
            | SwingError::AlreadyHolding { .. } => 4,
            SwingError::DataUnavailable { .. } => 5,
            SwingError::InvariantViolation { .. } | SwingError::SchedulerOverlap => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        let data = SwingError::DataUnavailable {
            symbol: "BHP.AX".into(),
            reason: "timeout".into(),
        };
        assert!(data.is_recoverable());

        let funds = SwingError::InsufficientFunds {
            required: 10.0,
            available: 5.0,
        };
        assert!(funds.is_recoverable());

        let qty = SwingError::InvalidQuantity {
            reason: "zero".into(),
        };
        assert!(!qty.is_recoverable());
        assert!(!SwingError::SchedulerOverlap.is_recoverable());
    }

    #[test]
    fn display_includes_context() {
        let err = SwingError::InsufficientFunds {
            required: 1234.5,
            available: 100.0,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: need 1234.50, have 100.00"
        );

        let err = SwingError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        };
        assert_eq!(err.to_string(), "missing config key [sqlite] path");
    }
}
