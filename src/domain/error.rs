//! Domain error types.
//!
//! Only configuration problems, fatal terminal initialisation failures and
//! output sink failures are errors. Data gaps, invalid sizing inputs and
//! broker rejections are resolved inside the cycle and never reach this type.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
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

    #[error("terminal initialisation failed: {reason}")]
    TerminalInit { reason: String },

    #[error("symbol {symbol} unavailable: {reason}")]
    SymbolUnavailable { symbol: String, reason: String },

    #[error("market data error: {reason}")]
    Data { reason: String },

    #[error("journal error: {reason}")]
    Journal { reason: String },

    #[error("snapshot error: {reason}")]
    Snapshot { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that must stop the process before the loop starts.
    pub fn is_fatal_init(&self) -> bool {
        matches!(
            self,
            EngineError::TerminalInit { .. } | EngineError::SymbolUnavailable { .. }
        )
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) | EngineError::Journal { .. } | EngineError::Snapshot { .. } => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::TerminalInit { .. } | EngineError::SymbolUnavailable { .. } => 3,
            EngineError::Data { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
