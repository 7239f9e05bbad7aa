//! Domain error types.

/// Top-level error type for macrosentinel.
///
/// Only missing or malformed top-level artifacts surface here; per-step
/// numeric edge cases are recovered locally with neutral defaults.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
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

    #[error("indicator input not found: {path}")]
    InputMissing { path: String },

    #[error("malformed indicator input at line {line}: {reason}")]
    InputParse { line: u64, reason: String },

    #[error("invalid allocation weights: {reason}")]
    InvalidWeights { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SentinelError> for std::process::ExitCode {
    fn from(err: &SentinelError) -> Self {
        let code: u8 = match err {
            SentinelError::Io(_) | SentinelError::Csv(_) => 1,
            SentinelError::ConfigParse { .. }
            | SentinelError::ConfigMissing { .. }
            | SentinelError::ConfigInvalid { .. } => 2,
            SentinelError::InputMissing { .. } | SentinelError::InputParse { .. } => 5,
            SentinelError::InvalidWeights { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
