//! Domain error types.

use super::frame::ObservationShape;

/// Top-level error type for candlegym.
#[derive(Debug, thiserror::Error)]
pub enum GymError {
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

    #[error("observation shape mismatch: policy expects {expected}, environment produces {actual}")]
    ShapeMismatch {
        expected: ObservationShape,
        actual: ObservationShape,
    },

    #[error("invalid market data: {reason}")]
    InvalidData { reason: String },

    #[error("insufficient data: have {rows} rows, need {minimum}")]
    InsufficientData { rows: usize, minimum: usize },

    #[error("dataset error: {reason}")]
    Dataset { reason: String },

    #[error("wallet error: {reason}")]
    Wallet { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GymError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        GymError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&GymError> for std::process::ExitCode {
    fn from(err: &GymError) -> Self {
        let code: u8 = match err {
            GymError::Io(_) => 1,
            GymError::ConfigParse { .. }
            | GymError::ConfigMissing { .. }
            | GymError::ConfigInvalid { .. } => 2,
            GymError::ShapeMismatch { .. }
            | GymError::InvalidData { .. }
            | GymError::InsufficientData { .. } => 3,
            GymError::Dataset { .. } => 4,
            GymError::Wallet { .. } | GymError::Json(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
