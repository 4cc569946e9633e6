//! Error types for the color pipeline.

/// Errors that can occur while encoding, decoding, matching or calibrating.
#[derive(Debug, thiserror::Error)]
pub enum ColorSenseError {
    /// The binary database is not in a format this decoder understands.
    #[error("Invalid database format: {reason}")]
    Format {
        /// What was wrong with the buffer.
        reason: String,
    },

    /// A record could not be encoded.
    #[error("Invalid record {index}: {reason}")]
    Validation {
        /// Position of the offending record in the input.
        index: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// The database yielded no usable records.
    #[error("No color records available to match against")]
    NotFound,

    /// A calibration coefficient would leave the safety bound.
    #[error("Refusing to set {key} to {value:.6} (safety bound is +/-{bound})")]
    SafetyClamp {
        /// The setting key, e.g. `darkMatrix0`.
        key: String,
        /// The rejected value.
        value: f64,
        /// The configured bound.
        bound: f64,
    },

    /// A tuning step was requested from the wrong phase.
    #[error("Cannot {action} while tuning session is {phase}")]
    InvalidTransition {
        /// The requested step.
        action: &'static str,
        /// The phase the session was in.
        phase: &'static str,
    },

    /// A confirmation named a proposal the session does not hold.
    #[error("No proposal {index}: only {pending} pending")]
    UnknownProposal {
        /// The requested proposal index.
        index: usize,
        /// How many proposals are pending.
        pending: usize,
    },

    /// A calibration matrix could not be fitted to the reference points.
    #[error("Cannot solve calibration matrix: {reason}")]
    Solve {
        /// Why the fit failed.
        reason: String,
    },

    /// A settings key is not part of the calibration state.
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// A settings value could not be parsed for its key.
    #[error("Invalid value {value:?} for setting {key}")]
    InvalidSettingValue {
        /// The setting key.
        key: String,
        /// The raw value provided.
        value: String,
    },

    /// An I/O error occurred (e.g., reading the database file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings or authoring JSON could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ColorSenseError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    pub(crate) fn solve(reason: impl Into<String>) -> Self {
        Self::Solve {
            reason: reason.into(),
        }
    }

    /// Whether the error rejects a single item and leaves the surrounding
    /// operation usable (a tuning session, an encode of other records).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ColorSenseError::SafetyClamp { .. }
                | ColorSenseError::UnknownSetting(_)
                | ColorSenseError::InvalidSettingValue { .. }
                | ColorSenseError::UnknownProposal { .. }
        )
    }
}
