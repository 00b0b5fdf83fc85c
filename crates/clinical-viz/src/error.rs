//! Error types for the clinical visualization core.
//!
//! Degenerate statistics (empty groups, zero variance, fewer than two groups)
//! are NOT errors: they are reported through sentinel values in
//! [`crate::types::GroupStats`]. The variants below cover inputs the core
//! refuses to work with.
//!
//! Errors are serializable so a UI shell can forward them as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::config::ConfigValidationError;

/// The main error type for binning, density estimation and chart synthesis.
#[derive(Error, Debug)]
pub enum VizError {
    /// Dataset is missing, not an array, empty, or holds non-object rows.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uploaded bundle lacks one or more required keys.
    #[error("The JSON file is missing the following keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    /// Column was not found in any row of the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Quantile requested outside of [0, 1].
    #[error("Quantile must be a value between 0 and 1, got {0}")]
    QuantileOutOfRange(f64),

    /// No usable values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Option bag failed validation.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VizError>,
    },
}

impl VizError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VizError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::MissingKeys(_) => "MISSING_KEYS",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::QuantileOutOfRange(_) => "RANGE_VIOLATION",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::Config(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the caller should surface this as a user notification
    /// (bad upload or bad option) rather than an internal failure.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::InvalidInput(_)
            | Self::MissingKeys(_)
            | Self::QuantileOutOfRange(_)
            | Self::Config(_) => true,
            Self::WithContext { source, .. } => source.is_user_facing(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for VizError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("VizError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for visualization operations.
pub type Result<T> = std::result::Result<T, VizError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serde_json::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| VizError::Json(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            VizError::InvalidInput("x".to_string()).error_code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            VizError::QuantileOutOfRange(1.5).error_code(),
            "RANGE_VIOLATION"
        );
    }

    #[test]
    fn test_missing_keys_message_lists_all_keys() {
        let error = VizError::MissingKeys(vec![
            "dataframe".to_string(),
            "availableDimensions".to_string(),
        ]);
        assert_eq!(
            error.to_string(),
            "The JSON file is missing the following keys: dataframe, availableDimensions"
        );
    }

    #[test]
    fn test_is_user_facing() {
        assert!(VizError::InvalidInput("empty".to_string()).is_user_facing());
        assert!(VizError::QuantileOutOfRange(-0.1).is_user_facing());
        assert!(!VizError::NoValidValues("age".to_string()).is_user_facing());
    }

    #[test]
    fn test_error_serialization() {
        let error = VizError::ColumnNotFound("age".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("age"));
    }

    #[test]
    fn test_with_context() {
        let error = VizError::NoValidValues("Dim 1".to_string()).with_context("During density map");
        assert!(error.to_string().contains("During density map"));
        assert_eq!(error.error_code(), "NO_VALID_VALUES");
    }
}
