//! Engine error types.

use thiserror::Error;

/// Errors that can occur while constructing or running an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine not found in registry.
    #[error("Engine not found: {0}")]
    NotFound(String),

    /// Declared parameter combination rule violated.
    #[error("Invalid parameter combination: {0}")]
    InvalidParameterCombination(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Engine execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// Process spawn error.
    #[error("Process error: {0}")]
    Process(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Json(e.to_string())
    }
}

impl From<minijinja::Error> for EngineError {
    fn from(e: minijinja::Error) -> Self {
        EngineError::Template(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NotFound("transform".to_string());
        assert_eq!(err.to_string(), "Engine not found: transform");

        let err = EngineError::InvalidParameterCombination("a and b".to_string());
        assert_eq!(err.to_string(), "Invalid parameter combination: a and b");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let engine_err: EngineError = io_err.into();
        assert!(matches!(engine_err, EngineError::Io(_)));
    }
}
