//! Error types for the stage runner.
//!
//! Every error aborts the invocation. [`StageError::stage`] names the
//! pipeline stage that raised it for the diagnostic line.

use stage_engines::{EngineError, ParameterType};
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ArgumentResolution,
    Binding,
    Materialization,
    EngineConstruction,
    Invocation,
    Serialization,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ArgumentResolution => "argument resolution",
            Stage::Binding => "binding",
            Stage::Materialization => "materialization",
            Stage::EngineConstruction => "engine construction",
            Stage::Invocation => "invocation",
            Stage::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Errors raised while running a stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Malformed command line, or a help/version request.
    #[error(transparent)]
    Usage(clap::Error),

    /// Required flag absent.
    #[error("Missing required argument(s): {0}")]
    MissingArgument(String),

    /// Component spec could not be found, read or validated.
    #[error("Invalid component: {0}")]
    Specification(String),

    /// Structured parameter payload could not be decoded.
    #[error("Failed to decode parameter '{name}' as {expected}: {reason}")]
    ParameterDecodeError {
        name: String,
        expected: ParameterType,
        reason: String,
    },

    /// Declared input path does not exist.
    #[error("Base path for input '{name}' not found: {}", path.display())]
    BasePathNotFound { name: String, path: PathBuf },

    /// Mutually exclusive or jointly required parameters misused.
    #[error("Invalid parameter combination: {0}")]
    InvalidParameterCombination(String),

    /// No engine registered for the spec's executor kind.
    #[error("Engine '{0}' is not registered")]
    EngineNotFound(String),

    /// Engine rejected its configuration.
    #[error("Engine '{engine}' could not be constructed: {source}")]
    EngineConstruction {
        engine: String,
        #[source]
        source: EngineError,
    },

    /// Engine failed while running.
    #[error("Engine '{engine}' failed: {source}")]
    EngineExecutionFailure {
        engine: String,
        #[source]
        source: EngineError,
    },

    /// An output artifact reached invocation without a location.
    #[error("Output '{0}' has no resolved location")]
    UnresolvedOutput(String),

    /// Return value could not be serialized as its declared type.
    #[error("Cannot serialize return value '{name}' as '{type_name}': {reason}")]
    SerializationError {
        name: String,
        type_name: String,
        reason: String,
    },

    /// Engine did not produce a requested return value.
    #[error("Engine did not produce return value '{0}'")]
    MissingReturnValue(String),

    /// File system failure.
    #[error("I/O error during {stage} at {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using StageError.
pub type StageResult<T> = Result<T, StageError>;

impl StageError {
    /// Map an engine construction failure.
    pub fn construction(engine: &str, err: EngineError) -> Self {
        match err {
            EngineError::InvalidParameterCombination(msg) => {
                StageError::InvalidParameterCombination(msg)
            }
            EngineError::NotFound(kind) => StageError::EngineNotFound(kind),
            source => StageError::EngineConstruction {
                engine: engine.to_string(),
                source,
            },
        }
    }

    /// Map an engine execution failure.
    pub fn execution(engine: &str, source: EngineError) -> Self {
        StageError::EngineExecutionFailure {
            engine: engine.to_string(),
            source,
        }
    }

    /// Wrap an I/O error with the stage and path it happened at.
    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Stage that raised the error.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Usage(_) | StageError::MissingArgument(_) | StageError::Specification(_) => {
                Stage::ArgumentResolution
            }
            StageError::ParameterDecodeError { .. } => Stage::Binding,
            StageError::BasePathNotFound { .. } | StageError::UnresolvedOutput(_) => {
                Stage::Materialization
            }
            StageError::InvalidParameterCombination(_)
            | StageError::EngineNotFound(_)
            | StageError::EngineConstruction { .. } => Stage::EngineConstruction,
            StageError::EngineExecutionFailure { .. } => Stage::Invocation,
            StageError::SerializationError { .. } | StageError::MissingReturnValue(_) => {
                Stage::Serialization
            }
            StageError::Io { stage, .. } => *stage,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StageError::Usage(e) => e.exit_code(),
            _ => 1,
        }
    }
}
