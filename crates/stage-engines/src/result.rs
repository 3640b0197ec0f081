//! Engine execution outcome types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of an engine execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine finished successfully.
    Success,
    /// Engine reported a failure.
    Error,
}

impl EngineStatus {
    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Success)
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Success => write!(f, "success"),
            EngineStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of an engine execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutcome {
    /// Execution status.
    pub status: EngineStatus,

    /// Scalar values returned directly by the engine, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub return_values: BTreeMap<String, serde_json::Value>,

    /// Error message if status is Error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Standard output (for process engines).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Standard error (for process engines).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Exit code (for process engines).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Execution duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl EngineOutcome {
    /// Create a successful outcome with no return values.
    pub fn success() -> Self {
        Self::default()
    }

    /// Create an error outcome with message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EngineStatus::Error,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create an outcome from a finished child process.
    pub fn from_process(exit_code: i32, stdout: String, stderr: String) -> Self {
        let status = if exit_code == 0 {
            EngineStatus::Success
        } else {
            EngineStatus::Error
        };

        Self {
            status,
            error: if exit_code != 0 {
                Some(format!("Command exited with code {}", exit_code))
            } else {
                None
            },
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    /// Add a return value.
    pub fn with_return_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.return_values.insert(name.into(), value);
        self
    }

    /// Set the execution duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Returns true if the outcome indicates success.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl Default for EngineOutcome {
    fn default() -> Self {
        Self {
            status: EngineStatus::Success,
            return_values: BTreeMap::new(),
            error: None,
            stdout: None,
            stderr: None,
            exit_code: None,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(EngineStatus::Success.to_string(), "success");
        assert_eq!(EngineStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_outcome_from_process() {
        let outcome = EngineOutcome::from_process(0, "ok".to_string(), String::new());
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.error.is_none());

        let outcome = EngineOutcome::from_process(3, String::new(), "boom".to_string());
        assert!(!outcome.is_success());
        assert_eq!(outcome.error.as_deref(), Some("Command exited with code 3"));
    }

    #[test]
    fn test_outcome_return_values() {
        let outcome = EngineOutcome::success()
            .with_return_value("count", serde_json::json!(2))
            .with_duration(15);
        assert_eq!(outcome.return_values["count"], serde_json::json!(2));

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"duration_ms\":15"));
    }
}
