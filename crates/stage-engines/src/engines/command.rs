//! External process engine.
//!
//! Runs a configured command line with the invocation exported through the
//! environment:
//! - `STAGE_INPUTS`, `STAGE_OUTPUTS`, `STAGE_PARAMETERS`: JSON documents
//! - `STAGE_RUN_ID`: run identifier
//! - `STAGE_RETURN_VALUES`: path of a file the process may fill with a JSON
//!   object of scalar return values

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::context::Invocation;
use crate::error::EngineError;
use crate::registry::{Engine, OutputContract, PrepareRequest};
use crate::result::EngineOutcome;
use crate::spec::ExecutorConfig;
use crate::template::TemplateEngine;

/// Command engine configuration (the `executor` block of a spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Command to execute. May reference `inputs`, `outputs`, `params`.
    pub command: String,

    /// Shell to use (default: "bash").
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Environment variables.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether to capture output (default: true).
    #[serde(default = "default_capture")]
    pub capture: bool,
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_capture() -> bool {
    true
}

/// External process engine.
pub struct CommandEngine {
    template_engine: TemplateEngine,
}

impl CommandEngine {
    /// Create a new command engine.
    pub fn new() -> Self {
        Self {
            template_engine: TemplateEngine::new(),
        }
    }

    /// Run a command line to completion.
    pub async fn run_process(
        &self,
        command: &str,
        config: &CommandConfig,
        extra_env: &[(&str, String)],
    ) -> Result<EngineOutcome, EngineError> {
        let start = std::time::Instant::now();

        let mut cmd = Command::new(&config.shell);
        cmd.arg("-c").arg(command);

        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }

        for (k, v) in &config.env {
            cmd.env(k, v);
        }
        for (k, v) in extra_env {
            cmd.env(k, v);
        }

        if config.capture {
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Process(format!("Failed to spawn process: {}", e)))?;

        let stdout_handle = tokio::spawn(collect_lines(child.stdout.take()));
        let stderr_handle = tokio::spawn(collect_lines(child.stderr.take()));

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Process(format!("Failed to wait for process: {}", e)))?;

        let exit_code = status.code().unwrap_or(-1);
        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(EngineOutcome::from_process(exit_code, stdout, stderr).with_duration(duration_ms))
    }

    /// Parse the command config from the executor binding.
    fn parse_config(&self, executor: &ExecutorConfig) -> Result<CommandConfig, EngineError> {
        serde_json::from_value(executor.config.clone())
            .map_err(|e| EngineError::Configuration(format!("Invalid command config: {}", e)))
    }
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn collect_lines<R>(reader: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut output = String::new();
    if let Some(reader) = reader {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            output.push_str(&line);
            output.push('\n');
        }
    }
    output
}

/// Read the return values file written by the child, if any.
async fn read_return_values(
    path: &std::path::Path,
) -> Result<serde_json::Map<String, serde_json::Value>, EngineError> {
    let content = tokio::fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }

    match serde_json::from_str(&content)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(EngineError::Json(format!(
            "Return values must be a JSON object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Engine for CommandEngine {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<OutputContract, EngineError> {
        self.parse_config(&request.spec.executor)?;
        request.spec.check_constraints(request.params)?;
        Ok(OutputContract::from_spec(request.spec, request.inputs))
    }

    async fn execute(&self, invocation: &Invocation) -> Result<EngineOutcome, EngineError> {
        let config = self.parse_config(&invocation.executor)?;

        let command = if TemplateEngine::is_template(&config.command) {
            self.template_engine
                .render_with_invocation(&config.command, invocation)?
        } else {
            config.command.clone()
        };

        let return_file = tempfile::NamedTempFile::new()?;
        let env = [
            ("STAGE_INPUTS", serde_json::to_string(&invocation.inputs)?),
            ("STAGE_OUTPUTS", serde_json::to_string(&invocation.outputs)?),
            ("STAGE_PARAMETERS", serde_json::to_string(&invocation.parameters)?),
            ("STAGE_RUN_ID", invocation.run_id.clone()),
            (
                "STAGE_RETURN_VALUES",
                return_file.path().to_string_lossy().to_string(),
            ),
        ];

        tracing::debug!(
            command = %command,
            shell = %config.shell,
            cwd = ?config.cwd,
            "Executing engine command"
        );

        let outcome = self.run_process(&command, &config, &env).await?;

        if let Some(stderr) = outcome.stderr.as_deref().filter(|s| !s.is_empty()) {
            tracing::debug!(stderr = %stderr.trim_end(), "Engine command stderr");
        }

        if !outcome.is_success() {
            let stderr = outcome.stderr.as_deref().unwrap_or("").trim_end();
            return Err(EngineError::ExecutionFailed(format!(
                "command exited with code {}{}",
                outcome.exit_code.unwrap_or(-1),
                if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                }
            )));
        }

        let mut outcome = outcome;
        outcome
            .return_values
            .extend(read_return_values(return_file.path()).await?);
        Ok(outcome)
    }
}
