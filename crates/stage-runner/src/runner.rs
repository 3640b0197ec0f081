//! Stage runner.
//!
//! Drives one invocation through resolve, bind, materialize, construct,
//! stamp, invoke and serialize, in that order. Nothing is written to disk
//! before engine construction succeeds.

use serde::Serialize;
use stage_engines::engines::create_default_registry;
use stage_engines::{
    ComponentSpec, EngineError, EngineRegistry, Invocation, PrepareRequest,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Instrument;

use crate::args::resolve;
use crate::binder::bind;
use crate::error::{StageError, StageResult};
use crate::materialize::{materialize_inputs, output_placeholders};
use crate::paths::assign_output_uris;
use crate::writer::{write_return_values, SerializerRegistry};

/// Per-run options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after output paths are stamped. Nothing is created or invoked.
    pub dry_run: bool,
}

/// What a run resolved and produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Engine kind.
    pub engine: String,

    /// Inputs, stamped outputs and bound parameters.
    #[serde(flatten)]
    pub invocation: Invocation,

    /// True if the engine was not invoked.
    pub dry_run: bool,

    /// Values the engine returned.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub return_values: BTreeMap<String, serde_json::Value>,

    /// Return value files written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub written: Vec<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Runs component invocations against an engine registry.
pub struct StageRunner {
    registry: EngineRegistry,
    serializers: SerializerRegistry,
}

impl StageRunner {
    /// Create a runner with the given engines and the default serializers.
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            registry,
            serializers: SerializerRegistry::default(),
        }
    }

    /// Replace the return value serializers.
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Engines available to this runner.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Run one invocation of `spec` with component arguments `argv`.
    pub async fn run(
        &self,
        spec: &ComponentSpec,
        argv: &[String],
        options: RunOptions,
    ) -> StageResult<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("stage", component = %spec.name, run_id = %run_id);

        self.run_inner(spec, argv, options, run_id)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        spec: &ComponentSpec,
        argv: &[String],
        options: RunOptions,
        run_id: String,
    ) -> StageResult<RunReport> {
        // Resolve and bind
        let args = resolve(spec, argv)?;
        let params = bind(spec, &args)?;

        // Materialize inputs
        let inputs = materialize_inputs(spec, &args)?;

        // Construct the engine and collect its output contract
        let kind = spec.executor.kind.as_str();
        let engine = self
            .registry
            .resolve(spec)
            .map_err(|e| StageError::construction(kind, e))?;
        let contract = engine
            .prepare(&PrepareRequest {
                spec,
                inputs: &inputs,
                params: &params,
            })
            .map_err(|e| StageError::construction(kind, e))?;

        // Stamp output locations
        let mut outputs = output_placeholders(spec, &contract, &args);
        assign_output_uris(&mut outputs, &args)?;

        let invocation = Invocation::new(&spec.name, &run_id, spec.executor.clone())
            .with_inputs(inputs)
            .with_outputs(outputs)
            .with_parameters(params);

        let mut report = RunReport {
            engine: kind.to_string(),
            invocation,
            dry_run: options.dry_run,
            return_values: BTreeMap::new(),
            written: Vec::new(),
            duration_ms: None,
        };

        if options.dry_run {
            tracing::info!(engine = %kind, "Dry run, engine not invoked");
            return Ok(report);
        }

        args.ensure_output_parents()?;

        // Invoke
        tracing::info!(
            engine = %kind,
            inputs = report.invocation.inputs.len(),
            outputs = report.invocation.outputs.len(),
            "Invoking engine"
        );
        let start = Instant::now();
        let outcome = engine
            .execute(&report.invocation)
            .await
            .map_err(|e| StageError::execution(kind, e))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !outcome.is_success() {
            let message = outcome
                .error
                .clone()
                .unwrap_or_else(|| format!("engine reported {}", outcome.status));
            return Err(StageError::execution(
                kind,
                EngineError::ExecutionFailed(message),
            ));
        }
        tracing::info!(engine = %kind, duration_ms, "Engine finished");

        // Serialize return values
        report.written = write_return_values(
            spec,
            &args,
            &outcome.return_values,
            &self.serializers,
        )
        .await?;
        report.return_values = outcome.return_values;
        report.duration_ms = Some(duration_ms);

        Ok(report)
    }
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(create_default_registry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stage_engines::{Engine, EngineOutcome, OutputContract};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SPEC: &str = r#"
name: counting
executor:
  kind: counting
parameters:
  - name: fail
    type: Boolean
    optional: true
inputs:
  - name: data
    type: Examples
    split_aware: true
outputs:
  - name: out
    type: Examples
    split_aware: true
    splits_from: data
return_values:
  - name: seen
    type: Integer
"#;

    struct CountingEngine {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Engine for CountingEngine {
        fn kind(&self) -> &'static str {
            "counting"
        }

        fn prepare(&self, request: &PrepareRequest<'_>) -> Result<OutputContract, EngineError> {
            Ok(OutputContract::from_spec(request.spec, request.inputs))
        }

        async fn execute(&self, invocation: &Invocation) -> Result<EngineOutcome, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if invocation.parameters.get("fail").and_then(|v| v.as_bool()) == Some(true) {
                return Ok(EngineOutcome::error("asked to fail"));
            }
            let seen = invocation.outputs["out"].len() as i64;
            Ok(EngineOutcome::success().with_return_value("seen", serde_json::json!(seen)))
        }
    }

    fn runner() -> (StageRunner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = EngineRegistry::new();
        registry.register(CountingEngine {
            calls: calls.clone(),
        });
        (StageRunner::new(registry), calls)
    }

    fn argv(dir: &std::path::Path, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            "--data".to_string(),
            dir.join("data").to_string_lossy().to_string(),
            "--out".to_string(),
            dir.join("out/counts").to_string_lossy().to_string(),
            "--seen".to_string(),
            dir.join("values/seen").to_string_lossy().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    #[tokio::test]
    async fn test_run_mirrors_input_splits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/train")).unwrap();
        std::fs::create_dir_all(dir.path().join("data/eval")).unwrap();
        let spec = ComponentSpec::from_yaml_str(SPEC).unwrap();
        let (runner, calls) = runner();

        let report = runner
            .run(&spec, &argv(dir.path(), &[]), RunOptions::default())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let out = &report.invocation.outputs["out"];
        let base = dir.path().join("out/counts");
        assert_eq!(out[0].uri, format!("{}/eval", base.to_string_lossy()));
        assert_eq!(out[1].uri, format!("{}/train", base.to_string_lossy()));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("values/seen")).unwrap(),
            "2"
        );
        assert!(dir.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/train")).unwrap();
        let spec = ComponentSpec::from_yaml_str(SPEC).unwrap();
        let (runner, calls) = runner();

        let report = runner
            .run(&spec, &argv(dir.path(), &[]), RunOptions { dry_run: true })
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("out").exists());
        assert!(!dir.path().join("values").exists());
        assert!(report.invocation.unresolved_outputs().is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_outcome_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/train")).unwrap();
        let spec = ComponentSpec::from_yaml_str(SPEC).unwrap();
        let (runner, _) = runner();

        let err = runner
            .run(&spec, &argv(dir.path(), &["--fail", "true"]), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EngineExecutionFailure { .. }));
        assert!(err.to_string().contains("asked to fail"));
        assert!(!dir.path().join("values/seen").exists());
    }

    #[tokio::test]
    async fn test_unregistered_engine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let spec = ComponentSpec::from_yaml_str(SPEC).unwrap();

        let err = StageRunner::new(EngineRegistry::new())
            .run(&spec, &argv(dir.path(), &[]), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EngineNotFound(kind) if kind == "counting"));
        assert!(!dir.path().join("out").exists());
    }
}
