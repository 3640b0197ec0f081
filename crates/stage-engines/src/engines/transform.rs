//! Reference preprocessing engine.
//!
//! Applies an identity transform: every selected split of `examples` is
//! copied to `transformed_examples`, and the transform graph records the
//! preprocessing entry point, split selection and schema so downstream
//! stages can locate everything they need.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::artifact::{find_split, Artifact};
use crate::context::Invocation;
use crate::error::EngineError;
use crate::params::ParameterSet;
use crate::registry::{Engine, OutputContract, PrepareRequest};
use crate::result::EngineOutcome;

pub const EXAMPLES: &str = "examples";
pub const SCHEMA: &str = "schema";
pub const ANALYZER_CACHE: &str = "analyzer_cache";
pub const TRANSFORM_GRAPH: &str = "transform_graph";
pub const TRANSFORMED_EXAMPLES: &str = "transformed_examples";
pub const UPDATED_ANALYZER_CACHE: &str = "updated_analyzer_cache";

pub const MODULE_FILE: &str = "module_file";
pub const PREPROCESSING_FN: &str = "preprocessing_fn";
pub const SPLITS_CONFIG: &str = "splits_config";
pub const CUSTOM_CONFIG: &str = "custom_config";
pub const FORCE_TF_COMPAT_V1: &str = "force_tf_compat_v1";
pub const DISABLE_STATISTICS: &str = "disable_statistics";

/// Return value holding the number of transformed splits.
pub const TRANSFORMED_SPLIT_COUNT: &str = "transformed_split_count";

/// File written into the transform graph.
pub const TRANSFORM_SPEC_FILE: &str = "transform_spec.json";
/// Schema copy inside the transform graph.
pub const TRANSFORMED_METADATA_DIR: &str = "transformed_metadata";
/// Manifest written into the updated analyzer cache.
pub const CACHE_MANIFEST_FILE: &str = "manifest.json";

/// Which splits are analyzed and which are transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitsConfig {
    #[serde(default)]
    pub analyze: Vec<String>,

    #[serde(default)]
    pub transform: Vec<String>,
}

impl Default for SplitsConfig {
    fn default() -> Self {
        Self {
            analyze: vec!["train".to_string()],
            transform: vec!["train".to_string(), "eval".to_string()],
        }
    }
}

impl SplitsConfig {
    /// Resolve the split selection and check it against the available splits.
    pub fn resolve(params: &ParameterSet, examples: &[Artifact]) -> Result<Self, EngineError> {
        let config = match params.get_json(SPLITS_CONFIG) {
            Some(value) => {
                let config: SplitsConfig = serde_json::from_value(value.clone()).map_err(|e| {
                    EngineError::Configuration(format!("Invalid {}: {}", SPLITS_CONFIG, e))
                })?;
                if config.analyze.is_empty() {
                    return Err(EngineError::InvalidParameterCombination(format!(
                        "{}.analyze must name at least one split",
                        SPLITS_CONFIG
                    )));
                }
                config
            }
            None => Self::default(),
        };

        for (role, splits) in [("analyze", &config.analyze), ("transform", &config.transform)] {
            let mut seen = HashSet::new();
            for split in splits {
                if !seen.insert(split.as_str()) {
                    return Err(EngineError::InvalidParameterCombination(format!(
                        "{} split '{}' is listed more than once in {}",
                        role, split, SPLITS_CONFIG
                    )));
                }
                if find_split(examples, split).is_none() {
                    let available: Vec<&str> = examples.iter().map(|a| a.split_name()).collect();
                    return Err(EngineError::InvalidParameterCombination(format!(
                        "{} split '{}' is not present in {} (available: [{}])",
                        role,
                        split,
                        EXAMPLES,
                        available.join(", ")
                    )));
                }
            }
        }

        Ok(config)
    }
}

/// Exactly one preprocessing entry point must be supplied.
fn entry_point(params: &ParameterSet) -> Result<serde_json::Value, EngineError> {
    match (params.get_str(MODULE_FILE), params.get_str(PREPROCESSING_FN)) {
        (Some(module_file), None) => Ok(serde_json::json!({ MODULE_FILE: module_file })),
        (None, Some(function)) => Ok(serde_json::json!({ PREPROCESSING_FN: function })),
        (Some(_), Some(_)) => Err(EngineError::InvalidParameterCombination(format!(
            "{} and {} are mutually exclusive",
            MODULE_FILE, PREPROCESSING_FN
        ))),
        (None, None) => Err(EngineError::InvalidParameterCombination(format!(
            "one of {} or {} is required",
            MODULE_FILE, PREPROCESSING_FN
        ))),
    }
}

fn single<'a>(channel: Option<&'a Vec<Artifact>>, name: &str) -> Result<&'a Artifact, EngineError> {
    channel
        .and_then(|c| c.first())
        .ok_or_else(|| EngineError::Configuration(format!("Missing artifact '{}'", name)))
}

/// Recursively copy the contents of `src` into `dst`. Returns files copied.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Identity preprocessing engine.
#[derive(Debug, Default)]
pub struct TransformEngine;

impl TransformEngine {
    /// Create a new transform engine.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Engine for TransformEngine {
    fn kind(&self) -> &'static str {
        "transform"
    }

    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<OutputContract, EngineError> {
        request.spec.check_constraints(request.params)?;
        entry_point(request.params)?;

        let examples = request
            .inputs
            .get(EXAMPLES)
            .ok_or_else(|| EngineError::Configuration(format!("Missing input '{}'", EXAMPLES)))?;
        let splits = SplitsConfig::resolve(request.params, examples)?;

        let mut contract = OutputContract::new();
        contract.declare_unsplit(TRANSFORM_GRAPH);
        contract.declare(
            TRANSFORMED_EXAMPLES,
            splits.transform.iter().cloned().map(Some).collect(),
        );
        contract.declare_unsplit(UPDATED_ANALYZER_CACHE);
        Ok(contract)
    }

    async fn execute(&self, invocation: &Invocation) -> Result<EngineOutcome, EngineError> {
        let start = std::time::Instant::now();
        let params = &invocation.parameters;

        let examples = invocation
            .inputs
            .get(EXAMPLES)
            .map(|c| c.as_slice())
            .unwrap_or_default();
        let schema = single(invocation.inputs.get(SCHEMA), SCHEMA)?;
        let graph = single(invocation.outputs.get(TRANSFORM_GRAPH), TRANSFORM_GRAPH)?;
        let splits = SplitsConfig::resolve(params, examples)?;

        fs::create_dir_all(graph.path())?;
        copy_tree(schema.path(), &graph.path().join(TRANSFORMED_METADATA_DIR))?;

        let analyzer_cache = invocation
            .inputs
            .get(ANALYZER_CACHE)
            .and_then(|c| c.first())
            .map(|a| a.uri.clone());

        let transform_spec = serde_json::json!({
            "component": invocation.component,
            "run_id": invocation.run_id,
            "entry_point": entry_point(params)?,
            "analyze_splits": splits.analyze,
            "transform_splits": splits.transform,
            "schema_uri": schema.uri,
            "analyzer_cache_uri": analyzer_cache,
            "custom_config": params.get_json(CUSTOM_CONFIG),
            "force_tf_compat_v1": params.get(FORCE_TF_COMPAT_V1).and_then(|v| v.as_bool()).unwrap_or(false),
            "disable_statistics": params.get(DISABLE_STATISTICS).and_then(|v| v.as_bool()).unwrap_or(false),
            "created_at": chrono::Utc::now().to_rfc3339(),
        });
        fs::write(
            graph.path().join(TRANSFORM_SPEC_FILE),
            serde_json::to_vec_pretty(&transform_spec)?,
        )?;

        let mut transformed = 0u64;
        if let Some(outputs) = invocation.outputs.get(TRANSFORMED_EXAMPLES) {
            for output in outputs {
                let source = find_split(examples, output.split_name()).ok_or_else(|| {
                    EngineError::ExecutionFailed(format!(
                        "No input split '{}' for {}",
                        output.split_name(),
                        TRANSFORMED_EXAMPLES
                    ))
                })?;
                let files = copy_tree(source.path(), output.path())?;
                tracing::debug!(
                    split = %output.split_name(),
                    files,
                    uri = %output.uri,
                    "Transformed split"
                );
                transformed += 1;
            }
        }

        if let Some(cache) = invocation
            .outputs
            .get(UPDATED_ANALYZER_CACHE)
            .and_then(|c| c.first())
        {
            let sources: Vec<&str> = splits
                .analyze
                .iter()
                .filter_map(|s| find_split(examples, s))
                .map(|a| a.uri.as_str())
                .collect();
            fs::create_dir_all(cache.path())?;
            fs::write(
                cache.path().join(CACHE_MANIFEST_FILE),
                serde_json::to_vec_pretty(&serde_json::json!({
                    "analyzed_splits": splits.analyze,
                    "sources": sources,
                    "previous_cache_uri": analyzer_cache,
                }))?,
            )?;
        }

        tracing::info!(
            analyzed = ?splits.analyze,
            transformed,
            graph = %graph.uri,
            "Transform complete"
        );

        Ok(EngineOutcome::success()
            .with_return_value(TRANSFORMED_SPLIT_COUNT, serde_json::json!(transformed))
            .with_duration(start.elapsed().as_millis() as u64))
    }
}
