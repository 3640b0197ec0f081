//! Engine registry and dispatch.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::artifact::{channel_splits, ArtifactMap};
use crate::context::Invocation;
use crate::error::EngineError;
use crate::params::ParameterSet;
use crate::result::EngineOutcome;
use crate::spec::ComponentSpec;

/// What an engine sees when it is constructed for a run.
#[derive(Debug, Clone, Copy)]
pub struct PrepareRequest<'a> {
    /// Component spec the engine is bound to.
    pub spec: &'a ComponentSpec,

    /// Materialized input channels.
    pub inputs: &'a ArtifactMap,

    /// Bound parameters.
    pub params: &'a ParameterSet,
}

/// Output artifacts an engine intends to write: split labels per output name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputContract {
    outputs: BTreeMap<String, Vec<Option<String>>>,
}

impl OutputContract {
    /// Create an empty contract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an output with the given split labels.
    pub fn declare(&mut self, name: impl Into<String>, splits: Vec<Option<String>>) {
        self.outputs.insert(name.into(), splits);
    }

    /// Declare an output holding one unsplit artifact.
    pub fn declare_unsplit(&mut self, name: impl Into<String>) {
        self.declare(name, vec![None]);
    }

    /// Split labels declared for an output.
    pub fn splits(&self, name: &str) -> Option<&[Option<String>]> {
        self.outputs.get(name).map(|s| s.as_slice())
    }

    /// Iterate over declared outputs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Option<String>>)> {
        self.outputs.iter()
    }

    /// Returns true if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Derive a contract from the spec alone.
    ///
    /// Split-aware outputs take their explicit `splits` list, else mirror the
    /// split set of their `splits_from` input, else fall back to a single
    /// unsplit artifact.
    pub fn from_spec(spec: &ComponentSpec, inputs: &ArtifactMap) -> Self {
        let mut contract = Self::new();

        for output in &spec.outputs {
            if !output.split_aware {
                contract.declare_unsplit(&output.name);
                continue;
            }

            if let Some(splits) = &output.splits {
                contract.declare(&output.name, splits.iter().cloned().map(Some).collect());
            } else if let Some(source) = &output.splits_from {
                let splits = inputs
                    .get(source)
                    .map(|channel| channel_splits(channel))
                    .unwrap_or_default();
                contract.declare(&output.name, splits);
            } else {
                tracing::warn!(
                    output = %output.name,
                    "Split-aware output declares no splits, writing a single unsplit artifact"
                );
                contract.declare_unsplit(&output.name);
            }
        }

        contract
    }
}

/// Engine trait for implementing stage executors.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the engine's unique kind.
    fn kind(&self) -> &'static str;

    /// Construct the engine for one run: validate parameters and declare the
    /// outputs it will write.
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<OutputContract, EngineError>;

    /// Execute with resolved inputs, outputs and parameters.
    async fn execute(&self, invocation: &Invocation) -> Result<EngineOutcome, EngineError>;
}

/// Registry of available engines.
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Create a new empty engine registry.
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Register an engine.
    pub fn register<E: Engine + 'static>(&mut self, engine: E) {
        let kind = engine.kind().to_string();
        self.engines.insert(kind, Arc::new(engine));
    }

    /// Get an engine by kind.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(kind).cloned()
    }

    /// Check if an engine is registered.
    pub fn has(&self, kind: &str) -> bool {
        self.engines.contains_key(kind)
    }

    /// List all registered engine kinds, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.engines.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Resolve the engine bound to a component spec.
    pub fn resolve(&self, spec: &ComponentSpec) -> Result<Arc<dyn Engine>, EngineError> {
        self.get(&spec.executor.kind)
            .ok_or_else(|| EngineError::NotFound(spec.executor.kind.clone()))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.list())
            .finish()
    }
}
