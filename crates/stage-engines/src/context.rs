//! Invocation context handed to engines.

use serde::Serialize;

use crate::artifact::ArtifactMap;
use crate::params::ParameterSet;
use crate::spec::ExecutorConfig;

/// Everything an engine receives for one execution.
///
/// Output artifacts carry their final, resolved URIs.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    /// Component name.
    pub component: String,

    /// Unique run ID for this process invocation.
    pub run_id: String,

    /// Engine binding from the component spec.
    #[serde(skip)]
    pub executor: ExecutorConfig,

    /// Input channels by name.
    pub inputs: ArtifactMap,

    /// Output channels by name.
    pub outputs: ArtifactMap,

    /// Bound parameters.
    #[serde(rename = "params")]
    pub parameters: ParameterSet,
}

impl Invocation {
    /// Create an invocation with empty channels and parameters.
    pub fn new(
        component: impl Into<String>,
        run_id: impl Into<String>,
        executor: ExecutorConfig,
    ) -> Self {
        Self {
            component: component.into(),
            run_id: run_id.into(),
            executor,
            inputs: ArtifactMap::new(),
            outputs: ArtifactMap::new(),
            parameters: ParameterSet::new(),
        }
    }

    /// Set the input channels.
    pub fn with_inputs(mut self, inputs: ArtifactMap) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the output channels.
    pub fn with_outputs(mut self, outputs: ArtifactMap) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the bound parameters.
    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    /// Names of outputs whose artifacts are missing a URI.
    pub fn unresolved_outputs(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|(_, channel)| channel.iter().any(|a| !a.is_resolved()))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Convert the invocation to a flat map for template rendering.
    pub fn to_template_context(&self) -> serde_json::Value {
        serde_json::json!({
            "component": self.component,
            "run_id": self.run_id,
            "inputs": self.inputs,
            "outputs": self.outputs,
            "params": self.parameters.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::params::ParameterValue;

    fn sample() -> Invocation {
        let mut inputs = ArtifactMap::new();
        inputs.insert(
            "schema".to_string(),
            vec![Artifact::new("Schema").with_uri("/in/schema/")],
        );
        let mut outputs = ArtifactMap::new();
        outputs.insert("graph".to_string(), vec![Artifact::new("TransformGraph")]);
        let mut params = ParameterSet::new();
        params.insert("module_file", ParameterValue::String("/m.py".to_string()));

        Invocation::new("transform", "run-1", ExecutorConfig::new("transform"))
            .with_inputs(inputs)
            .with_outputs(outputs)
            .with_parameters(params)
    }

    #[test]
    fn test_unresolved_outputs() {
        let mut invocation = sample();
        assert_eq!(invocation.unresolved_outputs(), vec!["graph"]);

        invocation.outputs.get_mut("graph").unwrap()[0].uri = "/out/graph".to_string();
        assert!(invocation.unresolved_outputs().is_empty());
    }

    #[test]
    fn test_template_context() {
        let ctx = sample().to_template_context();
        assert_eq!(ctx["component"], "transform");
        assert_eq!(ctx["inputs"]["schema"][0]["uri"], "/in/schema/");
        assert_eq!(ctx["params"]["module_file"], "/m.py");
    }

    #[test]
    fn test_serialization_skips_executor() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"params\""));
        assert!(!json.contains("executor"));
    }
}
