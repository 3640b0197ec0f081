//! Declarative component specifications.
//!
//! A component spec names every parameter, input, output and return value a
//! stage accepts, plus the engine that executes it. The runner iterates over
//! these records; nothing here is mutated after loading.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::EngineError;
use crate::params::ParameterSet;

const TRANSFORM_SPEC: &str = include_str!("../specs/transform.yaml");

/// Declared names become `--<name>` flags.
const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.-]*$";

/// Flags the generated component command line already defines.
const RESERVED_NAMES: [&str; 1] = ["help"];

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParameterType {
    /// Plain string, passed through unchanged.
    #[default]
    String,
    /// Signed integer.
    #[serde(alias = "Int")]
    Integer,
    /// Floating point number.
    Float,
    /// `true`/`false`.
    #[serde(alias = "Bool")]
    Boolean,
    /// String-encoded structured payload.
    #[serde(rename = "JSON", alias = "Json")]
    Json,
}

impl ParameterType {
    /// Returns true if the raw argument must be decoded before binding.
    pub fn requires_decoding(&self) -> bool {
        !matches!(self, ParameterType::String)
    }

    /// Type name as written in specs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "String",
            ParameterType::Integer => "Integer",
            ParameterType::Float => "Float",
            ParameterType::Boolean => "Boolean",
            ParameterType::Json => "JSON",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named parameter slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub param_type: ParameterType,

    #[serde(default)]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named input or output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,

    /// Artifact type carried by the channel.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Whether the channel holds one artifact per split.
    #[serde(default)]
    pub split_aware: bool,

    #[serde(default)]
    pub optional: bool,

    /// Explicit output split set (outputs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splits: Option<Vec<String>>,

    /// Input whose split set an output mirrors (outputs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splits_from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A scalar value the engine returns directly, written to its own file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnValueSpec {
    pub name: String,

    /// Serializer type name (e.g., "String", "Integer", "JSON").
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Engine binding of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Engine kind (e.g., "transform", "command").
    pub kind: String,

    /// Engine-specific configuration.
    #[serde(flatten)]
    pub config: serde_json::Value,
}

impl ExecutorConfig {
    /// Create an executor binding with no extra configuration.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: serde_json::json!({}),
        }
    }
}

/// Combination rule over a group of parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintRule {
    /// Exactly one parameter of the group must be supplied.
    ExactlyOneOf,
    /// No more than one parameter of the group may be supplied.
    AtMostOneOf,
    /// Either every parameter of the group is supplied or none is.
    AllOrNone,
}

/// Parameter combination constraint declared by a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterConstraint {
    pub rule: ConstraintRule,
    pub parameters: Vec<String>,
}

impl ParameterConstraint {
    /// Check the rule against bound parameters.
    pub fn check(&self, params: &ParameterSet) -> Result<(), EngineError> {
        let supplied: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| params.contains(p))
            .map(|p| p.as_str())
            .collect();
        let group = self.parameters.join(", ");

        let violation = match self.rule {
            ConstraintRule::ExactlyOneOf if supplied.len() != 1 => Some(format!(
                "exactly one of [{}] must be supplied, got {}",
                group,
                describe(&supplied)
            )),
            ConstraintRule::AtMostOneOf if supplied.len() > 1 => Some(format!(
                "at most one of [{}] may be supplied, got {}",
                group,
                describe(&supplied)
            )),
            ConstraintRule::AllOrNone
                if !supplied.is_empty() && supplied.len() != self.parameters.len() =>
            {
                Some(format!(
                    "[{}] must be supplied together, got {}",
                    group,
                    describe(&supplied)
                ))
            }
            _ => None,
        };

        match violation {
            Some(msg) => Err(EngineError::InvalidParameterCombination(msg)),
            None => Ok(()),
        }
    }
}

fn describe(supplied: &[&str]) -> String {
    if supplied.is_empty() {
        "none".to_string()
    } else {
        format!("[{}]", supplied.join(", "))
    }
}

/// Declarative description of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub executor: ExecutorConfig,

    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    #[serde(default)]
    pub inputs: Vec<ChannelSpec>,

    #[serde(default)]
    pub outputs: Vec<ChannelSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_values: Vec<ReturnValueSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ParameterConstraint>,
}

impl ComponentSpec {
    /// Parse and validate a spec from YAML (JSON is accepted too).
    pub fn from_yaml_str(source: &str) -> Result<Self, EngineError> {
        let spec: ComponentSpec = serde_yaml::from_str(source)
            .map_err(|e| EngineError::Configuration(format!("Invalid component spec: {}", e)))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a spec file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("Cannot read spec {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&source)
    }

    /// Look up a built-in component spec by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "transform" => Self::from_yaml_str(TRANSFORM_SPEC).ok(),
            _ => None,
        }
    }

    /// Names of the built-in component specs.
    pub fn builtin_names() -> &'static [&'static str] {
        &["transform"]
    }

    /// Find a declared parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Find a declared input.
    pub fn input(&self, name: &str) -> Option<&ChannelSpec> {
        self.inputs.iter().find(|c| c.name == name)
    }

    /// Find a declared output.
    pub fn output(&self, name: &str) -> Option<&ChannelSpec> {
        self.outputs.iter().find(|c| c.name == name)
    }

    /// Check every declared combination rule.
    pub fn check_constraints(&self, params: &ParameterSet) -> Result<(), EngineError> {
        for constraint in &self.constraints {
            constraint.check(params)?;
        }
        Ok(())
    }

    /// Validate internal consistency.
    ///
    /// Every name becomes a command-line flag, so names must be unique across
    /// parameters, inputs, outputs and return values.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.executor.kind.is_empty() {
            return Err(EngineError::Configuration(format!(
                "Component '{}' has no executor kind",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        let names = self
            .parameters
            .iter()
            .map(|p| &p.name)
            .chain(self.inputs.iter().map(|c| &c.name))
            .chain(self.outputs.iter().map(|c| &c.name))
            .chain(self.return_values.iter().map(|r| &r.name));
        let name_pattern = regex::Regex::new(NAME_PATTERN)
            .map_err(|e| EngineError::Configuration(format!("Invalid name pattern: {}", e)))?;
        for name in names {
            if !name_pattern.is_match(name) {
                return Err(EngineError::Configuration(format!(
                    "Invalid name '{}' in component '{}'",
                    name, self.name
                )));
            }
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "Reserved name '{}' in component '{}'",
                    name, self.name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "Duplicate name '{}' in component '{}'",
                    name, self.name
                )));
            }
        }

        for output in &self.outputs {
            if let Some(splits) = &output.splits {
                let mut labels = HashSet::new();
                if let Some(dup) = splits.iter().find(|s| !labels.insert(s.as_str())) {
                    return Err(EngineError::Configuration(format!(
                        "Duplicate split '{}' in output '{}'",
                        dup, output.name
                    )));
                }
            }
            if let Some(source) = &output.splits_from {
                match self.input(source) {
                    Some(input) if input.split_aware => {}
                    _ => {
                        return Err(EngineError::Configuration(format!(
                            "Output '{}' mirrors splits of '{}', which is not a split-aware input",
                            output.name, source
                        )))
                    }
                }
            }
        }

        for constraint in &self.constraints {
            if let Some(unknown) = constraint
                .parameters
                .iter()
                .find(|p| self.parameter(p).is_none())
            {
                return Err(EngineError::Configuration(format!(
                    "Constraint references undeclared parameter '{}'",
                    unknown
                )));
            }
        }

        Ok(())
    }
}
