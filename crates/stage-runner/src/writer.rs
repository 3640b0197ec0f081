//! Return value serialization.
//!
//! Each declared return value is serialized by the serializer registered for
//! its type name and written to the file supplied for it.

use serde_json::Value;
use stage_engines::spec::ReturnValueSpec;
use stage_engines::ComponentSpec;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::args::ResolvedArgs;
use crate::error::{Stage, StageError, StageResult};

/// Turns one engine value into file contents.
pub type Serializer = fn(&Value) -> Result<String, String>;

fn serialize_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
        other => Err(format!("expected a scalar, got {}", other)),
    }
}

fn serialize_integer(value: &Value) -> Result<String, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    parsed
        .map(|n| n.to_string())
        .ok_or_else(|| format!("expected an integer, got {}", value))
}

fn serialize_float(value: &Value) -> Result<String, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .map(|f| f.to_string())
        .ok_or_else(|| format!("expected a number, got {}", value))
}

fn serialize_boolean(value: &Value) -> Result<String, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(|b| b.to_string())
        .ok_or_else(|| format!("expected a boolean, got {}", value))
}

fn serialize_json(value: &Value) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

/// Serializers keyed by return value type name.
#[derive(Debug, Clone)]
pub struct SerializerRegistry {
    serializers: HashMap<String, Serializer>,
}

impl SerializerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            serializers: HashMap::new(),
        }
    }

    /// Register a serializer for a type name.
    pub fn register(&mut self, type_name: impl Into<String>, serializer: Serializer) {
        self.serializers.insert(type_name.into(), serializer);
    }

    /// Check if a type name has a serializer.
    pub fn has(&self, type_name: &str) -> bool {
        self.serializers.contains_key(type_name)
    }

    /// Serialize a value as the named return value.
    pub fn serialize(&self, spec: &ReturnValueSpec, value: &Value) -> StageResult<String> {
        let fail = |reason: String| StageError::SerializationError {
            name: spec.name.clone(),
            type_name: spec.type_name.clone(),
            reason,
        };

        let serializer = self
            .serializers
            .get(&spec.type_name)
            .ok_or_else(|| fail("no serializer registered".to_string()))?;
        serializer(value).map_err(fail)
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("String", serialize_string);
        registry.register("Integer", serialize_integer);
        registry.register("Float", serialize_float);
        registry.register("Boolean", serialize_boolean);
        registry.register("JSON", serialize_json);
        registry
    }
}

async fn write_file(path: &Path, contents: &str) -> StageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StageError::io(Stage::Serialization, parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StageError::io(Stage::Serialization, path, e))
}

/// Write every requested return value. Returns the files written.
///
/// Every value is serialized before any file is written.
pub async fn write_return_values(
    spec: &ComponentSpec,
    args: &ResolvedArgs,
    values: &BTreeMap<String, Value>,
    serializers: &SerializerRegistry,
) -> StageResult<Vec<PathBuf>> {
    let mut pending = Vec::new();

    for ret in &spec.return_values {
        let Some(path) = args.path(&ret.name) else {
            continue;
        };
        let value = values
            .get(&ret.name)
            .ok_or_else(|| StageError::MissingReturnValue(ret.name.clone()))?;
        pending.push((ret, path, serializers.serialize(ret, value)?));
    }

    let mut written = Vec::with_capacity(pending.len());
    for (ret, path, contents) in pending {
        write_file(path, &contents).await?;
        tracing::info!(name = %ret.name, path = %path.display(), "Wrote return value");
        written.push(path.to_path_buf());
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::resolve;
    use serde_json::json;

    fn ret(type_name: &str) -> ReturnValueSpec {
        ReturnValueSpec {
            name: "v".to_string(),
            type_name: type_name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_builtin_serializers() {
        let registry = SerializerRegistry::default();
        assert_eq!(registry.serialize(&ret("Integer"), &json!(2)).unwrap(), "2");
        assert_eq!(registry.serialize(&ret("Integer"), &json!(2.0)).unwrap(), "2");
        assert_eq!(registry.serialize(&ret("Float"), &json!(0.25)).unwrap(), "0.25");
        assert_eq!(registry.serialize(&ret("Boolean"), &json!(1)).unwrap(), "true");
        assert_eq!(registry.serialize(&ret("String"), &json!("ok")).unwrap(), "ok");
        assert_eq!(
            registry.serialize(&ret("JSON"), &json!({"a": [1]})).unwrap(),
            r#"{"a":[1]}"#
        );
    }

    #[test]
    fn test_unknown_type_and_mismatch() {
        let registry = SerializerRegistry::default();
        assert!(!registry.has("Tensor"));

        let err = registry.serialize(&ret("Tensor"), &json!(1)).unwrap_err();
        assert!(matches!(err, StageError::SerializationError { ref type_name, .. } if type_name == "Tensor"));

        let err = registry.serialize(&ret("Integer"), &json!("many")).unwrap_err();
        assert!(err.to_string().contains("expected an integer"));
    }

    #[tokio::test]
    async fn test_write_return_values() {
        let dir = tempfile::tempdir().unwrap();
        let count = dir.path().join("values/nested/count");
        let spec = ComponentSpec::builtin("transform").unwrap();
        let argv: Vec<String> = vec![
            "--examples".to_string(),
            "/e".to_string(),
            "--schema".to_string(),
            "/s".to_string(),
            "--transform_graph".to_string(),
            "/g".to_string(),
            "--transformed_split_count".to_string(),
            count.to_string_lossy().to_string(),
        ];
        let args = resolve(&spec, &argv).unwrap();
        let registry = SerializerRegistry::default();

        let mut values = BTreeMap::new();
        let err = write_return_values(&spec, &args, &values, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingReturnValue(_)));
        assert!(!count.exists());

        values.insert("transformed_split_count".to_string(), json!(2));
        let written = write_return_values(&spec, &args, &values, &registry)
            .await
            .unwrap();
        assert_eq!(written, vec![count.clone()]);
        assert_eq!(std::fs::read_to_string(&count).unwrap(), "2");
    }
}
