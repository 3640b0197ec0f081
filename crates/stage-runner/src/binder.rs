//! Parameter binding.
//!
//! Translates raw argument strings into typed parameter values. Combination
//! rules are left to engine construction.

use stage_engines::{ComponentSpec, ParameterSet, ParameterSpec, ParameterType, ParameterValue};

use crate::args::ResolvedArgs;
use crate::error::{StageError, StageResult};

fn decode_error(spec: &ParameterSpec, reason: impl ToString) -> StageError {
    StageError::ParameterDecodeError {
        name: spec.name.clone(),
        expected: spec.param_type,
        reason: reason.to_string(),
    }
}

/// Decode one raw argument according to its declared type.
pub fn decode(spec: &ParameterSpec, raw: &str) -> StageResult<ParameterValue> {
    let value = match spec.param_type {
        ParameterType::String => ParameterValue::String(raw.to_string()),
        ParameterType::Integer => ParameterValue::Integer(
            raw.trim().parse().map_err(|e| decode_error(spec, e))?,
        ),
        ParameterType::Float => {
            ParameterValue::Float(raw.trim().parse().map_err(|e| decode_error(spec, e))?)
        }
        ParameterType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => ParameterValue::Boolean(true),
            "false" | "0" => ParameterValue::Boolean(false),
            other => {
                return Err(decode_error(
                    spec,
                    format!("expected true/false, got '{}'", other),
                ))
            }
        },
        ParameterType::Json => {
            ParameterValue::Json(serde_json::from_str(raw).map_err(|e| decode_error(spec, e))?)
        }
    };
    Ok(value)
}

/// Bind every supplied parameter. Parameters without a value are omitted.
pub fn bind(spec: &ComponentSpec, args: &ResolvedArgs) -> StageResult<ParameterSet> {
    let mut params = ParameterSet::new();

    for param in &spec.parameters {
        let Some(raw) = args.get(&param.name) else {
            continue;
        };
        params.insert(param.name.clone(), decode(param, raw)?);
    }

    tracing::debug!(bound = params.len(), "Bound parameters");
    Ok(params)
}
