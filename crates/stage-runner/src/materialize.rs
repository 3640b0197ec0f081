//! Artifact materialization.
//!
//! Inputs are resolved from disk: one artifact per unsplit input, or one per
//! split subdirectory, sorted by name. Outputs start as placeholders shaped by
//! the engine's output contract; their URIs are assigned later.

use stage_engines::artifact::directory_uri;
use stage_engines::{Artifact, ArtifactMap, Channel, ChannelSpec, ComponentSpec, OutputContract};
use std::path::Path;

use crate::args::ResolvedArgs;
use crate::error::{Stage, StageError, StageResult};

/// Immediate subdirectory names of `base`, lexicographically sorted.
pub fn list_splits(base: &Path) -> StageResult<Vec<String>> {
    let io_err = |e| StageError::io(Stage::Materialization, base, e);

    let mut splits = Vec::new();
    for entry in std::fs::read_dir(base).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => splits.push(name),
            Err(name) => {
                tracing::warn!(base = %base.display(), name = ?name, "Skipping non UTF-8 split directory");
            }
        }
    }

    splits.sort();
    Ok(splits)
}

/// Materialize one input channel from its base path.
pub fn materialize_input(input: &ChannelSpec, base: &Path) -> StageResult<Channel> {
    if !base.exists() {
        return Err(StageError::BasePathNotFound {
            name: input.name.clone(),
            path: base.to_path_buf(),
        });
    }

    let uri_of = |path: &Path| {
        directory_uri(path).map_err(|e| StageError::io(Stage::Materialization, path, e))
    };

    if !input.split_aware {
        return Ok(vec![Artifact::new(&input.type_name).with_uri(uri_of(base)?)]);
    }

    let splits = list_splits(base)?;
    if splits.is_empty() {
        tracing::warn!(input = %input.name, base = %base.display(), "Split-aware input has no splits");
    }

    splits
        .into_iter()
        .map(|split| -> StageResult<Artifact> {
            let uri = uri_of(&base.join(&split))?;
            Ok(Artifact::new(&input.type_name)
                .with_split(Some(split))
                .with_uri(uri))
        })
        .collect()
}

/// Materialize every supplied input.
pub fn materialize_inputs(spec: &ComponentSpec, args: &ResolvedArgs) -> StageResult<ArtifactMap> {
    let mut inputs = ArtifactMap::new();

    for input in &spec.inputs {
        let Some(base) = args.path(&input.name) else {
            continue;
        };
        let channel = materialize_input(input, base)?;
        tracing::debug!(
            input = %input.name,
            artifacts = channel.len(),
            splits = ?channel.iter().map(|a| a.split_name()).collect::<Vec<_>>(),
            "Materialized input"
        );
        inputs.insert(input.name.clone(), channel);
    }

    Ok(inputs)
}

/// Build unresolved output placeholders for every supplied output.
///
/// Outputs not supplied on the command line are dropped even when the
/// engine declares them.
pub fn output_placeholders(
    spec: &ComponentSpec,
    contract: &OutputContract,
    args: &ResolvedArgs,
) -> ArtifactMap {
    let mut outputs = ArtifactMap::new();

    for output in &spec.outputs {
        if !args.contains(&output.name) {
            tracing::debug!(output = %output.name, "Output not requested");
            continue;
        }

        let splits = match contract.splits(&output.name) {
            Some(splits) if output.split_aware => splits.to_vec(),
            Some(splits) => {
                if splits != [None] {
                    tracing::warn!(
                        output = %output.name,
                        "Engine declared splits for an unsplit output, ignoring them"
                    );
                }
                vec![None]
            }
            None => {
                tracing::warn!(
                    output = %output.name,
                    "Engine declares nothing for output, writing a single unsplit artifact"
                );
                vec![None]
            }
        };

        let channel = splits
            .into_iter()
            .map(|split| Artifact::new(&output.type_name).with_split(split))
            .collect();
        outputs.insert(output.name.clone(), channel);
    }

    for (name, _) in contract.iter() {
        if spec.output(name).is_none() {
            tracing::warn!(output = %name, "Engine declared an output the component does not have");
        }
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::resolve;
    use std::fs;

    fn examples_spec(split_aware: bool) -> ChannelSpec {
        ChannelSpec {
            name: "examples".to_string(),
            type_name: "Examples".to_string(),
            split_aware,
            optional: false,
            splits: None,
            splits_from: None,
            description: None,
        }
    }

    #[test]
    fn test_splits_sorted_regardless_of_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("examples");
        fs::create_dir_all(base.join("train")).unwrap();
        fs::create_dir_all(base.join("eval")).unwrap();
        fs::write(base.join("README"), b"not a split").unwrap();

        let channel = materialize_input(&examples_spec(true), &base).unwrap();
        let splits: Vec<&str> = channel.iter().map(|a| a.split_name()).collect();
        assert_eq!(splits, vec!["eval", "train"]);

        let base_uri = base.to_string_lossy();
        assert_eq!(channel[0].uri, format!("{}/eval/", base_uri));
        assert_eq!(channel[1].uri, format!("{}/train/", base_uri));
        assert!(channel.iter().all(|a| a.type_name == "Examples"));
    }

    #[test]
    fn test_unsplit_input_has_trailing_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("x");
        fs::create_dir_all(&base).unwrap();

        let channel = materialize_input(&examples_spec(false), &base).unwrap();
        assert_eq!(channel.len(), 1);
        assert_eq!(channel[0].uri, format!("{}/", base.to_string_lossy()));
        assert_eq!(channel[0].split, None);
    }

    #[test]
    fn test_empty_split_input_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let channel = materialize_input(&examples_spec(true), dir.path()).unwrap();
        assert!(channel.is_empty());
    }

    #[test]
    fn test_missing_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = materialize_input(&examples_spec(true), &missing).unwrap_err();
        assert!(matches!(err, StageError::BasePathNotFound { ref name, .. } if name == "examples"));
    }

    #[test]
    fn test_output_placeholders_follow_contract() {
        let spec = ComponentSpec::builtin("transform").unwrap();
        let argv: Vec<String> = [
            "--examples",
            "/e",
            "--schema",
            "/s",
            "--transform_graph",
            "/g",
            "--transformed_examples",
            "/t",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let args = resolve(&spec, &argv).unwrap();

        let mut contract = OutputContract::new();
        contract.declare_unsplit("transform_graph");
        contract.declare(
            "transformed_examples",
            vec![Some("train".to_string()), Some("eval".to_string())],
        );
        contract.declare_unsplit("updated_analyzer_cache");

        let outputs = output_placeholders(&spec, &contract, &args);
        assert_eq!(outputs.len(), 2);
        assert!(!outputs.contains_key("updated_analyzer_cache"));
        assert_eq!(outputs["transform_graph"], vec![Artifact::new("TransformGraph")]);

        let transformed = &outputs["transformed_examples"];
        assert_eq!(transformed.len(), 2);
        assert_eq!(transformed[0].split.as_deref(), Some("train"));
        assert!(transformed.iter().all(|a| !a.is_resolved()));
    }
}
