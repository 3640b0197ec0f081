//! Output path stamping.

use stage_engines::artifact::absolute_location;
use stage_engines::{Artifact, ArtifactMap};

use crate::args::ResolvedArgs;
use crate::error::{Stage, StageError, StageResult};

/// Location of one output artifact under its base path.
///
/// Split-aware artifacts get `<base>/<split>`, unsplit ones the base itself.
/// No trailing separator in either case.
pub fn output_uri(base: &str, artifact: &Artifact) -> String {
    match artifact.split.as_deref() {
        Some(split) if !split.is_empty() => {
            if base.ends_with('/') {
                format!("{}{}", base, split)
            } else {
                format!("{}/{}", base, split)
            }
        }
        _ => base.to_string(),
    }
}

/// Assign a final URI to every output artifact from its supplied base path.
pub fn assign_output_uris(outputs: &mut ArtifactMap, args: &ResolvedArgs) -> StageResult<()> {
    for (name, channel) in outputs.iter_mut() {
        let path = args
            .path(name)
            .ok_or_else(|| StageError::UnresolvedOutput(name.clone()))?;
        let base = absolute_location(path)
            .map_err(|e| StageError::io(Stage::Materialization, path, e))?;

        for artifact in channel.iter_mut() {
            artifact.uri = output_uri(&base, artifact);
            tracing::debug!(output = %name, split = %artifact.split_name(), uri = %artifact.uri, "Assigned output location");
        }
    }

    ensure_resolved(outputs)
}

/// Fail on the first output artifact left without a location.
pub fn ensure_resolved(outputs: &ArtifactMap) -> StageResult<()> {
    match outputs
        .iter()
        .find(|(_, channel)| channel.iter().any(|a| !a.is_resolved()))
    {
        Some((name, _)) => Err(StageError::UnresolvedOutput(name.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::resolve;
    use stage_engines::ComponentSpec;

    fn args(graph: &str, transformed: &str) -> ResolvedArgs {
        let spec = ComponentSpec::builtin("transform").unwrap();
        let argv: Vec<String> = [
            "--examples",
            "/e",
            "--schema",
            "/s",
            "--transform_graph",
            graph,
            "--transformed_examples",
            transformed,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        resolve(&spec, &argv).unwrap()
    }

    fn placeholders() -> ArtifactMap {
        let mut outputs = ArtifactMap::new();
        outputs.insert(
            "transform_graph".to_string(),
            vec![Artifact::new("TransformGraph")],
        );
        outputs.insert(
            "transformed_examples".to_string(),
            vec![
                Artifact::new("Examples").with_split(Some("train".to_string())),
                Artifact::new("Examples").with_split(Some("eval".to_string())),
            ],
        );
        outputs
    }

    #[test]
    fn test_split_outputs_nest_under_base() {
        let mut outputs = placeholders();
        assign_output_uris(&mut outputs, &args("/out/graph", "/out/transformed")).unwrap();

        assert_eq!(outputs["transform_graph"][0].uri, "/out/graph");
        let uris: Vec<&str> = outputs["transformed_examples"]
            .iter()
            .map(|a| a.uri.as_str())
            .collect();
        assert_eq!(uris, vec!["/out/transformed/train", "/out/transformed/eval"]);
    }

    #[test]
    fn test_trailing_separator_is_dropped() {
        let mut outputs = placeholders();
        assign_output_uris(&mut outputs, &args("/out/graph/", "/out/transformed/")).unwrap();

        assert_eq!(outputs["transform_graph"][0].uri, "/out/graph");
        assert_eq!(
            outputs["transformed_examples"][1].uri,
            "/out/transformed/eval"
        );
    }

    #[test]
    fn test_output_uri_at_root() {
        let artifact = Artifact::new("Examples").with_split(Some("train".to_string()));
        assert_eq!(output_uri("/", &artifact), "/train");
        assert_eq!(output_uri("/", &Artifact::new("Examples")), "/");
    }

    #[test]
    fn test_unsupplied_output_is_unresolved() {
        let mut outputs = placeholders();
        outputs.insert(
            "updated_analyzer_cache".to_string(),
            vec![Artifact::new("TransformCache")],
        );
        let err = assign_output_uris(&mut outputs, &args("/g", "/t")).unwrap_err();
        assert!(matches!(err, StageError::UnresolvedOutput(name) if name == "updated_analyzer_cache"));
    }
}
