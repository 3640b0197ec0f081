//! Argument resolution.
//!
//! One `--<name>` flag is generated per declared parameter, input, output and
//! return value. Each flag takes exactly one value.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{value_parser, Arg, ArgAction, Command};
use stage_engines::ComponentSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Stage, StageError, StageResult};

/// Raw argument values by declared name. Absent optional flags are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArgs {
    values: BTreeMap<String, String>,
    writable: Vec<String>,
}

impl ResolvedArgs {
    /// Get the raw value supplied for a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    /// Check if a value was supplied for a name.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Get the value supplied for a name as a path.
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).map(Path::new)
    }

    /// Iterate over supplied names and values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    /// Create every missing parent directory of the supplied output and
    /// return-value paths. Directories that already exist are not an error.
    ///
    /// Returns the parent directories ensured, in flag order.
    pub fn ensure_output_parents(&self) -> StageResult<Vec<PathBuf>> {
        let mut ensured: Vec<PathBuf> = Vec::new();

        for name in &self.writable {
            let Some(path) = self.path(name) else {
                continue;
            };
            let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
                continue;
            };
            if ensured.iter().any(|p| p == parent) {
                continue;
            }

            std::fs::create_dir_all(parent)
                .map_err(|e| StageError::io(Stage::ArgumentResolution, parent, e))?;
            tracing::debug!(output = %name, parent = %parent.display(), "Ensured output parent");
            ensured.push(parent.to_path_buf());
        }

        Ok(ensured)
    }
}

fn flag(name: &str, required: bool, value_name: &'static str, heading: &'static str) -> Arg {
    Arg::new(name.to_string())
        .long(name.to_string())
        .value_name(value_name)
        .value_parser(value_parser!(String))
        .action(ArgAction::Set)
        .num_args(1)
        .allow_hyphen_values(true)
        .required(required)
        .help_heading(heading)
}

fn with_help(arg: Arg, description: &Option<String>) -> Arg {
    match description {
        Some(help) => arg.help(help.clone()),
        None => arg,
    }
}

/// Build the command-line interface of a component.
pub fn component_command(spec: &ComponentSpec) -> Command {
    let mut cmd = Command::new(spec.name.clone()).disable_version_flag(true);
    if let Some(about) = &spec.description {
        cmd = cmd.about(about.clone());
    }

    for param in &spec.parameters {
        let arg = flag(&param.name, !param.optional, "VALUE", "Parameters");
        cmd = cmd.arg(with_help(arg, &param.description));
    }
    for input in &spec.inputs {
        let arg = flag(&input.name, !input.optional, "PATH", "Inputs");
        cmd = cmd.arg(with_help(arg, &input.description));
    }
    for output in &spec.outputs {
        let arg = flag(&output.name, !output.optional, "PATH", "Outputs");
        cmd = cmd.arg(with_help(arg, &output.description));
    }
    for ret in &spec.return_values {
        let arg = flag(&ret.name, false, "FILE", "Return values");
        cmd = cmd.arg(with_help(arg, &ret.description));
    }

    cmd
}

fn classify(err: clap::Error) -> StageError {
    if err.kind() != ErrorKind::MissingRequiredArgument {
        return StageError::Usage(err);
    }

    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::Strings(missing)) => StageError::MissingArgument(missing.join(", ")),
        Some(ContextValue::String(missing)) => StageError::MissingArgument(missing.clone()),
        _ => StageError::MissingArgument(err.to_string().trim().to_string()),
    }
}

/// Parse component arguments (without a program name) against a spec.
///
/// Pure: nothing is created on disk.
pub fn resolve(spec: &ComponentSpec, argv: &[String]) -> StageResult<ResolvedArgs> {
    let matches = component_command(spec)
        .try_get_matches_from(std::iter::once(spec.name.clone()).chain(argv.iter().cloned()))
        .map_err(classify)?;

    let declared = spec
        .parameters
        .iter()
        .map(|p| &p.name)
        .chain(spec.inputs.iter().map(|c| &c.name))
        .chain(spec.outputs.iter().map(|c| &c.name))
        .chain(spec.return_values.iter().map(|r| &r.name));

    let mut values = BTreeMap::new();
    for name in declared {
        if let Some(value) = matches.get_one::<String>(name) {
            values.insert(name.clone(), value.clone());
        }
    }

    let writable = spec
        .outputs
        .iter()
        .map(|c| c.name.clone())
        .chain(spec.return_values.iter().map(|r| r.name.clone()))
        .collect();

    tracing::debug!(supplied = values.len(), "Resolved arguments");
    Ok(ResolvedArgs { values, writable })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ComponentSpec {
        ComponentSpec::builtin("transform").unwrap()
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn required() -> Vec<String> {
        argv(&[
            "--examples",
            "/data/examples",
            "--schema",
            "/data/schema",
            "--transform_graph",
            "/out/graph",
        ])
    }

    #[test]
    fn test_resolve_required_only() {
        let resolved = resolve(&spec(), &required()).unwrap();
        assert_eq!(resolved.get("examples"), Some("/data/examples"));
        assert_eq!(resolved.get("transform_graph"), Some("/out/graph"));
        assert_eq!(resolved.get("module_file"), None);
        assert!(!resolved.contains("custom_config"));
        assert_eq!(resolved.iter().count(), 3);
    }

    #[test]
    fn test_missing_required_argument() {
        let err = resolve(&spec(), &argv(&["--examples", "/data/examples"])).unwrap_err();
        match err {
            StageError::MissingArgument(missing) => {
                assert!(missing.contains("--schema"));
                assert!(missing.contains("--transform_graph"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_and_hyphen_values() {
        let mut args = required();
        args.extend(argv(&["--force_tf_compat_v1", "-1", "--module_file", "m.py"]));
        let resolved = resolve(&spec(), &args).unwrap();
        assert_eq!(resolved.get("force_tf_compat_v1"), Some("-1"));
        assert_eq!(resolved.get("module_file"), Some("m.py"));
    }

    #[test]
    fn test_unknown_and_repeated_flags_are_usage_errors() {
        let mut args = required();
        args.extend(argv(&["--bogus", "x"]));
        assert!(matches!(resolve(&spec(), &args), Err(StageError::Usage(_))));

        let mut args = required();
        args.extend(argv(&["--schema", "/other"]));
        assert!(matches!(resolve(&spec(), &args), Err(StageError::Usage(_))));
    }

    #[test]
    fn test_resolve_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let graph = dir.path().join("nested/out/graph");
        let mut args = required();
        args[5] = graph.to_string_lossy().to_string();

        resolve(&spec(), &args).unwrap();
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn test_ensure_output_parents_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let graph = dir.path().join("nested/out/graph");
        let count = dir.path().join("values/count");
        let mut args = required();
        args[5] = graph.to_string_lossy().to_string();
        args.extend(argv(&["--transformed_split_count", &count.to_string_lossy()]));

        let resolved = resolve(&spec(), &args).unwrap();
        let ensured = resolved.ensure_output_parents().unwrap();
        assert_eq!(ensured, vec![dir.path().join("nested/out"), dir.path().join("values")]);
        assert!(dir.path().join("nested/out").is_dir());
        assert!(!graph.exists());

        // Second call finds everything in place.
        assert_eq!(resolved.ensure_output_parents().unwrap().len(), 2);
    }
}
