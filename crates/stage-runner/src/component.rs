//! Component spec lookup.

use stage_engines::ComponentSpec;
use std::path::{Path, PathBuf};

use crate::error::{StageError, StageResult};

const SPEC_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Resolve a component reference to a validated spec.
///
/// The reference is tried as a spec file path, then as a built-in component
/// name, then as `<name>.yaml` (or `.yml`, `.json`) under `spec_dir`.
pub fn load_component(reference: &str, spec_dir: Option<&Path>) -> StageResult<ComponentSpec> {
    let path = Path::new(reference);
    if path.is_file() {
        return from_file(path);
    }

    if let Some(spec) = ComponentSpec::builtin(reference) {
        tracing::debug!(component = %reference, "Using built-in component spec");
        return Ok(spec);
    }

    if let Some(dir) = spec_dir {
        if let Some(found) = find_in_dir(dir, reference) {
            return from_file(&found);
        }
    }

    Err(StageError::Specification(format!(
        "component '{}' is not a spec file, a built-in ({}) or found in {}",
        reference,
        ComponentSpec::builtin_names().join(", "),
        spec_dir
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "STAGE_SPEC_DIR (unset)".to_string()),
    )))
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    SPEC_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|candidate| candidate.is_file())
}

fn from_file(path: &Path) -> StageResult<ComponentSpec> {
    let spec =
        ComponentSpec::from_file(path).map_err(|e| StageError::Specification(e.to_string()))?;
    tracing::debug!(component = %spec.name, path = %path.display(), "Loaded component spec");
    Ok(spec)
}
