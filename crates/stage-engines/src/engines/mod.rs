//! Built-in engine implementations.
//!
//! - `transform` - Identity preprocessing over split-partitioned examples
//! - `command` - Run an external process against the invocation

mod command;
pub mod transform;

pub use self::command::{CommandConfig, CommandEngine};
pub use self::transform::{SplitsConfig, TransformEngine};

use crate::registry::EngineRegistry;

/// Create an engine registry with all built-in engines registered.
pub fn create_default_registry() -> EngineRegistry {
    let mut registry = EngineRegistry::new();

    registry.register(TransformEngine::new());
    registry.register(CommandEngine::new());

    registry
}
