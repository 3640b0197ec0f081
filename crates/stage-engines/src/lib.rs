//! Stage Engine Library
//!
//! Shared building blocks for running one pipeline stage in isolation.
//!
//! This crate provides:
//! - Typed artifacts and channels, including split-aware artifacts
//! - Declarative component specifications (parameters, inputs, outputs)
//! - Engine execution framework with registry pattern
//! - Built-in engines: transform, command
//! - Template engine for command rendering

pub mod artifact;
pub mod context;
pub mod engines;
pub mod error;
pub mod params;
pub mod registry;
pub mod result;
pub mod spec;
pub mod template;

pub use artifact::{Artifact, ArtifactMap, Channel};
pub use context::Invocation;
pub use error::EngineError;
pub use params::{ParameterSet, ParameterValue};
pub use registry::{Engine, EngineRegistry, OutputContract, PrepareRequest};
pub use result::{EngineOutcome, EngineStatus};
pub use spec::{ChannelSpec, ComponentSpec, ExecutorConfig, ParameterSpec, ParameterType};
