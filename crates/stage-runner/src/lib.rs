//! Stage Runner
//!
//! Runs one pipeline stage as an isolated process.
//!
//! This crate provides:
//! - Component argument resolution from a declarative spec
//! - Typed parameter binding
//! - Split-aware artifact materialization from disk
//! - Output path stamping and engine invocation
//! - Return value serialization

pub mod args;
pub mod binder;
pub mod component;
pub mod config;
pub mod error;
pub mod materialize;
pub mod paths;
pub mod runner;
pub mod writer;

pub use config::{LogFormat, RunnerConfig};
pub use error::{Stage, StageError, StageResult};
pub use runner::{RunOptions, RunReport, StageRunner};
