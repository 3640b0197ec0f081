//! Template engine module.
//!
//! Renders engine command lines against an invocation using minijinja.

mod engine;

pub use engine::TemplateEngine;
