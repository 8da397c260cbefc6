//! Scaffold a new project from a template directory or a GitHub release.
//!
//! Files ending in `.tmpl` are rendered with Tera against a [`context::TemplateContext`]
//! and written without the suffix. Everything else is copied as-is, and files that
//! already exist at the destination are never overwritten.
mod api;
pub mod archive;
pub mod config;
pub mod context;
pub mod errors;
pub mod render;
pub mod source;
pub mod template;
mod utils;

pub use api::{initialize_project, InitOptions, SplatError};
