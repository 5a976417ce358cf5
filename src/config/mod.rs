// src/config/mod.rs

//! Configuration loading and validation for the serve session.
//!
//! Responsibilities:
//! - Define the JSON/TOML-backed data model and the resolved `ServeConfig`
//!   (`model.rs`).
//! - Load the config files from disk (`loader.rs`).
//! - Validate and resolve them into a `ServeConfig` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_project_config};
pub use model::{
    CliOverrides, CommandsSection, RawProjectConfig, RawServeSettings, RawServeSources,
    RawWorkspace, ServeConfig, ServeSection, TemplateSection, WatchSection,
};
