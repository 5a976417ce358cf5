// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{
    CliOverrides, RawProjectConfig, RawServeSettings, RawServeSources, RawWorkspace, ServeConfig,
};
use crate::errors::{Result, ServeError};

/// Workspace file consulted for the active project.
pub const WORKSPACE_FILE: &str = "angular.json";

/// Optional serve settings file.
pub const SETTINGS_FILE: &str = "ngshell.toml";

/// Load the project config (`ngshell.json`) from a given path.
///
/// This only performs JSON deserialization; it does **not** perform semantic
/// validation. A missing file is an error: without it there is no project to
/// serve.
pub fn load_project_config(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        ServeError::config(format!("reading project config at {:?}: {e}", path))
    })?;
    parse_json(path, &contents)
}

/// Load `angular.json` from `dir`, if present.
pub fn load_workspace(dir: impl AsRef<Path>) -> Result<Option<RawWorkspace>> {
    let path = dir.as_ref().join(WORKSPACE_FILE);
    if !path.is_file() {
        debug!(?path, "no workspace file; active project must come from --project");
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    parse_json(&path, &contents).map(Some)
}

/// Load `ngshell.toml` from `dir`, falling back to defaults when absent.
pub fn load_serve_settings(dir: impl AsRef<Path>) -> Result<RawServeSettings> {
    let path = dir.as_ref().join(SETTINGS_FILE);
    if !path.is_file() {
        return Ok(RawServeSettings::default());
    }
    let contents = fs::read_to_string(&path)?;
    let settings: RawServeSettings = toml::from_str(&contents)?;
    Ok(settings)
}

/// Read every configuration source and resolve the `ServeConfig`.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads `ngshell.json`, `angular.json` and `ngshell.toml`.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Applies CLI overrides and validates the result.
pub fn load_and_validate(args: &CliArgs) -> Result<ServeConfig> {
    let root = config_root_dir(&args.config);
    let project = load_project_config(&args.config)?;
    let workspace = load_workspace(&root)?;
    let settings = load_serve_settings(&root)?;

    let sources = RawServeSources {
        root,
        project,
        workspace,
        settings,
        overrides: CliOverrides::from(args),
    };

    ServeConfig::try_from(sources)
}

/// Figure out the project root from the config path.
///
/// - If the config path has a non-empty parent (e.g. "app/ngshell.json"),
///   we use that directory.
/// - If it's just a bare filename like "ngshell.json" (parent = ""),
///   we fall back to the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let root = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    root.canonicalize().unwrap_or(root)
}

fn parse_json<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T> {
    serde_json::from_str(contents)
        .map_err(|e| ServeError::config(format!("parsing JSON from {:?}: {e}", path)))
}
