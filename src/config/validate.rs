// src/config/validate.rs

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::config::model::{RawServeSources, RawWorkspace, ServeConfig};
use crate::errors::{Result, ServeError};
use crate::exec::CommandSpec;
use crate::watch::IgnoreSet;

/// Restart delay used when neither `--delay` nor `[serve].restart_delay` is set.
pub const DEFAULT_RESTART_DELAY_SECS: f64 = 2.5;

/// Grace period used when `[serve].grace_period` is not set.
pub const DEFAULT_GRACE_PERIOD_SECS: f64 = 5.0;

pub const DEFAULT_COMPILE_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_RESTART_DEBOUNCE_MS: u64 = 100;

const DEFAULT_FRONTEND_COMMAND: &[&str] = &["npx", "ng", "build"];
const DEFAULT_COMPILER_COMMAND: &[&str] = &["npx", "tsc"];
const DEFAULT_SHELL_COMMAND: &[&str] = &["npx", "electron"];

impl TryFrom<RawServeSources> for ServeConfig {
    type Error = ServeError;

    fn try_from(raw: RawServeSources) -> std::result::Result<Self, Self::Error> {
        let template = &raw.project.template;
        let language = template.language;

        let frontend_output_dir =
            resolve_dir(&raw.root, &template.ng_build_dir, "template.ngBuildDir")?;
        let native_output_dir =
            resolve_dir(&raw.root, &template.e_build_dir, "template.eBuildDir")?;
        let native_source_dir =
            resolve_dir(&raw.root, &template.electron_root, "template.electronRoot")?;

        let project_root = normalize(&raw.root);
        validate_dir_layout(
            &project_root,
            &frontend_output_dir,
            &native_output_dir,
            &native_source_dir,
            language.is_compiled(),
        )?;

        let active_project =
            resolve_active_project(raw.overrides.project.as_deref(), raw.workspace.as_ref())?;

        let serve = &raw.settings.serve;

        let restart_delay = seconds(
            raw.overrides
                .delay
                .or(serve.restart_delay)
                .unwrap_or(DEFAULT_RESTART_DELAY_SECS),
            "restart delay",
        )?;

        let grace_period = seconds(
            serve.grace_period.unwrap_or(DEFAULT_GRACE_PERIOD_SECS),
            "[serve].grace_period",
        )?;
        if grace_period.is_zero() {
            return Err(ServeError::config("[serve].grace_period must be > 0"));
        }

        let compile_debounce = Duration::from_millis(
            serve.compile_debounce_ms.unwrap_or(DEFAULT_COMPILE_DEBOUNCE_MS),
        );
        let restart_debounce = Duration::from_millis(
            serve.restart_debounce_ms.unwrap_or(DEFAULT_RESTART_DEBOUNCE_MS),
        );

        let ready_pattern = match serve.ready_pattern.as_deref() {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ServeError::config(format!("invalid [serve].ready_pattern {pattern:?}: {e}"))
            })?),
            None => None,
        };

        let ignore = IgnoreSet::new(&raw.settings.watch.exclude)
            .map_err(|e| ServeError::config(format!("invalid [watch].exclude: {e:#}")))?;

        let commands = &raw.settings.commands;
        let frontend_command =
            command_or_default(commands.frontend.as_ref(), DEFAULT_FRONTEND_COMMAND, "frontend")?;
        let compiler_command =
            command_or_default(commands.compiler.as_ref(), DEFAULT_COMPILER_COMMAND, "compiler")?;
        let shell_command =
            command_or_default(commands.shell.as_ref(), DEFAULT_SHELL_COMMAND, "shell")?;

        Ok(ServeConfig {
            project_root,
            frontend_output_dir,
            native_output_dir,
            native_source_dir,
            active_project,
            source_language: language,
            restart_delay,
            inspector_port: raw.overrides.inspect,
            fresh: raw.overrides.fresh,
            production: raw.overrides.prod,
            grace_period,
            compile_debounce,
            restart_debounce,
            ready_pattern,
            ignore,
            frontend_command,
            compiler_command,
            shell_command,
        })
    }
}

fn resolve_dir(root: &Path, value: &str, key: &str) -> Result<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServeError::config(format!("{key} must not be empty")));
    }
    Ok(normalize(&root.join(value)))
}

/// Lexically resolve `.` and `..` components; the paths need not exist.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the filesystem root stays at the root.
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Output directories get cleared on `--fresh`, so none of them may hold the
/// project, the native sources or another output directory.
fn validate_dir_layout(
    root: &Path,
    frontend_output: &Path,
    native_output: &Path,
    native_source: &Path,
    compiled: bool,
) -> Result<()> {
    let mut outputs = vec![("template.ngBuildDir", frontend_output)];
    if compiled {
        outputs.push(("template.eBuildDir", native_output));
    }

    for &(key, dir) in &outputs {
        if root.starts_with(dir) {
            return Err(ServeError::config(format!(
                "{key} ({dir:?}) must not be the project root or one of its parents"
            )));
        }
        if native_source.starts_with(dir) {
            return Err(ServeError::config(format!(
                "{key} ({dir:?}) must not contain template.electronRoot ({native_source:?})"
            )));
        }
    }

    if !compiled {
        return Ok(());
    }

    if frontend_output.starts_with(native_output) || native_output.starts_with(frontend_output) {
        return Err(ServeError::config(format!(
            "template.ngBuildDir ({frontend_output:?}) and template.eBuildDir \
             ({native_output:?}) must not overlap"
        )));
    }

    // Compiler output landing inside its own watched sources would retrigger
    // the compiler forever.
    if native_output.starts_with(native_source) {
        return Err(ServeError::config(format!(
            "template.eBuildDir ({native_output:?}) must not be inside \
             template.electronRoot ({native_source:?})"
        )));
    }

    Ok(())
}

/// Pick the front-end project: `--project`, then `defaultProject`, then the
/// only project in the workspace.
fn resolve_active_project(
    cli_project: Option<&str>,
    workspace: Option<&RawWorkspace>,
) -> Result<String> {
    if let Some(name) = cli_project {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServeError::config("--project must not be empty"));
        }
        if let Some(ws) = workspace {
            if !ws.projects.is_empty() && !ws.projects.contains_key(name) {
                return Err(ServeError::config(format!(
                    "project '{name}' is not defined in angular.json"
                )));
            }
        }
        return Ok(name.to_string());
    }

    let Some(ws) = workspace else {
        return Err(ServeError::config(
            "no angular.json found and no --project given; cannot pick a front-end project",
        ));
    };

    if let Some(name) = ws.default_project.as_deref() {
        return Ok(name.to_string());
    }

    let mut names = ws.projects.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => Err(ServeError::config("angular.json defines no projects")),
        (Some(_), Some(_)) => Err(ServeError::config(
            "angular.json defines several projects and no defaultProject; pass --project",
        )),
    }
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ServeError::config(format!(
            "{what} must be a finite, non-negative number of seconds (got {value})"
        ))
    })
}

fn command_or_default(
    configured: Option<&Vec<String>>,
    default: &[&str],
    key: &str,
) -> Result<CommandSpec> {
    match configured {
        Some(argv) => CommandSpec::from_argv(argv.iter().cloned()).ok_or_else(|| {
            ServeError::config(format!("[commands].{key} must be a non-empty argv array"))
        }),
        None => CommandSpec::from_argv(default.iter().map(|s| s.to_string())).ok_or_else(|| {
            ServeError::config(format!("built-in {key} command is empty"))
        }),
    }
}
