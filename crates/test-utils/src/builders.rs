#![allow(dead_code)]

use std::path::PathBuf;

use ngshell::config::{RawServeSources, RawWorkspace, ServeConfig};
use ngshell::errors::ServeError;
use ngshell::types::SourceLanguage;

/// Builder for `ServeConfig` to simplify test setup.
///
/// Starts from built-in defaults rooted at `root`, with `--project app` so no
/// `angular.json` is needed.
pub struct ServeConfigBuilder {
    sources: RawServeSources,
}

impl ServeConfigBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut sources = RawServeSources::with_defaults(root);
        sources.overrides.project = Some("app".to_string());
        Self { sources }
    }

    pub fn language(mut self, language: SourceLanguage) -> Self {
        self.sources.project.template.language = language;
        self
    }

    pub fn ng_build_dir(mut self, dir: &str) -> Self {
        self.sources.project.template.ng_build_dir = dir.to_string();
        self
    }

    pub fn e_build_dir(mut self, dir: &str) -> Self {
        self.sources.project.template.e_build_dir = dir.to_string();
        self
    }

    pub fn electron_root(mut self, dir: &str) -> Self {
        self.sources.project.template.electron_root = dir.to_string();
        self
    }

    /// `--project` on the command line; `None` defers to the workspace.
    pub fn project(mut self, name: Option<&str>) -> Self {
        self.sources.overrides.project = name.map(str::to_string);
        self
    }

    pub fn workspace(mut self, default_project: Option<&str>, projects: &[&str]) -> Self {
        let mut workspace = RawWorkspace {
            default_project: default_project.map(str::to_string),
            ..RawWorkspace::default()
        };
        for name in projects {
            workspace
                .projects
                .insert(name.to_string(), serde_json::json!({}));
        }
        self.sources.workspace = Some(workspace);
        self
    }

    /// `[serve].restart_delay`.
    pub fn restart_delay(mut self, secs: f64) -> Self {
        self.sources.settings.serve.restart_delay = Some(secs);
        self
    }

    /// `--delay`.
    pub fn delay_flag(mut self, secs: f64) -> Self {
        self.sources.overrides.delay = Some(secs);
        self
    }

    pub fn grace_period(mut self, secs: f64) -> Self {
        self.sources.settings.serve.grace_period = Some(secs);
        self
    }

    pub fn compile_debounce_ms(mut self, ms: u64) -> Self {
        self.sources.settings.serve.compile_debounce_ms = Some(ms);
        self
    }

    pub fn restart_debounce_ms(mut self, ms: u64) -> Self {
        self.sources.settings.serve.restart_debounce_ms = Some(ms);
        self
    }

    pub fn ready_pattern(mut self, pattern: &str) -> Self {
        self.sources.settings.serve.ready_pattern = Some(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.sources.settings.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn frontend_command(mut self, argv: &[&str]) -> Self {
        self.sources.settings.commands.frontend = Some(to_argv(argv));
        self
    }

    pub fn compiler_command(mut self, argv: &[&str]) -> Self {
        self.sources.settings.commands.compiler = Some(to_argv(argv));
        self
    }

    pub fn shell_command(mut self, argv: &[&str]) -> Self {
        self.sources.settings.commands.shell = Some(to_argv(argv));
        self
    }

    pub fn inspect(mut self, port: u16) -> Self {
        self.sources.overrides.inspect = Some(port);
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.sources.overrides.fresh = fresh;
        self
    }

    pub fn prod(mut self, prod: bool) -> Self {
        self.sources.overrides.prod = prod;
        self
    }

    pub fn into_sources(self) -> RawServeSources {
        self.sources
    }

    pub fn try_build(self) -> Result<ServeConfig, ServeError> {
        ServeConfig::try_from(self.sources)
    }

    pub fn build(self) -> ServeConfig {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

fn to_argv(argv: &[&str]) -> Vec<String> {
    argv.iter().map(|s| s.to_string()).collect()
}
