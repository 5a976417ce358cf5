use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::exec::CommandSpec;
use crate::types::SourceLanguage;
use crate::watch::IgnoreSet;

/// Project configuration as read from `ngshell.json`.
///
/// ```json
/// {
///   "template": {
///     "ngBuildDir": "dist",
///     "eBuildDir": "electron-dist",
///     "electronRoot": "electron",
///     "language": "ts"
///   }
/// }
/// ```
///
/// Unknown top-level keys are tolerated; the scaffolding side of the tool
/// keeps more state in this file than the serve session needs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub template: TemplateSection,
}

/// `template` object of the project config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    /// Output directory of the front-end build.
    #[serde(default = "default_ng_build_dir")]
    pub ng_build_dir: String,

    /// Output directory of the native source compile (`ts` mode only).
    #[serde(default = "default_e_build_dir")]
    pub e_build_dir: String,

    /// Directory holding the native shell sources.
    #[serde(default = "default_electron_root")]
    pub electron_root: String,

    #[serde(default)]
    pub language: SourceLanguage,
}

fn default_ng_build_dir() -> String {
    "dist".to_string()
}

fn default_e_build_dir() -> String {
    "electron-dist".to_string()
}

fn default_electron_root() -> String {
    "electron".to_string()
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            ng_build_dir: default_ng_build_dir(),
            e_build_dir: default_e_build_dir(),
            electron_root: default_electron_root(),
            language: SourceLanguage::default(),
        }
    }
}

/// The parts of `angular.json` needed to pick the active project.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkspace {
    #[serde(default)]
    pub default_project: Option<String>,

    /// Project definitions; only the names matter here.
    #[serde(default)]
    pub projects: BTreeMap<String, serde_json::Value>,
}

/// Optional serve settings from `ngshell.toml`.
///
/// ```toml
/// [serve]
/// restart_delay = 2.5
/// grace_period = 5.0
/// compile_debounce_ms = 100
/// restart_debounce_ms = 100
/// ready_pattern = "^app ready"
///
/// [watch]
/// exclude = ["**/*.map"]
///
/// [commands]
/// frontend = ["npx", "ng", "build"]
/// compiler = ["npx", "tsc"]
/// shell = ["npx", "electron"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawServeSettings {
    #[serde(default)]
    pub serve: ServeSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub commands: CommandsSection,
}

/// `[serve]` section. Every field falls back to a built-in default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServeSection {
    /// Seconds between the last restart request and the actual restart.
    #[serde(default)]
    pub restart_delay: Option<f64>,

    /// Seconds a terminated process gets before it is killed.
    #[serde(default)]
    pub grace_period: Option<f64>,

    #[serde(default)]
    pub compile_debounce_ms: Option<u64>,

    #[serde(default)]
    pub restart_debounce_ms: Option<u64>,

    /// Regex matched against shell stdout; the first match marks it ready.
    #[serde(default)]
    pub ready_pattern: Option<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Extra glob patterns (relative to a watch root) to ignore.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[commands]` section: argv prefixes for the external toolchains.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandsSection {
    #[serde(default)]
    pub frontend: Option<Vec<String>>,

    #[serde(default)]
    pub compiler: Option<Vec<String>>,

    #[serde(default)]
    pub shell: Option<Vec<String>>,
}

/// Values taken from the command line. They win over every file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub project: Option<String>,
    pub fresh: bool,
    pub inspect: Option<u16>,
    pub delay: Option<f64>,
    pub prod: bool,
}

impl From<&crate::cli::CliArgs> for CliOverrides {
    fn from(args: &crate::cli::CliArgs) -> Self {
        Self {
            project: args.project.clone(),
            fresh: args.fresh,
            inspect: args.inspect,
            delay: args.delay,
            prod: args.prod,
        }
    }
}

/// Everything read from disk and the CLI, before validation.
#[derive(Debug, Clone)]
pub struct RawServeSources {
    /// Directory all configured paths are relative to.
    pub root: PathBuf,
    pub project: RawProjectConfig,
    pub workspace: Option<RawWorkspace>,
    pub settings: RawServeSettings,
    pub overrides: CliOverrides,
}

impl RawServeSources {
    /// Sources with nothing but built-in defaults, rooted at `root`.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            project: RawProjectConfig::default(),
            workspace: None,
            settings: RawServeSettings::default(),
            overrides: CliOverrides::default(),
        }
    }
}

/// Immutable serve configuration, resolved once at start-up.
///
/// Only obtainable through `ServeConfig::try_from(RawServeSources)`, so every
/// instance has passed validation.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub(crate) project_root: PathBuf,
    pub(crate) frontend_output_dir: PathBuf,
    pub(crate) native_output_dir: PathBuf,
    pub(crate) native_source_dir: PathBuf,
    pub(crate) active_project: String,
    pub(crate) source_language: SourceLanguage,
    pub(crate) restart_delay: Duration,
    pub(crate) inspector_port: Option<u16>,
    pub(crate) fresh: bool,
    pub(crate) production: bool,
    pub(crate) grace_period: Duration,
    pub(crate) compile_debounce: Duration,
    pub(crate) restart_debounce: Duration,
    pub(crate) ready_pattern: Option<Regex>,
    pub(crate) ignore: IgnoreSet,
    pub(crate) frontend_command: CommandSpec,
    pub(crate) compiler_command: CommandSpec,
    pub(crate) shell_command: CommandSpec,
}

impl ServeConfig {
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn frontend_output_dir(&self) -> &Path {
        &self.frontend_output_dir
    }

    pub fn native_output_dir(&self) -> &Path {
        &self.native_output_dir
    }

    pub fn native_source_dir(&self) -> &Path {
        &self.native_source_dir
    }

    pub fn active_project(&self) -> &str {
        &self.active_project
    }

    pub fn source_language(&self) -> SourceLanguage {
        self.source_language
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    pub fn inspector_port(&self) -> Option<u16> {
        self.inspector_port
    }

    pub fn fresh(&self) -> bool {
        self.fresh
    }

    pub fn production(&self) -> bool {
        self.production
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn compile_debounce(&self) -> Duration {
        self.compile_debounce
    }

    pub fn restart_debounce(&self) -> Duration {
        self.restart_debounce
    }

    pub fn ready_pattern(&self) -> Option<&Regex> {
        self.ready_pattern.as_ref()
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    pub fn frontend_command(&self) -> &CommandSpec {
        &self.frontend_command
    }

    pub fn compiler_command(&self) -> &CommandSpec {
        &self.compiler_command
    }

    pub fn shell_command(&self) -> &CommandSpec {
        &self.shell_command
    }

    /// Front-end build configuration name passed to the toolchain.
    pub fn build_configuration(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }

    /// Directory the shell process is pointed at: compiled output in `ts`
    /// mode, the sources themselves in `js` mode.
    pub fn shell_entry_dir(&self) -> &Path {
        if self.source_language.is_compiled() {
            &self.native_output_dir
        } else {
            &self.native_source_dir
        }
    }

    /// Directories the serve session produces and may clear on `--fresh`.
    pub fn output_dirs(&self) -> Vec<&Path> {
        let mut dirs = vec![self.frontend_output_dir.as_path()];
        if self.source_language.is_compiled() {
            dirs.push(self.native_output_dir.as_path());
        }
        dirs
    }

    /// Roots whose settled changes restart the shell process.
    pub fn restart_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.native_source_dir.clone()];
        if self.source_language.is_compiled() {
            roots.push(self.native_output_dir.clone());
        }
        roots.push(self.frontend_output_dir.clone());
        roots
    }
}
