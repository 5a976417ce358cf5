// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod orchestrator;
pub mod supervisor;
pub mod types;
pub mod watch;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ServeConfig, load_and_validate};
use crate::errors::Result;
use crate::exec::{FrontendBuildWatcher, NativeSourceCompiler};
use crate::orchestrator::Session;
use crate::supervisor::LaunchSpec;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the serve session (compiler, front-end watcher, file watchers,
///   process supervisor)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_and_validate(&args)?;

    if args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let report = Session::new(config).run_until(ctrl_c()).await?;
    info!(
        transitions = report.transitions.len(),
        final_state = report.process.state.label(),
        "serve session finished"
    );
    Ok(())
}

/// Resolves on Ctrl-C. If the signal handler can't be installed the session
/// runs until the front-end watcher exits.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Simple dry-run output: resolved settings and the commands that would run.
fn print_dry_run(config: &ServeConfig) {
    println!("ngshell dry-run");
    println!("  project_root = {}", config.project_root().display());
    println!("  active_project = {}", config.active_project());
    println!("  language = {}", config.source_language());
    println!("  configuration = {}", config.build_configuration());
    println!("  restart_delay = {:?}", config.restart_delay());
    println!("  grace_period = {:?}", config.grace_period());
    println!("  compile_debounce = {:?}", config.compile_debounce());
    println!("  restart_debounce = {:?}", config.restart_debounce());
    if let Some(port) = config.inspector_port() {
        println!("  inspector_port = {port}");
    }
    if let Some(pattern) = config.ready_pattern() {
        println!("  ready_pattern = {}", pattern.as_str());
    }
    if !config.ignore().extra_patterns().is_empty() {
        println!("  exclude = {:?}", config.ignore().extra_patterns());
    }
    println!();

    println!("output directories:");
    for dir in config.output_dirs() {
        let action = if config.fresh() { "clear + create" } else { "create if missing" };
        println!("  - {} ({action})", dir.display());
    }
    println!();

    println!("commands:");
    if config.source_language().is_compiled() {
        let compiler = NativeSourceCompiler::from_config(config);
        println!("  compiler: {}", compiler.command());
        println!("      cwd: {}", compiler.cwd().display());
    }

    let frontend = FrontendBuildWatcher::from_config(config)
        .command_for(config.active_project(), config.frontend_output_dir());
    println!("  frontend: {frontend}");
    println!("      cwd: {}", config.project_root().display());

    let shell = LaunchSpec::from_config(config);
    println!("  shell: {}", shell.command);
    println!("      cwd: {}", shell.cwd.display());
    for (key, value) in &shell.env {
        println!("      env: {key}={value}");
    }
    println!();

    println!("restart watch roots:");
    for root in config.restart_roots() {
        println!("  - {}", root.display());
    }

    debug!("dry-run complete (nothing spawned)");
}
