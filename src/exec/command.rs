// src/exec/command.rs

use std::fmt;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::info;

/// Program plus arguments for an external toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from a full argv; `None` when it is empty or the program is blank.
    pub fn from_argv(argv: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut iter = argv.into_iter();
        let program = iter.next()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program,
            args: iter.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// A `tokio` command for this argv, run in `cwd`.
    ///
    /// Children are put in their own process group on Unix so that terminal
    /// signals (Ctrl-C) reach the orchestrator only, and termination can be
    /// delivered to the whole group (wrappers like `npx` spawn grandchildren).
    pub fn to_command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(cwd).kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Consume a child pipe line by line so OS buffers never fill up, relaying
/// each line through `tracing`.
pub fn relay_lines<R>(source: &'static str, stream: &'static str, pipe: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(source, stream, "{}", line);
        }
    })
}
