// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

pub mod mock;

/// Abstract filesystem interface for the few mutations the serve session
/// performs itself (output directory preparation).
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
    }
}

/// Prepare the output directories before the session starts.
///
/// - `fresh = true`: every directory is removed (if present) and recreated
///   empty.
/// - otherwise only missing directories are created; existing output is kept
///   so the shell can start from the previous build.
///
/// Returns the directories that were (re)created.
pub fn prepare_output_dirs(
    fs: &dyn FileSystem,
    dirs: &[&Path],
    fresh: bool,
) -> Result<Vec<PathBuf>> {
    let mut prepared = Vec::new();

    for dir in dirs {
        if fs.exists(dir) && !fs.is_dir(dir) {
            bail!("output path {:?} exists but is not a directory", dir);
        }

        if fresh && fs.exists(dir) {
            info!(dir = ?dir, "--fresh: clearing output directory");
            fs.remove_dir_all(dir)?;
        } else if fs.exists(dir) {
            debug!(dir = ?dir, "keeping existing output directory");
            continue;
        }

        fs.create_dir_all(dir)?;
        prepared.push(dir.to_path_buf());
    }

    Ok(prepared)
}
