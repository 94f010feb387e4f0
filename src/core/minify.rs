//! Lua minification using luamin
//!
//! Rewrites deployed `.lua` files with the output of `luamin -f <file>`.
//! A file that fails to minify is left as copied and counted; the run goes on.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::MinifyError;
use crate::infra::filesystem::has_suffix;
use crate::infra::process::{resolve_executable, RunError, SystemRunner, ToolRunner};

/// Minification statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MinifyStats {
    /// `.lua` files found
    pub processed: usize,
    /// Files rewritten with minified output
    pub minified: usize,
    /// Files left untouched after a failure
    pub failed: usize,
}

impl MinifyStats {
    /// Fold another run's counts into this one
    pub fn absorb(&mut self, other: MinifyStats) {
        self.processed += other.processed;
        self.minified += other.minified;
        self.failed += other.failed;
    }
}

/// Locate the minifier
///
/// Order: the configured path, `luamin` on PATH, then the npm global shim
/// under `%APPDATA%\npm`.
pub fn find_minifier(configured: Option<&Path>) -> Result<PathBuf, MinifyError> {
    if let Some(path) = configured {
        return resolve_executable(path).ok_or_else(|| MinifyError::ToolUnavailable {
            tool: path.display().to_string(),
        });
    }
    if let Ok(path) = which::which(defaults::DEFAULT_MINIFIER) {
        return Ok(path);
    }
    std::env::var_os("APPDATA")
        .map(|appdata| PathBuf::from(appdata).join("npm").join("luamin.cmd"))
        .filter(|shim| shim.is_file())
        .ok_or_else(|| MinifyError::ToolUnavailable {
            tool: defaults::DEFAULT_MINIFIER.to_string(),
        })
}

/// Runs the minifier over files and trees
pub struct Minifier {
    tool: PathBuf,
    runner: Box<dyn ToolRunner>,
}

impl std::fmt::Debug for Minifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minifier").field("tool", &self.tool).finish()
    }
}

impl Minifier {
    /// Minifier running `tool`
    pub fn new(tool: PathBuf) -> Self {
        Self::with_runner(tool, Box::new(SystemRunner))
    }

    /// Minifier with a custom process runner
    pub fn with_runner(tool: PathBuf, runner: Box<dyn ToolRunner>) -> Self {
        Self { tool, runner }
    }

    /// Minify one file in place
    pub fn minify_file(&self, path: &Path) -> Result<(), MinifyError> {
        let arg = path.to_string_lossy();
        let output = self
            .runner
            .run(&self.tool, &["-f", &arg], defaults::MINIFY_TIMEOUT)
            .map_err(|e| MinifyError::Spawn {
                path: path.to_path_buf(),
                error: match e {
                    RunError::Spawn(e) => e.to_string(),
                    RunError::TimedOut => format!(
                        "timed out after {}s",
                        defaults::MINIFY_TIMEOUT.as_secs()
                    ),
                },
            })?;

        if !output.success() || output.stdout.trim().is_empty() {
            return Err(MinifyError::Failed {
                path: path.to_path_buf(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        std::fs::write(path, output.stdout).map_err(|e| MinifyError::Write {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Minify every `.lua` file under `root`
    pub fn minify_tree(&self, root: &Path) -> MinifyStats {
        let mut stats = MinifyStats::default();
        if !root.is_dir() {
            tracing::warn!("Nothing to minify, {} is not a folder", root.display());
            return stats;
        }

        tracing::info!("Minifying Lua files in {}", root.display());
        for entry in walkdir::WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && has_suffix(e.path(), ".lua"))
        {
            stats.processed += 1;
            match self.minify_file(entry.path()) {
                Ok(()) => {
                    tracing::debug!("Minified {}", entry.path().display());
                    stats.minified += 1;
                }
                Err(e) => {
                    tracing::warn!("{e}");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            "Minified {}/{} files ({} failed)",
            stats.minified,
            stats.processed,
            stats.failed
        );
        stats
    }
}
