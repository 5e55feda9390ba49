//! Disposable project copies
//!
//! Verification mutates files, so it never runs against the project itself.
//! `SandboxManager::create_copy` rebuilds a sibling copy from scratch (no
//! incremental sync) and prepares it with a single hook run.

use crate::config::SandboxConfig;
use crate::tools::run_shell;
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Version control metadata never copied into a sandbox
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("project {} is not accessible: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove previous sandbox {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid sandbox suffix {suffix:?}: must be non-empty and contain no path separator")]
    InvalidSuffix { suffix: String },

    #[error("sandbox {} would overlap project {}", sandbox.display(), project.display())]
    Overlap { project: PathBuf, sandbox: PathBuf },

    #[error("preparation hook `{hook}` failed: {source:#}")]
    Prepare {
        hook: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Runs once in every fresh sandbox before verification starts
pub trait PrepareHook: Send + Sync {
    fn name(&self) -> &str;

    fn prepare(&self, sandbox: &Path) -> anyhow::Result<()>;
}

/// Leaves the copy as is
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PrepareHook for NoopHook {
    fn name(&self) -> &str {
        "noop"
    }

    fn prepare(&self, _sandbox: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs a shell command such as `npm ci` inside the sandbox
#[derive(Debug, Clone)]
pub struct ShellHook {
    command: String,
    timeout: Duration,
}

impl ShellHook {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl PrepareHook for ShellHook {
    fn name(&self) -> &str {
        &self.command
    }

    fn prepare(&self, sandbox: &Path) -> anyhow::Result<()> {
        let output = run_shell(&self.command, sandbox, self.timeout, None)?;
        if output.timed_out {
            anyhow::bail!("timed out after {}s", self.timeout.as_secs());
        }
        if !output.success() {
            anyhow::bail!(
                "exited with status {}: {}",
                output.status.unwrap_or(-1),
                output.stderr.trim()
            );
        }
        Ok(())
    }
}

/// Creates and recreates the sandbox of a project
pub struct SandboxManager {
    suffix: String,
    hook: Box<dyn PrepareHook>,
}

impl Default for SandboxManager {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

impl SandboxManager {
    pub fn new(suffix: impl Into<String>, hook: Box<dyn PrepareHook>) -> Self {
        Self {
            suffix: suffix.into(),
            hook,
        }
    }

    /// Uses a `ShellHook` when a prepare command is configured
    pub fn from_config(config: &SandboxConfig) -> Self {
        let hook: Box<dyn PrepareHook> = match &config.prepare_command {
            Some(command) => Box::new(ShellHook::new(
                command.clone(),
                Duration::from_secs(config.prepare_timeout_secs),
            )),
            None => Box::new(NoopHook),
        };
        Self::new(config.suffix.clone(), hook)
    }

    /// Where the copy of `project` lives: a sibling named `<project><suffix>`
    ///
    /// Never the project itself or a path inside it.
    pub fn sandbox_path(&self, project: &Path) -> Result<PathBuf, CopyError> {
        if self.suffix.is_empty() || self.suffix.chars().any(std::path::is_separator) {
            return Err(CopyError::InvalidSuffix {
                suffix: self.suffix.clone(),
            });
        }
        let project = fs::canonicalize(project).map_err(|source| CopyError::SourceUnavailable {
            path: project.to_path_buf(),
            source,
        })?;
        let name = project
            .file_name()
            .ok_or_else(|| CopyError::SourceUnavailable {
                path: project.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path has no directory name"),
            })?
            .to_string_lossy()
            .into_owned();
        let sandbox = project.with_file_name(format!("{}{}", name, self.suffix));
        ensure_disjoint(&project, &sandbox)?;
        Ok(sandbox)
    }

    /// Replace any previous sandbox with a fresh, prepared copy of `project`
    pub fn create_copy(&self, project: &Path) -> Result<PathBuf, CopyError> {
        let metadata = fs::metadata(project).map_err(|source| CopyError::SourceUnavailable {
            path: project.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(CopyError::SourceUnavailable {
                path: project.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let source = fs::canonicalize(project).map_err(|source| CopyError::SourceUnavailable {
            path: project.to_path_buf(),
            source,
        })?;
        let sandbox = self.sandbox_path(&source)?;

        if fs::symlink_metadata(&sandbox).is_ok() {
            debug!("Removing previous sandbox {}", sandbox.display());
            remove_existing(&sandbox).map_err(|source| CopyError::Remove {
                path: sandbox.clone(),
                source,
            })?;
        }

        let copied = copy_tree(&source, &sandbox)?;
        debug!("Copied {} file(s) into {}", copied, sandbox.display());

        self.hook
            .prepare(&sandbox)
            .map_err(|source| CopyError::Prepare {
                hook: self.hook.name().to_string(),
                source,
            })?;

        info!("Sandbox ready at {}", sandbox.display());
        Ok(sandbox)
    }
}

/// The sandbox is wiped before every copy, so it must not contain the
/// project or sit inside it
fn ensure_disjoint(project: &Path, sandbox: &Path) -> Result<(), CopyError> {
    if sandbox.starts_with(project) || project.starts_with(sandbox) {
        return Err(CopyError::Overlap {
            project: project.to_path_buf(),
            sandbox: sandbox.to_path_buf(),
        });
    }
    Ok(())
}

fn remove_existing(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copy everything under `src` except VCS metadata, hidden and ignored
/// files included. Returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, CopyError> {
    let walker = WalkBuilder::new(src)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| {
            entry.depth() == 0
                || !VCS_DIRS
                    .iter()
                    .any(|dir| entry.file_name() == std::ffi::OsStr::new(dir))
        })
        .build();

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(|e| CopyError::Copy {
            path: src.to_path_buf(),
            source: walk_error(e),
        })?;
        let path = entry.path();
        let relative = path.strip_prefix(src).unwrap_or(path);
        let target = dst.join(relative);
        let io_err = |source| CopyError::Copy {
            path: path.to_path_buf(),
            source,
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_err)?;
        } else if file_type.is_symlink() {
            copy_symlink(path, &target).map_err(io_err)?;
            copied += 1;
        } else {
            fs::copy(path, &target).map_err(io_err)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let destination = fs::read_link(link)?;
    std::os::unix::fs::symlink(destination, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

fn walk_error(e: ignore::Error) -> io::Error {
    let message = e.to_string();
    e.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
}
