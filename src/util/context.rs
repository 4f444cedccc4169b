//! Global context for wrapsync operations.
//!
//! Provides centralized access to the working directory, the global
//! configuration directory, and the project file lookup. Everything that
//! would otherwise be ambient process state is carried here explicitly.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::project::PROJECT_FILE_NAME;
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global wrapsync data (~/.wrapsync/)
    home: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        Ok(GlobalContext {
            cwd,
            home: config::global_config_dir(),
            verbose: false,
        })
    }

    /// Create a GlobalContext with a specific working directory and no
    /// global configuration.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: None,
            verbose: false,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Load the merged tool configuration for a project.
    pub fn load_config(&self, project_root: &Path) -> Config {
        config::load_config(
            self.config_path().as_deref(),
            &config::project_config_path(project_root),
        )
    }

    /// Locate the project file.
    ///
    /// An explicit path (relative to cwd) must exist. Otherwise the
    /// directory tree is searched upward from cwd for `Wrapsync.toml`.
    pub fn find_project_file(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            let path = self.cwd.join(path);
            if !path.is_file() {
                bail!("project file not found: {}", path.display());
            }
            return Ok(path);
        }

        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(PROJECT_FILE_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                bail!(
                    "could not find `{}` in `{}` or any parent directory",
                    PROJECT_FILE_NAME,
                    self.cwd.display()
                );
            }
        }
    }
}
