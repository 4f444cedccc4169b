//! Tool configuration.
//!
//! Two configuration file locations are merged:
//! - Global: `~/.wrapsync/config.toml` - user-wide defaults
//! - Project: `.wrapsync/config.toml` - project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::plan::CompilerFlavor;

/// Wrapsync tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Job execution settings
    pub build: BuildConfig,

    /// Header extractor settings
    pub extractor: ExtractorConfig,

    /// pkg-config lookup settings
    pub pkg_config: PkgConfigConfig,
}

/// Job execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,
}

/// Header extractor settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// External extractor program and leading arguments. When unset the
    /// built-in scanner is used.
    pub command: Option<Vec<String>>,

    /// Compiler flavor passed to the extractor (gcc, msvc, pcpp)
    pub compiler: Option<String>,
}

/// pkg-config lookup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PkgConfigConfig {
    /// Extra directories searched for `.pc` files, relative paths are
    /// resolved against the project root
    pub search_paths: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }

        if other.extractor.command.is_some() {
            self.extractor.command = other.extractor.command;
        }
        if other.extractor.compiler.is_some() {
            self.extractor.compiler = other.extractor.compiler;
        }

        // Search paths accumulate; project entries are searched first
        if !other.pkg_config.search_paths.is_empty() {
            let mut paths = other.pkg_config.search_paths;
            paths.append(&mut self.pkg_config.search_paths);
            self.pkg_config.search_paths = paths;
        }
    }

    /// Parse the configured compiler flavor.
    pub fn compiler(&self) -> Result<Option<CompilerFlavor>> {
        self.extractor
            .compiler
            .as_deref()
            .map(|s| s.parse::<CompilerFlavor>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid `extractor.compiler` setting: {}", e))
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.wrapsync/config.toml)
/// 2. Global config (~/.wrapsync/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global wrapsync config directory (~/.wrapsync).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".wrapsync"))
}

/// Get the project config path (.wrapsync/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".wrapsync").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.jobs.is_none());
        assert!(config.extractor.command.is_none());
        assert!(config.pkg_config.search_paths.is_empty());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 8

[extractor]
command = ["my-scanner", "--yaml"]
compiler = "msvc"

[pkg_config]
search_paths = ["vendor/pkgconfig"]
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(
            config.extractor.command,
            Some(vec!["my-scanner".to_string(), "--yaml".to_string()])
        );
        assert_eq!(config.compiler().unwrap(), Some(CompilerFlavor::Msvc));
        assert_eq!(
            config.pkg_config.search_paths,
            vec![PathBuf::from("vendor/pkgconfig")]
        );
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.jobs = Some(4);
        base.extractor.compiler = Some("gcc".to_string());
        base.pkg_config.search_paths = vec![PathBuf::from("/global")];

        let mut project = Config::default();
        project.extractor.compiler = Some("pcpp".to_string());
        project.pkg_config.search_paths = vec![PathBuf::from("local")];

        base.merge(project);

        assert_eq!(base.build.jobs, Some(4));
        assert_eq!(base.extractor.compiler.as_deref(), Some("pcpp"));
        assert_eq!(
            base.pkg_config.search_paths,
            vec![PathBuf::from("local"), PathBuf::from("/global")]
        );
    }

    #[test]
    fn test_invalid_compiler() {
        let mut config = Config::default();
        config.extractor.compiler = Some("tcc".to_string());
        assert!(config.compiler().is_err());
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = project_config_path(tmp.path());
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();

        std::fs::write(&global, "[build]\njobs = 2\n").unwrap();
        std::fs::write(&project, "[build]\njobs = 6\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.build.jobs, Some(6));

        let config = load_config(Some(&global), &tmp.path().join("missing.toml"));
        assert_eq!(config.build.jobs, Some(2));
    }
}
