//! Project declaration (`Wrapsync.toml`).
//!
//! The project file maps each extension module to its header list, include
//! directories and named native dependencies. It is read once per run and
//! never written by this tool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Default project file name.
pub const PROJECT_FILE_NAME: &str = "Wrapsync.toml";

/// Errors raised while loading or interpreting the project declaration.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read project file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project file `{}`: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("invalid extension module `{name}`: {reason}")]
    InvalidModule { name: String, reason: String },

    #[error("unknown native dependency `{name}` (required by `{required_by}`)")]
    UnknownDependency { name: String, required_by: String },

    #[error("header `{header}` of module `{module}` was not found in any search path")]
    HeaderNotFound {
        module: String,
        header: String,
        searched: Vec<PathBuf>,
    },

    #[error("descriptor `{}` for header `{header}` does not exist", path.display())]
    MissingDescriptor { header: String, path: PathBuf },

    #[error("descriptor `{}` is claimed by both `{first}` and `{second}`", path.display())]
    DuplicateDescriptor {
        path: PathBuf,
        first: String,
        second: String,
    },
}

impl ProjectError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ProjectError::Read { path, source } => diag
                .with_location(path)
                .with_context(source.to_string())
                .with_suggestion(suggestions::NO_PROJECT),
            ProjectError::Malformed { path, .. } => diag.with_location(path),
            ProjectError::InvalidModule { .. } => diag.with_suggestion(
                "Module names are dotted paths such as `package.sub._ext`",
            ),
            ProjectError::UnknownDependency { .. } => {
                diag.with_suggestion(suggestions::MISSING_DEPENDENCY)
            }
            ProjectError::HeaderNotFound { searched, .. } => {
                let mut diag = diag;
                for dir in searched {
                    diag = diag.with_context(format!("searched {}", dir.display()));
                }
                diag.with_suggestion(suggestions::HEADER_NOT_FOUND)
            }
            ProjectError::MissingDescriptor { .. } => {
                diag.with_suggestion("Run `wrapsync create-yaml --write` to bootstrap it")
            }
            ProjectError::DuplicateDescriptor { .. } => diag.with_suggestion(
                "Give one of the modules a distinct `yaml_path` or rename one header",
            ),
        }
    }
}

/// Raw `Wrapsync.toml` contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectFile {
    pub project: ProjectSettings,
    pub modules: BTreeMap<String, ModuleConfig>,
    pub dependencies: BTreeMap<String, DependencyConfig>,
}

/// The `[project]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSettings {
    /// Root for module-derived header directories
    pub package_root: PathBuf,
    /// Root for descriptor directories
    pub yaml_root: PathBuf,
    /// Extra `scan-headers` ignore patterns
    pub scan_headers_ignore: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        ProjectSettings {
            package_root: PathBuf::from("src"),
            yaml_root: PathBuf::from("wrapcfg"),
            scan_headers_ignore: Vec::new(),
        }
    }
}

/// One `[modules."<name>"]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    pub includes: Vec<PathBuf>,
    pub depends: Vec<String>,
    pub defines: Vec<String>,
    pub enabled: bool,
    pub yaml_path: Option<PathBuf>,
    pub headers: BTreeMap<String, HeaderEntry>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            includes: Vec::new(),
            depends: Vec::new(),
            defines: Vec::new(),
            enabled: true,
            yaml_path: None,
            headers: BTreeMap::new(),
        }
    }
}

/// A header declaration: either a bare path or a table with a disable flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderEntry {
    Path(String),
    Detailed {
        header: String,
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

fn default_true() -> bool {
    true
}

impl HeaderEntry {
    pub fn header(&self) -> &str {
        match self {
            HeaderEntry::Path(h) => h,
            HeaderEntry::Detailed { header, .. } => header,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            HeaderEntry::Path(_) => true,
            HeaderEntry::Detailed { enabled, .. } => *enabled,
        }
    }
}

/// A `[dependencies.<name>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyConfig {
    pub include_dirs: Vec<PathBuf>,
    pub requires: Vec<String>,
}

/// A declared header within a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDecl {
    /// Logical name, also the descriptor file stem
    pub name: String,
    /// Header path relative to one of the module's search paths
    pub header: PathBuf,
    pub enabled: bool,
}

/// A validated extension module.
#[derive(Debug, Clone)]
pub struct ExtensionModule {
    pub name: String,
    pub includes: Vec<PathBuf>,
    pub depends: Vec<String>,
    pub defines: Vec<String>,
    pub enabled: bool,
    pub yaml_path: Option<PathBuf>,
    pub headers: Vec<HeaderDecl>,
}

/// A module declaration that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidModule {
    pub name: String,
    pub reason: String,
}

impl InvalidModule {
    pub fn to_error(&self) -> ProjectError {
        ProjectError::InvalidModule {
            name: self.name.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl ExtensionModule {
    fn from_config(name: &str, config: &ModuleConfig) -> Result<Self, InvalidModule> {
        let invalid = |reason: &str| InvalidModule {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.split('.').any(|part| part.is_empty()) {
            return Err(invalid("empty component in dotted name"));
        }
        if name.contains(['/', '\\']) {
            return Err(invalid("path separators are not allowed"));
        }

        let mut headers = Vec::with_capacity(config.headers.len());
        for (header_name, entry) in &config.headers {
            if header_name.is_empty() || header_name.contains(['/', '\\']) {
                return Err(invalid(&format!("bad header name `{}`", header_name)));
            }
            if entry.header().trim().is_empty() {
                return Err(invalid(&format!("header `{}` has an empty path", header_name)));
            }
            headers.push(HeaderDecl {
                name: header_name.clone(),
                header: PathBuf::from(entry.header()),
                enabled: entry.enabled(),
            });
        }

        Ok(ExtensionModule {
            name: name.to_string(),
            includes: config.includes.clone(),
            depends: config.depends.clone(),
            defines: config.defines.clone(),
            enabled: config.enabled,
            yaml_path: config.yaml_path.clone(),
            headers,
        })
    }

    /// Dotted name components.
    pub fn name_parts(&self) -> impl Iterator<Item = &str> {
        self.name.split('.')
    }

    /// Headers excluded from planning, either individually or because the
    /// whole module is disabled.
    pub fn disabled_headers(&self) -> impl Iterator<Item = &HeaderDecl> {
        self.headers
            .iter()
            .filter(move |h| !self.enabled || !h.enabled)
    }
}

/// A loaded project.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    path: PathBuf,
    settings: ProjectSettings,
    modules: Vec<ExtensionModule>,
    invalid_modules: Vec<InvalidModule>,
    dependencies: BTreeMap<String, DependencyConfig>,
}

impl Project {
    /// Load a project file. The project root is the file's directory.
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse project file contents.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ProjectError> {
        let file: ProjectFile = toml::from_str(text).map_err(|e| ProjectError::Malformed {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        let mut modules = Vec::with_capacity(file.modules.len());
        let mut invalid_modules = Vec::new();
        for (name, config) in &file.modules {
            match ExtensionModule::from_config(name, config) {
                Ok(module) => modules.push(module),
                Err(e) => invalid_modules.push(e),
            }
        }

        let root = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Project {
            root,
            path: path.to_path_buf(),
            settings: file.project,
            modules,
            invalid_modules,
            dependencies: file.dependencies,
        })
    }

    /// Module declarations that failed validation. Strict planning rejects
    /// the project if any exist; relaxed planning skips them.
    pub fn invalid_modules(&self) -> &[InvalidModule] {
        &self.invalid_modules
    }

    /// Directory containing the project file.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the project file itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modules(&self) -> &[ExtensionModule] {
        &self.modules
    }

    pub fn dependencies(&self) -> &BTreeMap<String, DependencyConfig> {
        &self.dependencies
    }

    pub fn scan_headers_ignore(&self) -> &[String] {
        &self.settings.scan_headers_ignore
    }

    /// Absolute package root.
    pub fn package_root(&self) -> PathBuf {
        self.root.join(&self.settings.package_root)
    }

    /// Default header root for a module: the package directory that
    /// contains it (`package_root/a/b` for `a.b._ext`).
    pub fn module_header_root(&self, module: &ExtensionModule) -> PathBuf {
        let parts: Vec<&str> = module.name_parts().collect();
        let mut dir = self.package_root();
        for part in &parts[..parts.len().saturating_sub(1)] {
            dir.push(part);
        }
        dir
    }

    /// Project-relative directory holding a module's descriptors.
    pub fn descriptor_dir(&self, module: &ExtensionModule) -> PathBuf {
        match &module.yaml_path {
            Some(path) => path.clone(),
            None => module
                .name_parts()
                .fold(self.settings.yaml_root.clone(), |dir, part| dir.join(part)),
        }
    }

    /// Project-relative descriptor path for one header.
    pub fn descriptor_path(&self, module: &ExtensionModule, header: &HeaderDecl) -> PathBuf {
        self.descriptor_dir(module).join(format!("{}.yml", header.name))
    }
}
