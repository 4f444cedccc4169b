//! Build plan generation.
//!
//! A BuildPlan lists one extraction action per enabled header, with its
//! search paths resolved and its artifact paths fixed. Planning reads the
//! filesystem (to locate headers and descriptors) but never writes to it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builder::deps::DependencyCache;
use crate::core::project::{ExtensionModule, Project, ProjectError};
use crate::util::fs::normalize_path;

/// Preprocessor dialect the extractor should emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerFlavor {
    Gcc,
    Msvc,
    Pcpp,
}

impl CompilerFlavor {
    /// Flavor matching the host platform.
    pub fn host() -> Self {
        if cfg!(windows) {
            CompilerFlavor::Msvc
        } else {
            CompilerFlavor::Gcc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFlavor::Gcc => "gcc",
            CompilerFlavor::Msvc => "msvc",
            CompilerFlavor::Pcpp => "pcpp",
        }
    }
}

impl Default for CompilerFlavor {
    fn default() -> Self {
        CompilerFlavor::host()
    }
}

impl fmt::Display for CompilerFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilerFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcc" => Ok(CompilerFlavor::Gcc),
            "msvc" => Ok(CompilerFlavor::Msvc),
            "pcpp" => Ok(CompilerFlavor::Pcpp),
            other => Err(format!(
                "unknown compiler flavor `{}` (expected gcc, msvc or pcpp)",
                other
            )),
        }
    }
}

/// One header extraction.
#[derive(Debug, Clone, Serialize)]
pub struct BuildAction {
    /// Owning extension module
    pub module: String,
    /// Header name, also the descriptor file stem
    pub name: String,
    /// Absolute path of the header
    pub header: PathBuf,
    /// Search directory the header was found in
    pub header_root: PathBuf,
    /// Include search path, in lookup order
    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub compiler: CompilerFlavor,
    /// Project-relative descriptor path
    pub descriptor: PathBuf,
    /// Whether the descriptor existed when the plan was made
    pub descriptor_exists: bool,
    /// Generated descriptor, relative to the scratch area
    pub output: PathBuf,
    /// Depfile, relative to the scratch area
    pub depfile: PathBuf,
}

impl BuildAction {
    /// Short label for logs and failure reports.
    pub fn label(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }
}

/// A header excluded from planning whose descriptor must be preserved.
#[derive(Debug, Clone, Serialize)]
pub struct DisabledHeader {
    pub module: String,
    pub name: String,
    /// Project-relative descriptor path
    pub descriptor: PathBuf,
}

/// A complete plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    /// Actions in declaration order (module name, then header name)
    pub actions: Vec<BuildAction>,

    /// Headers that are declared but disabled
    pub disabled: Vec<DisabledHeader>,

    /// Every module's descriptor directory (project-relative, deduplicated)
    pub descriptor_dirs: Vec<PathBuf>,

    /// Problems downgraded to warnings in relaxed mode
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl BuildPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Serialize the plan for `--plan`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Options controlling how strictly the plan is compiled.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Descriptors that do not exist yet are planned against an empty
    /// document instead of failing.
    pub missing_descriptors_ok: bool,
    /// Invalid modules, unknown dependencies and missing headers become
    /// warnings.
    pub relaxed: bool,
    pub compiler: CompilerFlavor,
}

/// Compile a project into a build plan.
pub fn compile(
    project: &Project,
    deps: &DependencyCache,
    options: &PlanOptions,
) -> Result<BuildPlan, ProjectError> {
    let mut plan = BuildPlan::default();

    for invalid in project.invalid_modules() {
        if !options.relaxed {
            return Err(invalid.to_error());
        }
        warn(&mut plan, invalid.to_error().to_string());
    }

    check_unique_descriptors(project)?;

    for module in project.modules() {
        let dir = project.descriptor_dir(module);
        if !plan.descriptor_dirs.contains(&dir) {
            plan.descriptor_dirs.push(dir);
        }

        for header in module.disabled_headers() {
            plan.disabled.push(DisabledHeader {
                module: module.name.clone(),
                name: header.name.clone(),
                descriptor: project.descriptor_path(module, header),
            });
        }
        if !module.enabled {
            tracing::debug!("module `{}` is disabled", module.name);
            continue;
        }

        let search_paths = match search_paths(project, module, deps) {
            Ok(paths) => paths,
            Err(e) if options.relaxed => {
                warn(&mut plan, e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        for header in module.headers.iter().filter(|h| h.enabled) {
            let Some(header_root) = search_paths
                .iter()
                .find(|dir| dir.join(&header.header).is_file())
            else {
                let err = ProjectError::HeaderNotFound {
                    module: module.name.clone(),
                    header: header.header.display().to_string(),
                    searched: search_paths.clone(),
                };
                if options.relaxed {
                    warn(&mut plan, err.to_string());
                    continue;
                }
                return Err(err);
            };

            let descriptor = project.descriptor_path(module, header);
            let descriptor_exists = project.root().join(&descriptor).is_file();
            if !descriptor_exists && !options.missing_descriptors_ok {
                return Err(ProjectError::MissingDescriptor {
                    header: header.name.clone(),
                    path: descriptor,
                });
            }

            plan.actions.push(BuildAction {
                module: module.name.clone(),
                name: header.name.clone(),
                header: normalize_path(&header_root.join(&header.header)),
                header_root: header_root.clone(),
                include_paths: search_paths.clone(),
                defines: module.defines.clone(),
                compiler: options.compiler,
                output: descriptor.clone(),
                depfile: descriptor.with_extension("d"),
                descriptor,
                descriptor_exists,
            });
        }
    }

    tracing::debug!(
        "planned {} action(s), {} disabled header(s)",
        plan.actions.len(),
        plan.disabled.len()
    );
    Ok(plan)
}

/// Include search path for a module: its package directory, then its
/// declared include directories, then whatever its dependencies contribute.
pub fn search_paths(
    project: &Project,
    module: &ExtensionModule,
    deps: &DependencyCache,
) -> Result<Vec<PathBuf>, ProjectError> {
    let mut paths = vec![normalize_path(&project.module_header_root(module))];

    for include in &module.includes {
        push_unique(&mut paths, normalize_path(&project.root().join(include)));
    }
    for dep in &module.depends {
        for path in deps.include_paths(dep, &module.name)? {
            push_unique(&mut paths, path);
        }
    }
    Ok(paths)
}

/// Every header, enabled or not, must own its descriptor path.
fn check_unique_descriptors(project: &Project) -> Result<(), ProjectError> {
    let mut owners: BTreeMap<PathBuf, String> = BTreeMap::new();
    for module in project.modules() {
        for header in &module.headers {
            let path = project.descriptor_path(module, header);
            let owner = format!("{}:{}", module.name, header.name);
            if let Some(first) = owners.get(&path) {
                return Err(ProjectError::DuplicateDescriptor {
                    path,
                    first: first.clone(),
                    second: owner,
                });
            }
            owners.insert(path, owner);
        }
    }
    Ok(())
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn warn(plan: &mut BuildPlan, message: String) {
    tracing::warn!("{}", message);
    plan.warnings.push(message);
}
