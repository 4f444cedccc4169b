//! High-level operations.
//!
//! One module per wrapsync command, plus the planning and extraction steps
//! they share.

pub mod create_yaml;
pub mod scan_headers;
pub mod update_yaml;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

use crate::builder::deps::DependencyCache;
use crate::builder::executor::{ExtractionSet, JobExecutor};
use crate::builder::plan::{self, BuildPlan, PlanOptions};
use crate::core::project::Project;
use crate::extract::Extractor;
use crate::util::config::Config;
use crate::util::fs::ensure_dir;
use crate::util::shell::Shell;

pub use create_yaml::{create_yaml, CreateOptions, MissingReport, WriteStatus};
pub use scan_headers::{scan_headers, ScanOptions, ScanReport};
pub use update_yaml::{update_yaml, UpdateOptions, UpdateOutcome};

/// Dependency lookup for a project, seeded with the configured pkg-config
/// directories.
pub fn dependency_cache(project: &Project, config: &Config) -> DependencyCache {
    let search_paths: Vec<PathBuf> = config
        .pkg_config
        .search_paths
        .iter()
        .map(|p| project.root().join(p))
        .collect();
    DependencyCache::new(project, &search_paths)
}

/// Compile the project's build plan under the configured compiler flavor.
pub fn compile_plan(project: &Project, config: &Config, relaxed: bool) -> Result<BuildPlan> {
    let options = PlanOptions {
        missing_descriptors_ok: true,
        relaxed,
        compiler: config.compiler()?.unwrap_or_default(),
    };
    let deps = dependency_cache(project, config);
    Ok(plan::compile(project, &deps, &options)?)
}

/// Run every action of `plan` with a progress bar on `shell`.
pub fn run_jobs(
    project: &Project,
    plan: &BuildPlan,
    extractor: &dyn Extractor,
    shell: &Shell,
    jobs: Option<usize>,
    bootstrap: bool,
    scratch: &Path,
) -> Result<ExtractionSet> {
    let progress = shell.progress(plan.len() as u64, "Extracting");
    JobExecutor::new(extractor, project.root(), scratch)
        .jobs(jobs)
        .bootstrap(bootstrap)
        .progress(progress)
        .run(plan)
}

/// Where a run's generated descriptors and depfiles go.
#[derive(Debug)]
pub enum Scratch {
    /// Removed when dropped
    Temp(TempDir),
    /// A user-supplied directory, kept after the run
    Kept(PathBuf),
}

impl Scratch {
    /// Use `dir` when given (it must be empty or not exist yet), otherwise
    /// a fresh temporary directory.
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => {
                if dir.is_dir()
                    && std::fs::read_dir(dir)
                        .with_context(|| format!("failed to read {}", dir.display()))?
                        .next()
                        .is_some()
                {
                    bail!("scratch directory `{}` is not empty", dir.display());
                }
                ensure_dir(dir)?;
                Ok(Scratch::Kept(dir.to_path_buf()))
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("wrapsync-")
                    .tempdir()
                    .context("failed to create scratch directory")?;
                Ok(Scratch::Temp(tmp))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Scratch::Temp(tmp) => tmp.path(),
            Scratch::Kept(dir) => dir,
        }
    }
}
