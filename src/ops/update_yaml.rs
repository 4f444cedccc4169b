//! Implementation of `wrapsync update-yaml`.
//!
//! The full pipeline: plan, extract every header, and only once all
//! extractions have succeeded reconcile each descriptor with its fresh
//! signature. Files are touched only in write mode.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use crate::core::project::Project;
use crate::extract::Extractor;
use crate::ops::{compile_plan, run_jobs, Scratch};
use crate::sync::{SyncReport, Synchronizer};
use crate::util::config::Config;
use crate::util::shell::Shell;

/// Options for the update-yaml command.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Commit the reconciled descriptors
    pub write: bool,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Write below this directory instead of in place
    pub output_dir: Option<PathBuf>,
    /// Emit the build plan as JSON and stop
    pub emit_plan: bool,
    /// Keep generated artifacts here instead of a temporary directory
    pub scratch_dir: Option<PathBuf>,
}

/// Result of update-yaml.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// `--plan`: the serialized plan
    Plan(String),
    Synced {
        report: SyncReport,
        /// Files changed on disk, in write mode
        written: Option<usize>,
    },
}

/// Bring every descriptor in line with its header.
pub fn update_yaml(
    project: &Project,
    config: &Config,
    shell: &Shell,
    extractor: &dyn Extractor,
    opts: &UpdateOptions,
) -> Result<UpdateOutcome> {
    let start = Instant::now();
    let plan = compile_plan(project, config, false)?;

    if opts.emit_plan {
        return Ok(UpdateOutcome::Plan(plan.to_json()?));
    }

    let scratch = Scratch::new(opts.scratch_dir.as_deref())?;
    let set = run_jobs(
        project,
        &plan,
        extractor,
        shell,
        opts.jobs,
        false,
        scratch.path(),
    )?;

    let report = Synchronizer::new(project.root(), &plan).synchronize(&set)?;
    tracing::debug!(
        "{} change(s), {} up to date, {} preserved",
        report.changes.len(),
        report.unchanged.len(),
        report.preserved.len()
    );

    let written = if opts.write {
        Some(report.commit(project.root(), opts.output_dir.as_deref())?)
    } else {
        None
    };

    shell.finished(format!("{} header(s)", set.len()), start.elapsed());
    Ok(UpdateOutcome::Synced { report, written })
}
