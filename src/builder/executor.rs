//! Job executor.
//!
//! Runs one extraction per [`BuildAction`] on a bounded rayon pool. Every
//! job reads the project read-only and writes only below the scratch
//! directory. Failures are collected rather than short-circuited, and the
//! run as a whole fails closed: either every job succeeded and an
//! [`ExtractionSet`] is returned, or an [`ExtractionFailed`] lists each
//! failed job.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use thiserror::Error;

use crate::builder::plan::{BuildAction, BuildPlan};
use crate::core::document::Document;
use crate::core::signature::SignatureReport;
use crate::extract::{ExtractRequest, Extractor};
use crate::util::fs::{ensure_dir, read_to_string, to_slash, write_once};
use crate::util::shell::Progress;

/// Successful extraction of one header.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub action: BuildAction,
    /// Descriptor built from the fresh report
    pub generated: Document,
    /// What the current descriptor does not mention yet
    pub missing: SignatureReport,
    /// Absolute path of the generated descriptor in scratch
    pub output: PathBuf,
    /// Absolute path of the depfile in scratch, if the extractor wrote one
    pub depfile: Option<PathBuf>,
}

/// Every extraction of a run, in plan order.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSet {
    pub extractions: Vec<Extraction>,
}

impl ExtractionSet {
    pub fn len(&self) -> usize {
        self.extractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extraction> {
        self.extractions.iter()
    }
}

/// Outcome of a single job.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(Extraction),
    Failed(JobFailure),
}

/// A failed job and its captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub label: String,
    pub diagnostic: String,
}

/// At least one job failed. Nothing from the run is usable.
#[derive(Debug, Error)]
pub struct ExtractionFailed {
    pub failures: Vec<JobFailure>,
    pub total: usize,
}

impl fmt::Display for ExtractionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} header extraction(s) failed",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n\n--- {} ---\n{}", failure.label, failure.diagnostic.trim_end())?;
        }
        Ok(())
    }
}

/// Runs extraction jobs for a plan.
pub struct JobExecutor<'a> {
    extractor: &'a dyn Extractor,
    project_root: PathBuf,
    scratch: PathBuf,
    jobs: usize,
    bootstrap: bool,
    progress: Progress,
}

impl<'a> JobExecutor<'a> {
    /// Create an executor writing below `scratch`.
    pub fn new(extractor: &'a dyn Extractor, project_root: &Path, scratch: &Path) -> Self {
        JobExecutor {
            extractor,
            project_root: project_root.to_path_buf(),
            scratch: scratch.to_path_buf(),
            jobs: default_jobs(),
            bootstrap: false,
            progress: Progress::hidden(),
        }
    }

    /// Worker count; `None` keeps the host parallelism.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        if let Some(j) = jobs {
            self.jobs = j.max(1);
        }
        self
    }

    /// Tolerate extractor problems that would otherwise fail a job.
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Run every action of `plan` and wait for all of them.
    pub fn run(&self, plan: &BuildPlan) -> Result<ExtractionSet> {
        let start = Instant::now();
        tracing::info!(
            "extracting {} header(s) with {} on {} worker(s)",
            plan.len(),
            self.extractor.name(),
            self.jobs
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("wrapsync-job-{}", i))
            .build()
            .context("failed to start the job pool")?;

        let outcomes: Vec<JobOutcome> =
            pool.install(|| plan.actions.par_iter().map(|a| self.run_job(a)).collect());
        self.progress.finish();

        let mut extractions = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Succeeded(extraction) => extractions.push(extraction),
                JobOutcome::Failed(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            return Err(ExtractionFailed {
                failures,
                total: plan.len(),
            }
            .into());
        }

        tracing::debug!(
            "extracted {} header(s) in {:.2}s",
            extractions.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(ExtractionSet { extractions })
    }

    fn run_job(&self, action: &BuildAction) -> JobOutcome {
        let label = action.label();
        tracing::debug!("extracting {}", label);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.extract_one(action)))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "extractor `{}` panicked: {}",
                    self.extractor.name(),
                    panic_message(payload.as_ref())
                ))
            });
        self.progress.inc(1);

        match result {
            Ok(extraction) => JobOutcome::Succeeded(extraction),
            Err(e) => {
                tracing::debug!("{} failed: {:#}", label, e);
                JobOutcome::Failed(JobFailure {
                    label,
                    diagnostic: format!("{:#}", e),
                })
            }
        }
    }

    fn extract_one(&self, action: &BuildAction) -> Result<Extraction> {
        let name = to_slash(&action.descriptor);
        let descriptor_path = self.project_root.join(&action.descriptor);
        let descriptor = if descriptor_path.is_file() {
            let text = read_to_string(&descriptor_path)?;
            Document::parse(name.clone(), &text)?
        } else {
            Document::new(name.clone())
        };

        let depfile = self.scratch.join(&action.depfile);
        if let Some(parent) = depfile.parent() {
            ensure_dir(parent)?;
        }

        let request = ExtractRequest {
            action,
            descriptor: &descriptor,
            depfile: depfile.clone(),
            bootstrap: self.bootstrap,
            project_root: &self.project_root,
        };
        let signature = self
            .extractor
            .extract(&request)
            .with_context(|| format!("failed to extract `{}`", action.header.display()))?;

        let generated = signature.report.to_document(name);
        let output = self.scratch.join(&action.output);
        write_once(&output, &generated.render())?;

        Ok(Extraction {
            action: action.clone(),
            generated,
            missing: signature.missing,
            output,
            depfile: depfile.is_file().then_some(depfile),
        })
    }
}

fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
