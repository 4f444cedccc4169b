//! Implementation of `wrapsync create-yaml`.
//!
//! Bootstrap mode: plan leniently, extract with problems tolerated, and
//! report for every header what its descriptor does not cover yet.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::project::Project;
use crate::extract::Extractor;
use crate::ops::{compile_plan, run_jobs, Scratch};
use crate::util::config::Config;
use crate::util::fs::{to_slash, write_atomic};
use crate::util::shell::Shell;

/// Options for the create-yaml command.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Create descriptors that do not exist yet
    pub write: bool,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Keep generated artifacts here instead of a temporary directory
    pub scratch_dir: Option<PathBuf>,
}

/// What happened to a header's missing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Dry run
    NotWritten,
    Written,
    /// The descriptor exists; it was left alone
    AlreadyExists,
}

/// The part of one header's signature its descriptor does not mention.
#[derive(Debug, Clone)]
pub struct MissingReport {
    /// Project-relative descriptor path
    pub descriptor: PathBuf,
    /// The report as a descriptor document
    pub yaml: String,
    pub status: WriteStatus,
}

impl MissingReport {
    /// `=== path ===` followed by the document.
    pub fn render(&self) -> String {
        format!("=== {} ===\n{}", to_slash(&self.descriptor), self.yaml)
    }
}

/// Report (and optionally create) missing descriptor content.
pub fn create_yaml(
    project: &Project,
    config: &Config,
    shell: &Shell,
    extractor: &dyn Extractor,
    opts: &CreateOptions,
) -> Result<Vec<MissingReport>> {
    let plan = compile_plan(project, config, true)?;
    let scratch = Scratch::new(opts.scratch_dir.as_deref())?;
    let set = run_jobs(
        project,
        &plan,
        extractor,
        shell,
        opts.jobs,
        true,
        scratch.path(),
    )?;

    let mut reports = Vec::new();
    for extraction in set.iter() {
        if extraction.missing.is_empty() {
            continue;
        }
        let descriptor = extraction.action.descriptor.clone();
        let yaml = extraction
            .missing
            .to_document(to_slash(&descriptor))
            .render();

        let full = project.root().join(&descriptor);
        let status = if !opts.write {
            WriteStatus::NotWritten
        } else if full.exists() {
            WriteStatus::AlreadyExists
        } else {
            write_atomic(&full, &yaml)?;
            WriteStatus::Written
        };

        reports.push(MissingReport {
            descriptor,
            yaml,
            status,
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeExtractor, ProjectFixture};

    fn extractor() -> FakeExtractor {
        FakeExtractor::new()
            .with_yaml(
                "Encoder",
                "classes:\n  robot::Encoder:\n    methods:\n      Encoder:\n      Get:\n      Reset:\n",
            )
            .with_yaml("Motor", "functions:\n  robot::SetSpeed:\n")
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (tmp, project) = ProjectFixture::sample().load();
        let reports = create_yaml(
            &project,
            &Config::default(),
            &Shell::from_flags(false, true),
            &extractor(),
            &CreateOptions::default(),
        )
        .unwrap();

        // Counter's report is empty, so only two headers are listed.
        let names: Vec<_> = reports.iter().map(|r| to_slash(&r.descriptor)).collect();
        assert_eq!(
            names,
            ["wrapcfg/robot/hal/_hal/Encoder.yml", "wrapcfg/robot/motor/_motor/Motor.yml"]
        );
        assert!(reports.iter().all(|r| r.status == WriteStatus::NotWritten));

        let encoder = reports[0].render();
        assert!(encoder.starts_with("=== wrapcfg/robot/hal/_hal/Encoder.yml ===\n---\n\n"));
        assert!(encoder.contains("Reset:"));
        assert!(!encoder.contains("Get:"));

        assert!(!tmp.path().join("wrapcfg/robot/motor").exists());
    }

    #[test]
    fn test_write_creates_only_new_files() {
        let (tmp, project) = ProjectFixture::sample().load();
        let before =
            std::fs::read_to_string(tmp.path().join("wrapcfg/robot/hal/_hal/Encoder.yml")).unwrap();

        let reports = create_yaml(
            &project,
            &Config::default(),
            &Shell::from_flags(false, true),
            &extractor(),
            &CreateOptions {
                write: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(reports[0].status, WriteStatus::AlreadyExists);
        assert_eq!(reports[1].status, WriteStatus::Written);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("wrapcfg/robot/hal/_hal/Encoder.yml")).unwrap(),
            before
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("wrapcfg/robot/motor/_motor/Motor.yml"))
                .unwrap(),
            reports[1].yaml
        );
    }

    #[test]
    fn test_bootstrap_tolerates_unknown_dependency() {
        let fixture = ProjectFixture::new(
            "[modules.\"pkg._ext\"]\ndepends = [\"nowhere\"]\n[modules.\"pkg._ext\".headers]\nFoo = \"foo.h\"\n\n[modules.\"pkg._other\".headers]\nBar = \"bar.h\"\n",
        )
        .file("src/pkg/foo.h", "")
        .file("src/pkg/bar.h", "");
        let (_tmp, project) = fixture.load();

        let reports = create_yaml(
            &project,
            &Config::default(),
            &Shell::from_flags(false, true),
            &FakeExtractor::new().with_yaml("Bar", "enums:\n  Mode:\n"),
            &CreateOptions::default(),
        )
        .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].descriptor, PathBuf::from("wrapcfg/pkg/_other/Bar.yml"));
    }
}
