//! Descriptor synchronization.
//!
//! After every extraction has succeeded, the [`Synchronizer`] compares each
//! generated descriptor with the one on disk and works out what should
//! change. Nothing is written here; see [`SyncReport::commit`].

pub mod diff;
pub mod merge;
pub mod report;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::executor::ExtractionSet;
use crate::builder::plan::BuildPlan;
use crate::core::document::{Document, DocumentError};
use crate::util::fs::{find_files_with_ext, relative_path, to_slash};

pub use diff::MergeOperation;
pub use merge::{reconcile, Reconciled};
pub use report::{FileChange, SyncReport};

/// A descriptor on disk that could not be reconciled.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Malformed(#[from] DocumentError),
}

/// Every descriptor of a run that could not be reconciled.
#[derive(Debug, Error)]
pub struct ReconcileFailures {
    pub errors: Vec<ReconcileError>,
}

impl fmt::Display for ReconcileFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} descriptor(s) could not be reconciled", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

/// Reconciles generated descriptors against the project tree.
pub struct Synchronizer<'a> {
    root: &'a Path,
    plan: &'a BuildPlan,
}

impl<'a> Synchronizer<'a> {
    pub fn new(root: &'a Path, plan: &'a BuildPlan) -> Self {
        Synchronizer { root, plan }
    }

    /// Work out every file change for `set`.
    ///
    /// Malformed descriptors are collected across the whole run and
    /// reported together.
    pub fn synchronize(&self, set: &ExtractionSet) -> Result<SyncReport, ReconcileFailures> {
        let mut report = SyncReport::default();
        let mut errors = Vec::new();

        let generated: BTreeSet<&Path> = set.iter().map(|e| e.action.descriptor.as_path()).collect();
        let disabled: BTreeSet<&Path> = self
            .plan
            .disabled
            .iter()
            .map(|d| d.descriptor.as_path())
            .collect();

        let mut deletes = Vec::new();
        for existing in self.existing_descriptors() {
            if generated.contains(existing.as_path()) {
                continue;
            }
            if disabled.contains(existing.as_path()) {
                tracing::debug!("preserving disabled {}", existing.display());
                report.preserved.push(existing);
            } else {
                deletes.push(FileChange::Delete { path: existing });
            }
        }

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        for extraction in set.iter() {
            let path = &extraction.action.descriptor;
            let full = self.root.join(path);

            if !full.is_file() {
                creates.push(FileChange::Create {
                    path: path.clone(),
                    contents: extraction.generated.render(),
                });
                continue;
            }

            let original = match read_descriptor(&full, path) {
                Ok(doc) => doc,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let reconciled = reconcile(&original, &extraction.generated);
            tracing::debug!(
                "{}: {} edit(s) applied, {} kept back",
                path.display(),
                reconciled.applied,
                reconciled.skipped
            );

            let before = original.render();
            let after = reconciled.document.render();
            let diff = report::unified_diff(&to_slash(path), &before, &after);
            if diff.is_empty() {
                report.unchanged.push((path.clone(), after));
            } else {
                updates.push(FileChange::Update {
                    path: path.clone(),
                    diff,
                    contents: after,
                });
            }
        }

        if !errors.is_empty() {
            return Err(ReconcileFailures { errors });
        }

        creates.sort_by(|a, b| a.path().cmp(b.path()));
        updates.sort_by(|a, b| a.path().cmp(b.path()));
        report.changes = deletes;
        report.changes.extend(creates);
        report.changes.extend(updates);
        Ok(report)
    }

    /// Every `*.yml` below the plan's descriptor directories,
    /// project-relative and sorted.
    fn existing_descriptors(&self) -> Vec<PathBuf> {
        let mut found = BTreeSet::new();
        for dir in &self.plan.descriptor_dirs {
            for file in find_files_with_ext(&self.root.join(dir), &["yml"]) {
                found.insert(relative_path(self.root, &file));
            }
        }
        found.into_iter().collect()
    }
}

fn read_descriptor(full: &Path, path: &Path) -> Result<Document, ReconcileError> {
    let text = std::fs::read_to_string(full).map_err(|source| ReconcileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Document::parse(to_slash(path), &text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::deps::DependencyCache;
    use crate::builder::executor::JobExecutor;
    use crate::builder::plan::{compile, PlanOptions};
    use crate::test_support::{FakeExtractor, ProjectFixture};
    use tempfile::TempDir;

    const ENCODER_REPORT: &str =
        "classes:\n  robot::Encoder:\n    attributes:\n      count:\n    methods:\n      Encoder:\n      Get:\n      Reset:\n";

    fn run(fixture: &ProjectFixture, extractor: &FakeExtractor) -> (TempDir, Result<SyncReport, ReconcileFailures>) {
        let (tmp, project) = fixture.load();
        let deps = DependencyCache::new(&project, &[]);
        let options = PlanOptions {
            missing_descriptors_ok: true,
            ..Default::default()
        };
        let plan = compile(&project, &deps, &options).unwrap();
        let scratch = TempDir::new().unwrap();
        let set = JobExecutor::new(extractor, project.root(), scratch.path())
            .run(&plan)
            .unwrap();
        let report = Synchronizer::new(project.root(), &plan).synchronize(&set);
        (tmp, report)
    }

    fn sample_extractor() -> FakeExtractor {
        FakeExtractor::new()
            .with_yaml("Encoder", ENCODER_REPORT)
            .with_yaml("Counter", "classes:\n  robot::Counter:\n    methods:\n      Increment:\n")
            .with_yaml("Motor", "functions:\n  robot::SetSpeed:\n    overloads:\n      double:\n      int:\n")
    }

    #[test]
    fn test_sample_project_changes() {
        let (_tmp, report) = run(&ProjectFixture::sample(), &sample_extractor());
        let report = report.unwrap();

        let paths: Vec<_> = report.changes.iter().map(|c| to_slash(c.path())).collect();
        assert_eq!(
            paths,
            [
                "wrapcfg/robot/hal/_hal/Counter.yml",
                "wrapcfg/robot/motor/_motor/Motor.yml",
                "wrapcfg/robot/hal/_hal/Encoder.yml",
            ]
        );
        assert_eq!(report.preserved, [PathBuf::from("wrapcfg/robot/hal/_hal/Legacy.yml")]);

        match &report.changes[2] {
            FileChange::Update { diff, contents, .. } => {
                assert!(diff.contains("+      Reset:"));
                assert!(diff.contains("+    attributes:"));
                // The hand-written rename survives.
                assert!(contents.contains("rename: get"));
            }
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_new_header_created_verbatim() {
        let extractor = sample_extractor();
        let (_tmp, report) = run(&ProjectFixture::sample(), &extractor);
        let report = report.unwrap();

        let expected =
            crate::test_support::report_from_yaml("functions:\n  robot::SetSpeed:\n    overloads:\n      double:\n      int:\n")
                .to_document("wrapcfg/robot/motor/_motor/Motor.yml")
                .render();
        match &report.changes[1] {
            FileChange::Create { contents, .. } => assert_eq!(contents, &expected),
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_disabled_descriptor_survives_write() {
        let (tmp, report) = run(&ProjectFixture::sample(), &sample_extractor());
        report.unwrap().commit(tmp.path(), None).unwrap();
        assert!(tmp.path().join("wrapcfg/robot/hal/_hal/Legacy.yml").is_file());
    }

    #[test]
    fn test_stale_descriptor_deleted() {
        let fixture = ProjectFixture::sample().file("wrapcfg/robot/hal/_hal/Gone.yml", "classes:\n  Gone:\n");
        let (tmp, report) = run(&fixture, &sample_extractor());
        let report = report.unwrap();
        assert!(matches!(&report.changes[0], FileChange::Delete { path } if path.ends_with("Gone.yml")));

        report.commit(tmp.path(), None).unwrap();
        assert!(!tmp.path().join("wrapcfg/robot/hal/_hal/Gone.yml").exists());
    }

    #[test]
    fn test_second_run_is_clean() {
        let (tmp, report) = run(&ProjectFixture::sample(), &sample_extractor());
        report.unwrap().commit(tmp.path(), None).unwrap();

        let project = crate::core::project::Project::load(
            &tmp.path().join(crate::core::project::PROJECT_FILE_NAME),
        )
        .unwrap();
        let deps = DependencyCache::new(&project, &[]);
        let plan = compile(&project, &deps, &PlanOptions::default()).unwrap();
        let scratch = TempDir::new().unwrap();
        let extractor = sample_extractor();
        let set = JobExecutor::new(&extractor, project.root(), scratch.path())
            .run(&plan)
            .unwrap();
        let report = Synchronizer::new(project.root(), &plan).synchronize(&set).unwrap();
        assert!(report.is_clean(), "{}", report.render(false));
        assert_eq!(report.unchanged.len(), 3);
    }

    #[test]
    fn test_malformed_descriptors_collected() {
        let fixture = ProjectFixture::sample()
            .file("wrapcfg/robot/hal/_hal/Counter.yml", "classes: [\n")
            .file("wrapcfg/robot/motor/_motor/Motor.yml", "- just\n- a list\n");
        let (_tmp, project) = fixture.load();
        let deps = DependencyCache::new(&project, &[]);
        let plan = compile(&project, &deps, &PlanOptions::default()).unwrap();

        // Feed the synchronizer directly; the executor would refuse these.
        let extractor = sample_extractor();
        let scratch = TempDir::new().unwrap();
        let good_plan = BuildPlan {
            actions: plan
                .actions
                .iter()
                .filter(|a| a.name == "Encoder")
                .cloned()
                .collect(),
            ..plan.clone()
        };
        let mut set = JobExecutor::new(&extractor, project.root(), scratch.path())
            .run(&good_plan)
            .unwrap();
        for action in plan.actions.iter().filter(|a| a.name != "Encoder") {
            let mut extraction = set.extractions[0].clone();
            extraction.action = action.clone();
            set.extractions.push(extraction);
        }

        let failures = Synchronizer::new(project.root(), &plan)
            .synchronize(&set)
            .unwrap_err();
        assert_eq!(failures.errors.len(), 2);
        let text = failures.to_string();
        assert!(text.contains("Counter.yml"));
        assert!(text.contains("Motor.yml"));
    }
}
