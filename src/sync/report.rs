//! What a synchronization would change, and committing it.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use similar::TextDiff;

use crate::util::fs::{copy_file, strip_first_component, to_slash, write_atomic};

/// One pending change to a descriptor file. Paths are project-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// A new header: the generated document, verbatim
    Create { path: PathBuf, contents: String },
    /// A reconciled document whose canonical text differs
    Update {
        path: PathBuf,
        diff: String,
        contents: String,
    },
    /// A descriptor with no header behind it any more
    Delete { path: PathBuf },
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Create { path, .. }
            | FileChange::Update { path, .. }
            | FileChange::Delete { path } => path,
        }
    }
}

/// Outcome of a synchronization, before anything is written.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Deletions, then creations, then updates; each group sorted by path
    pub changes: Vec<FileChange>,
    /// Reconciled documents that are already up to date
    pub unchanged: Vec<(PathBuf, String)>,
    /// Descriptors of disabled headers, left as they are
    pub preserved: Vec<PathBuf>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }

    /// Human-readable report. In dry-run mode (`write == false`) every
    /// line is phrased as what would happen.
    pub fn render(&self, write: bool) -> String {
        let mut out = String::new();
        if !write {
            let bar = "*".repeat(20);
            let _ = writeln!(out, "\n\n{}\nDry Run Results\n{}", bar, bar);
        }

        for change in &self.changes {
            let path = to_slash(change.path());
            match change {
                FileChange::Delete { .. } if write => {
                    let _ = writeln!(out, "Deleting unused file {}", path);
                }
                FileChange::Delete { .. } => {
                    let _ = writeln!(out, "Would delete {}", path);
                }
                FileChange::Create { contents, .. } => {
                    let verb = if write { "Added new file" } else { "Would create" };
                    let _ = writeln!(out, "{} {}", verb, path);
                    let _ = writeln!(out, "{}", contents);
                }
                FileChange::Update { diff, .. } => {
                    let _ = writeln!(out, "Diff for {}", path);
                    let _ = writeln!(out, "{}", diff.trim_end());
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Closing line of a dry run.
    pub fn summary(&self) -> String {
        if self.changes.is_empty() {
            "All files up to date".to_string()
        } else {
            format!(
                "{} files need to be updated (use --write to apply the changes)",
                self.changes.len()
            )
        }
    }

    /// Apply the report below `root`, or below `output_dir` when given.
    ///
    /// Each file is replaced atomically. With an output directory the
    /// first component of every descriptor path is dropped, every
    /// reconciled document is written (changed or not), disabled
    /// descriptors are copied over verbatim and nothing is deleted.
    ///
    /// Returns the number of files changed.
    pub fn commit(&self, root: &Path, output_dir: Option<&Path>) -> Result<usize> {
        let target = |path: &Path| match output_dir {
            Some(dir) => dir.join(strip_first_component(path)),
            None => root.join(path),
        };

        let mut count = 0;
        for change in &self.changes {
            match change {
                FileChange::Create { path, contents } | FileChange::Update { path, contents, .. } => {
                    write_atomic(&target(path), contents)?;
                    count += 1;
                }
                FileChange::Delete { path } if output_dir.is_none() => {
                    let full = root.join(path);
                    fs::remove_file(&full)
                        .with_context(|| format!("failed to delete {}", full.display()))?;
                    count += 1;
                }
                FileChange::Delete { path } => {
                    tracing::info!("leaving {} in place (output directory mode)", path.display());
                }
            }
        }

        if output_dir.is_some() {
            for (path, contents) in &self.unchanged {
                write_atomic(&target(path), contents)?;
            }
            for path in &self.preserved {
                copy_file(&root.join(path), &target(path))?;
            }
        }
        Ok(count)
    }
}

/// Unified line diff between two texts, labelled with `path` on both
/// sides. Empty when the texts are equal.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string()
}
