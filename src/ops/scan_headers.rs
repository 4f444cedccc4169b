//! Implementation of `wrapsync scan-headers`.
//!
//! Lists headers found in the modules' search paths that no module
//! declares yet, in a form that can be pasted into `Wrapsync.toml`.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;

use crate::builder::plan::search_paths;
use crate::core::project::Project;
use crate::ops::dependency_cache;
use crate::util::config::Config;
use crate::util::fs::{find_files_with_ext, normalize_path, relative_path, to_slash};

/// Headers under these paths are never reported.
const DEFAULT_IGNORES: [&str; 2] = ["*/trampolines/*", "trampolines/*"];

/// Options for the scan-headers command.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Report declared headers too
    pub all: bool,
    /// Print entries for `scan_headers_ignore` instead of header tables
    pub as_ignore: bool,
}

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Text to print
    pub output: String,
    /// Whether anything undeclared or missing was found
    pub has_difference: bool,
}

/// Scan every module's search paths for undeclared headers.
pub fn scan_headers(project: &Project, config: &Config, opts: &ScanOptions) -> Result<ScanReport> {
    let deps = dependency_cache(project, config);

    let mut ignores = Vec::new();
    for pattern in DEFAULT_IGNORES
        .iter()
        .copied()
        .chain(project.scan_headers_ignore().iter().map(String::as_str))
    {
        ignores.push(
            Pattern::new(pattern)
                .with_context(|| format!("invalid scan_headers_ignore pattern `{}`", pattern))?,
        );
    }

    let mut all_search_paths: Vec<PathBuf> = Vec::new();
    let mut present: HashSet<PathBuf> = HashSet::new();
    let mut missing: BTreeSet<String> = BTreeSet::new();

    for module in project.modules() {
        let paths = search_paths(project, module, &deps)?;

        if !opts.all {
            for header in &module.headers {
                let mut found = false;
                for dir in &paths {
                    let candidate = dir.join(&header.header);
                    if candidate.is_file() {
                        present.insert(normalize_path(&candidate));
                        found = true;
                    }
                }
                if !found {
                    missing.insert(to_slash(&header.header));
                }
            }
        }

        for path in paths {
            if !all_search_paths.contains(&path) {
                all_search_paths.push(path);
            }
        }
    }

    // Deepest directories first, so nested search paths claim their
    // headers before an enclosing one does.
    all_search_paths.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    let mut report = ScanReport::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let comment = if opts.as_ignore { "    #" } else { "#" };

    for dir in &all_search_paths {
        let mut files = Vec::new();
        for file in find_files_with_ext(dir, &["h", "hpp"]) {
            let file = normalize_path(&file);
            let rel = relative_path(dir, &file);
            let rel_slash = to_slash(&rel);

            if !seen.insert(file.clone()) || present.contains(&file) {
                continue;
            }
            if ignores.iter().any(|p| p.matches(&rel_slash)) {
                continue;
            }
            files.push(rel);
        }

        if files.is_empty() {
            continue;
        }
        report.has_difference = true;
        files.sort();
        tracing::debug!("{} undeclared header(s) in {}", files.len(), dir.display());
        write_group(&mut report.output, &files, comment, opts.as_ignore);
    }

    if !missing.is_empty() {
        report.has_difference = true;
        report.output.push('\n');
        for header in &missing {
            let _ = writeln!(report.output, "# missing: {}", header);
        }
    }

    Ok(report)
}

/// One search path's headers, with a comment line whenever the
/// subdirectory changes.
fn write_group(out: &mut String, files: &[PathBuf], comment: &str, as_ignore: bool) {
    let mut last_dir: Option<&Path> = None;
    for file in files {
        let dir = file.parent().unwrap_or(Path::new(""));
        if last_dir != Some(dir) {
            if last_dir.is_some() {
                out.push('\n');
            }
            if !dir.as_os_str().is_empty() {
                let _ = writeln!(out, "{} {}", comment, to_slash(dir));
            }
            last_dir = Some(dir);
        }

        let path = to_slash(file);
        if as_ignore {
            let _ = writeln!(out, "    \"{}\",", path);
        } else {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(out, "{} = \"{}\"", stem, path);
        }
    }
    out.push('\n');
}
