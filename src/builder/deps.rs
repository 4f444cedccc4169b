//! Native dependency lookup.
//!
//! Resolves a dependency name to the include directories it contributes,
//! following `requires` transitively. Entries come from the project's
//! `[dependencies]` tables first, then from pkg-config `.pc` files.
//!
//! Lookups are memoized. An entry is a pure function of its name, so two
//! threads racing to fill the same entry compute identical values and the
//! second insert is a no-op.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::project::{DependencyConfig, Project, ProjectError};
use crate::util::fs::{find_files_pruned, normalize_path};

/// Never searched for `.pc` files, along with hidden directories.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__"];

/// A resolved dependency (direct information only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub name: String,
    pub include_dirs: Vec<PathBuf>,
    pub requires: Vec<String>,
}

/// Memoizing name -> include paths lookup.
#[derive(Debug)]
pub struct DependencyCache {
    root: PathBuf,
    declared: BTreeMap<String, DependencyConfig>,
    pc_dirs: Vec<PathBuf>,
    entries: RwLock<HashMap<String, Option<Arc<DependencyEntry>>>>,
}

impl DependencyCache {
    /// Create a cache for a project.
    ///
    /// `search_paths` are extra `.pc` directories (relative ones are
    /// resolved against the project root). Directories containing `.pc`
    /// files under the project root are searched after them, skipping
    /// hidden directories and [`SKIPPED_DIRS`].
    pub fn new(project: &Project, search_paths: &[PathBuf]) -> Self {
        let root = project.root().to_path_buf();

        let mut pc_dirs: Vec<PathBuf> = search_paths
            .iter()
            .map(|p| normalize_path(&root.join(p)))
            .collect();

        for pc in find_files_pruned(&root, &["pc"], SKIPPED_DIRS) {
            if let Some(dir) = pc.parent() {
                let dir = dir.to_path_buf();
                if !pc_dirs.contains(&dir) {
                    pc_dirs.push(dir);
                }
            }
        }

        if !pc_dirs.is_empty() {
            tracing::debug!("pkg-config search path: {:?}", pc_dirs);
        }

        DependencyCache {
            root,
            declared: project.dependencies().clone(),
            pc_dirs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up one dependency (not following `requires`).
    pub fn get(&self, name: &str) -> Option<Arc<DependencyEntry>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(name) {
                return entry.clone();
            }
        }

        let computed = self.lookup(name).map(Arc::new);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(name.to_string())
            .or_insert(computed)
            .clone()
    }

    /// Include directories contributed by `name` and everything it
    /// requires, deduplicated in first-seen order.
    pub fn include_paths(&self, name: &str, required_by: &str) -> Result<Vec<PathBuf>, ProjectError> {
        let mut paths = Vec::new();
        let mut visited = HashSet::new();
        self.collect(name, required_by, &mut visited, &mut paths)?;
        Ok(paths)
    }

    fn collect(
        &self,
        name: &str,
        required_by: &str,
        visited: &mut HashSet<String>,
        paths: &mut Vec<PathBuf>,
    ) -> Result<(), ProjectError> {
        if !visited.insert(name.to_string()) {
            return Ok(());
        }

        let entry = self.get(name).ok_or_else(|| ProjectError::UnknownDependency {
            name: name.to_string(),
            required_by: required_by.to_string(),
        })?;

        for dir in &entry.include_dirs {
            if !paths.contains(dir) {
                paths.push(dir.clone());
            }
        }
        for dep in &entry.requires {
            self.collect(dep, name, visited, paths)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<DependencyEntry> {
        if let Some(config) = self.declared.get(name) {
            return Some(DependencyEntry {
                name: name.to_string(),
                include_dirs: config
                    .include_dirs
                    .iter()
                    .map(|p| normalize_path(&self.root.join(p)))
                    .collect(),
                requires: config.requires.clone(),
            });
        }

        for dir in &self.pc_dirs {
            let pc = dir.join(format!("{}.pc", name));
            if !pc.is_file() {
                continue;
            }
            match std::fs::read_to_string(&pc) {
                Ok(text) => {
                    tracing::debug!("resolved `{}` from {}", name, pc.display());
                    return Some(parse_pc(name, &text, dir));
                }
                Err(e) => tracing::warn!("failed to read {}: {}", pc.display(), e),
            }
        }

        None
    }
}

/// Parse the parts of a `.pc` file that matter for include lookup.
fn parse_pc(name: &str, text: &str, pc_dir: &Path) -> DependencyEntry {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("pcfiledir".to_string(), pc_dir.to_string_lossy().into_owned());

    let mut cflags = String::new();
    let mut requires = String::new();

    for line in text.lines() {
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let eq = line.find('=');
        let colon = line.find(':');
        match (eq, colon) {
            (Some(e), c) if c.map_or(true, |c| e < c) => {
                let key = line[..e].trim().to_string();
                let value = expand_vars(line[e + 1..].trim(), &vars);
                vars.insert(key, value);
            }
            (_, Some(c)) => {
                let key = line[..c].trim();
                let value = expand_vars(line[c + 1..].trim(), &vars);
                match key {
                    "Cflags" => cflags = value,
                    "Requires" => requires = value,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let mut include_dirs = Vec::new();
    let mut tokens = cflags.split_whitespace();
    while let Some(tok) = tokens.next() {
        let dir = match tok.strip_prefix("-I") {
            Some("") => tokens.next(),
            Some(rest) => Some(rest),
            None => None,
        };
        if let Some(dir) = dir {
            let path = normalize_path(&pc_dir.join(dir));
            if !include_dirs.contains(&path) {
                include_dirs.push(path);
            }
        }
    }

    DependencyEntry {
        name: name.to_string(),
        include_dirs,
        requires: parse_requires(&requires),
    }
}

/// Expand `${var}` references. Unknown variables expand to nothing.
fn expand_vars(value: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let var = &rest[start + 2..start + 2 + end];
                if let Some(v) = vars.get(var) {
                    out.push_str(v);
                }
                rest = &rest[start + 3 + end..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Package names from a `Requires:` value, version constraints dropped.
fn parse_requires(value: &str) -> Vec<String> {
    const OPS: [&str; 6] = ["=", "<", ">", "<=", ">=", "!="];

    let mut names = Vec::new();
    let mut skip_next = false;
    for tok in value.replace(',', " ").split_whitespace() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if OPS.contains(&tok) {
            skip_next = true;
            continue;
        }
        names.push(tok.to_string());
    }
    names
}
