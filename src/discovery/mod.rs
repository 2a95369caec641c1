//! Primitive discovery (C5, spec §4.3 "discovery" half).
//!
//! Walks a project's `.apm/` and `.github/` convention directories (and,
//! after resolution, the same conventions inside each dependency's install
//! directory) and feeds every file through [`crate::parser::parse_file`],
//! collecting the results into a [`PrimitiveCollection`]. Local files are
//! always discovered before any dependency's, and dependencies are walked
//! in the manifest's declared (install) order, so that
//! [`PrimitiveCollection::add`]'s "first one in wins" rule implements
//! Invariant I6 (local beats dependency; earlier dependency beats later)
//! without discovery itself needing any priority logic of its own.
//!
//! Grounded on the teacher's `core::resource::detect_resource_type` +
//! directory-walk pairing (`core/mod.rs`'s doc-commented architecture,
//! `skills::extract_skill_metadata`'s `walkdir` use), generalized from a
//! single resource type to the four-variant primitive model.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::{PrimitiveCollection, Source};
use crate::parser::{self, ParseWarning};

/// Directory and file names that discovery never descends into or reads as
/// primitives, regardless of source (spec §4.5.2's project-scan skip list
/// doubles as discovery's, since neither wants build output or VCS
/// internals treated as project content).
const SKIP_DIR_NAMES: &[&str] = &[".git", "node_modules", "__pycache__", "dist", "build", "target"];

/// Subfolders of `.github/` that carry GitHub Copilot's own primitive
/// conventions (spec §4.3: "`.apm/` and relevant `.github/` subfolders") —
/// instructions, chatmodes, and prompts, each named the same way the
/// parser (`parser::mod`) recognizes by file suffix.
const GITHUB_SUBFOLDERS: &[&str] = &["instructions", "chatmodes", "prompts"];

/// The set of directories discovery actually walks for a given base
/// directory: its `.apm/` convention folder plus the relevant `.github/`
/// subfolders. Neither needs to exist; a missing one is simply skipped by
/// [`discover_into`]'s own `root.is_dir()` guard.
fn discovery_roots(base: &Path) -> Vec<PathBuf> {
    let mut roots = vec![base.join(".apm")];
    roots.extend(GITHUB_SUBFOLDERS.iter().map(|sub| base.join(".github").join(sub)));
    roots
}

/// The result of discovering one source (local or a single dependency):
/// every primitive found, plus warnings for files that looked like
/// primitives but failed validation.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub warnings: Vec<ParseWarning>,
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    // The walk root itself is often a dot-prefixed convention directory
    // (`.apm`, `.github/instructions`) — only nested dot-directories
    // (`.git`, etc.) are meant to be pruned.
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or("");
    if entry.file_type().is_dir() {
        return SKIP_DIR_NAMES.contains(&name) || name.starts_with('.') && name != ".";
    }
    false
}

/// Walk `root`, parsing every file that looks like a primitive and adding
/// it to `collection` under `source`. Returns warnings for files that were
/// recognized-but-invalid; unrecognized files are silently skipped (not a
/// warning, since most files in a project tree aren't primitives at all).
pub fn discover_into(root: &Path, source: Source, collection: &mut PrimitiveCollection) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();
    if !root.is_dir() {
        return outcome;
    }

    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| !is_skipped(e));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => continue, // not a text file; not a primitive
        };
        match parser::parse_file(path, &content, source.clone()) {
            Ok(Some(primitive)) => {
                collection.add(primitive);
            }
            Ok(None) => {}
            Err(warning) => outcome.warnings.push(warning),
        }
    }

    outcome
}

/// Discover only the project's own (local) primitives, restricted to the
/// local `.apm/` and `.github/` conventions (spec §4.3).
pub fn discover_local(project_root: &Path) -> (PrimitiveCollection, Vec<ParseWarning>) {
    let mut collection = PrimitiveCollection::new();
    let mut warnings = Vec::new();
    for root in discovery_roots(project_root) {
        warnings.extend(discover_into(&root, Source::Local, &mut collection).warnings);
    }
    (collection, warnings)
}

/// Discover local primitives, then each dependency's, in `install_order`
/// (dependencies before their dependents, per spec §4.2) — though for
/// conflict priority what matters is manifest declaration order among
/// direct dependencies, which callers should pass as `dependency_dirs`
/// instead of the topological install order when the two differ. Each
/// directory (local and every dependency's) is restricted to its own
/// `.apm/` and relevant `.github/` subfolders (spec §4.3).
pub fn discover_with_dependencies(
    project_root: &Path,
    dependency_dirs: &[(String, PathBuf)],
) -> (PrimitiveCollection, Vec<ParseWarning>) {
    let mut collection = PrimitiveCollection::new();
    let mut warnings = Vec::new();

    for root in discovery_roots(project_root) {
        warnings.extend(discover_into(&root, Source::Local, &mut collection).warnings);
    }

    for (id, dir) in dependency_dirs {
        for root in discovery_roots(dir) {
            warnings.extend(discover_into(&root, Source::Dependency(id.clone()), &mut collection).warnings);
        }
    }

    (collection, warnings)
}

/// Discover a single virtual-file-package dependency: one specific file,
/// not a whole directory (spec §3.3's virtual file packages). The file is
/// parsed directly; a recognized-but-invalid file is surfaced as a
/// warning, an unrecognized one produces no primitive at all.
pub fn discover_virtual_file(
    file_path: &Path,
    source: Source,
    collection: &mut PrimitiveCollection,
) -> Option<ParseWarning> {
    let content = std::fs::read_to_string(file_path).ok()?;
    match parser::parse_file(file_path, &content, source) {
        Ok(Some(primitive)) => {
            collection.add(primitive);
            None
        }
        Ok(None) => None,
        Err(warning) => Some(warning),
    }
}
