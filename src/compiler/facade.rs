//! The Compiler Facade (C11, spec §4.9).
//!
//! The single entry point a CLI command calls: dispatches on
//! [`CompileTarget`], merges the `AGENTS.md` and `CLAUDE.md` runs when
//! `target == All`, writes files to disk (or reports them, on a
//! dry-run), and removes generated files the current placement set no
//! longer wants (`clean_orphaned`). Grounded on the teacher's
//! `installer::cleanup::cleanup_removed_artifacts`/`cleanup_empty_dirs`
//! set-difference-then-remove shape, adapted from `tokio::fs` to
//! `std::fs` since this core has no async runtime (spec §5).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::compiler::distributed::{compile_distributed, CompileStats, DistributedCompileOutput, PlacementResult};
use crate::compiler::CompileTarget;
use crate::core::{ApmError, PrimitiveCollection};
use crate::template::GENERATED_MARKER;

/// Options controlling one facade-level compile run.
#[derive(Debug, Clone)]
pub struct CompileOptions<'a> {
    pub project_root: &'a Path,
    pub exclude_globs: &'a [String],
    pub dependency_ids: &'a [String],
    pub dependency_roots: &'a [(String, PathBuf)],
    pub chatmode: Option<&'a str>,
    pub constitution: Option<Result<&'a str, &'a ApmError>>,
    pub build_id: &'a str,
    pub version: &'a str,
    pub target: CompileTarget,
    /// If true, nothing is written or removed; `written`/`removed` report
    /// what would have happened.
    pub dry_run: bool,
    /// If true, delete previously generated files that the current
    /// placement set no longer covers.
    pub clean_orphaned: bool,
}

/// What one facade run did, merged across every target it dispatched to.
#[derive(Debug, Clone, Default)]
pub struct FacadeOutput {
    pub stats: CompileStats,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Paths written (or that would be written, on a dry-run).
    pub written: Vec<PathBuf>,
    /// Paths removed as orphans (or that would be removed, on a dry-run).
    pub removed: Vec<PathBuf>,
}

impl FacadeOutput {
    fn merge(mut self, other: DistributedCompileOutput) -> (Self, Vec<PlacementResult>) {
        self.stats.files_written += other.stats.files_written;
        self.stats.directories += other.stats.directories;
        self.stats.instructions_placed += other.stats.instructions_placed;
        self.warnings.extend(other.warnings);
        (self, other.placements)
    }
}

/// Run the facade: compile, then write or dry-run-report, then clean
/// orphans if asked.
#[instrument(skip(collection, options), fields(target = ?options.target, dry_run = options.dry_run))]
pub fn run(collection: &PrimitiveCollection, options: &CompileOptions<'_>) -> FacadeOutput {
    let mut output = FacadeOutput::default();
    let mut placements = Vec::new();

    let targets: &[CompileTarget] = match options.target {
        CompileTarget::All => &[CompileTarget::Agents, CompileTarget::Claude],
        single => {
            let result = compile_distributed(
                collection,
                options.project_root,
                options.exclude_globs,
                options.dependency_ids,
                options.dependency_roots,
                options.chatmode,
                options.constitution,
                options.build_id,
                options.version,
                single,
            );
            let (merged, mut placed) = output.merge(result);
            output = merged;
            placements.append(&mut placed);
            return finish(collection, options, output, placements);
        }
    };

    for &t in targets {
        let result = compile_distributed(
            collection,
            options.project_root,
            options.exclude_globs,
            options.dependency_ids,
            options.dependency_roots,
            options.chatmode,
            options.constitution,
            options.build_id,
            options.version,
            t,
        );
        let (merged, mut placed) = output.merge(result);
        output = merged;
        placements.append(&mut placed);
    }

    finish(collection, options, output, placements)
}

fn finish(
    collection: &PrimitiveCollection,
    options: &CompileOptions<'_>,
    mut output: FacadeOutput,
    placements: Vec<PlacementResult>,
) -> FacadeOutput {
    let _ = collection;
    let mut current_paths: HashSet<PathBuf> = HashSet::new();

    for placement in &placements {
        let path = options.project_root.join(&placement.directory).join(&placement.file_name);
        current_paths.insert(path.clone());

        if options.dry_run {
            output.written.push(path);
            continue;
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                output.errors.push(format!("failed to create {}: {e}", parent.display()));
                continue;
            }
        }
        match std::fs::write(&path, &placement.content) {
            Ok(()) => output.written.push(path),
            Err(e) => output.errors.push(
                ApmError::Write { path: path.clone(), reason: e.to_string() }.to_string(),
            ),
        }
    }

    if options.clean_orphaned {
        for orphan in find_orphans(options.project_root, options.target, &current_paths) {
            if options.dry_run {
                output.removed.push(orphan);
                continue;
            }
            match std::fs::remove_file(&orphan) {
                Ok(()) => {
                    info!(path = %orphan.display(), "removed orphaned generated file");
                    output.removed.push(orphan);
                }
                Err(e) => {
                    warn!(path = %orphan.display(), error = %e, "failed to remove orphaned file");
                    output.errors.push(format!("failed to remove {}: {e}", orphan.display()));
                }
            }
        }
    }

    info!(
        written = output.written.len(),
        removed = output.removed.len(),
        errors = output.errors.len(),
        "compile run finished"
    );

    output
}

/// Walk `root` for files named like one of `target`'s output filenames
/// that carry the generated-file marker on line 2 but aren't part of the
/// current placement set.
fn find_orphans(root: &Path, target: CompileTarget, current: &HashSet<PathBuf>) -> Vec<PathBuf> {
    let names = target.output_filenames();
    let mut orphans = Vec::new();

    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_str().unwrap_or("");
        if !names.contains(&file_name) {
            continue;
        }
        let path = entry.path().to_path_buf();
        if current.contains(&path) {
            continue;
        }
        if is_generated_file(&path) {
            orphans.push(path);
        }
    }

    orphans
}

/// A file is APM-generated iff its second line is exactly
/// [`GENERATED_MARKER`] — never inferred from extension alone (spec
/// §4.9, §6.3).
fn is_generated_file(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else { return false };
    content.lines().nth(1).is_some_and(|line| line == GENERATED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Primitive, PrimitiveCommon, PrimitiveCollection, Source};
    use std::fs;
    use tempfile::tempdir;

    fn instruction(name: &str, apply_to: &str, body: &str) -> Primitive {
        Primitive::Instruction {
            common: PrimitiveCommon {
                name: name.to_string(),
                file_path: PathBuf::from(format!("{name}.instructions.md")),
                content: body.to_string(),
                source: Source::Local,
                description: None,
                author: None,
                version: None,
            },
            apply_to: apply_to.to_string(),
        }
    }

    fn base_options(project_root: &Path) -> CompileOptions<'_> {
        CompileOptions {
            project_root,
            exclude_globs: &[],
            dependency_ids: &[],
            dependency_roots: &[],
            chatmode: None,
            constitution: None,
            build_id: "build1",
            version: "0.1.0",
            target: CompileTarget::Agents,
            dry_run: false,
            clean_orphaned: false,
        }
    }

    #[test]
    fn writes_agents_md_to_the_placement_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let options = base_options(dir.path());
        let output = run(&collection, &options);

        assert_eq!(output.written.len(), 1);
        assert!(output.written[0].exists());
        let content = fs::read_to_string(&output.written[0]).unwrap();
        assert!(content.contains("Use type hints."));
    }

    #[test]
    fn dry_run_never_touches_disk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let mut options = base_options(dir.path());
        options.dry_run = true;
        let output = run(&collection, &options);

        assert_eq!(output.written.len(), 1);
        assert!(!output.written[0].exists());
    }

    #[test]
    fn all_target_writes_both_agents_and_claude_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let mut options = base_options(dir.path());
        options.target = CompileTarget::All;
        let output = run(&collection, &options);

        let names: Vec<String> =
            output.written.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
        assert!(names.contains(&"AGENTS.md".to_string()));
        assert!(names.contains(&"CLAUDE.md".to_string()));
    }

    #[test]
    fn clean_orphaned_removes_stale_generated_files_outside_the_placement_set() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        fs::create_dir_all(dir.path().join("stale")).unwrap();
        fs::write(
            dir.path().join("stale/AGENTS.md"),
            format!("# AGENTS.md\n{GENERATED_MARKER}\nold content\n"),
        )
        .unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let mut options = base_options(dir.path());
        options.clean_orphaned = true;
        let output = run(&collection, &options);

        assert!(!dir.path().join("stale/AGENTS.md").exists());
        assert_eq!(output.removed.len(), 1);
    }

    #[test]
    fn clean_orphaned_never_removes_a_hand_written_file_missing_the_marker() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        fs::create_dir_all(dir.path().join("manual")).unwrap();
        fs::write(dir.path().join("manual/AGENTS.md"), "# My own notes\nhand-written\n").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let mut options = base_options(dir.path());
        options.clean_orphaned = true;
        let output = run(&collection, &options);

        assert!(dir.path().join("manual/AGENTS.md").exists());
        assert!(output.removed.is_empty());
    }
}
