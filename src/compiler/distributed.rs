//! The Distributed Compiler (C9, spec §4.7).
//!
//! Ties the optimizer (C7), template builder (C8), and constitution
//! injector (C10) together: decide where each instruction goes, render
//! each resulting directory's output file(s), stamp the constitution
//! block into each, and report what would (or did) get written. Grounded
//! on `instructions_compiler::InstructionCompiler::compile`'s
//! load-merge-hash shape, generalized from one output file to one output
//! file per optimizer placement.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::compiler::constitution::{self, InjectionStatus};
use crate::compiler::{claude, CompileTarget};
use crate::core::{ApmError, Primitive, PrimitiveCollection};
use crate::linker::{self, FileRegistry};
use crate::optimizer::{self, OptimizationDecision};
use crate::template;

/// One rendered output file: where it goes, what it contains, and what
/// happened when the constitution was stamped into it.
#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub directory: PathBuf,
    pub file_name: String,
    pub content: String,
    pub injection_status: InjectionStatus,
}

/// Aggregate counts over a whole compile run, useful for a CLI summary
/// line without the caller re-deriving them from `placements`.
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub files_written: usize,
    pub directories: usize,
    pub instructions_placed: usize,
}

/// The full result of one distributed compile.
#[derive(Debug, Clone, Default)]
pub struct DistributedCompileOutput {
    pub placements: Vec<PlacementResult>,
    pub decisions: Vec<OptimizationDecision>,
    pub stats: CompileStats,
    pub warnings: Vec<String>,
}

/// Compile `collection`'s instructions into one or more output files per
/// optimizer placement. `constitution` is read once and stamped into
/// every rendered file. `dependency_ids`/`dependency_roots` describe
/// direct dependencies: the former feeds the `CLAUDE.md` renderer's
/// `# Dependencies` section, the latter lets the link resolver rewrite
/// cross-file links that point into an installed dependency into
/// `@apm_modules/<id>/...` imports (spec §4.7 step 2). `chatmode` is the
/// optional persona body included verbatim in every rendered `AGENTS.md`.
/// Nothing is written to disk here — see [`crate::compiler::facade`] for
/// the dry-run/write split.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn compile_distributed(
    collection: &PrimitiveCollection,
    project_root: &Path,
    exclude_globs: &[String],
    dependency_ids: &[String],
    dependency_roots: &[(String, PathBuf)],
    chatmode: Option<&str>,
    constitution: Option<Result<&str, &ApmError>>,
    build_id: &str,
    version: &str,
    target: CompileTarget,
) -> DistributedCompileOutput {
    let instructions: Vec<&Primitive> = collection.instructions().iter().collect();
    let owned_instructions: Vec<Primitive> = instructions.iter().map(|p| (*p).clone()).collect();
    let (map, decisions) = optimizer::optimize(&owned_instructions, project_root, exclude_globs);

    let mut registry = FileRegistry::new();
    for primitive in collection.all() {
        registry.insert(primitive.common().file_path.clone());
    }

    // `CLAUDE.md`'s `# Dependencies` section only names dependencies whose
    // install directory actually exists (spec §4.7): a declared-but-not-yet
    // installed dependency would otherwise point at a broken import.
    let installed_dependency_ids: Vec<String> = dependency_ids
        .iter()
        .filter(|id| dependency_roots.iter().any(|(root_id, root)| root_id == *id && root.is_dir()))
        .cloned()
        .collect();

    let mut placements = Vec::new();
    let mut warnings = Vec::new();

    let root = PathBuf::new();
    let mut directories: Vec<&PathBuf> = map.by_directory.keys().collect();
    directories.sort();

    // A project with no instructions at all still gets a single root
    // output file carrying just the constitution block, if one is
    // configured (spec §8 boundary behavior: "Project with only a
    // constitution: produces a single root output file").
    let empty_names = Vec::new();
    if directories.is_empty() && constitution.is_some() {
        directories.push(&root);
    }

    for dir in &directories {
        let names = map.by_directory.get(*dir).unwrap_or(&empty_names);
        let here: Vec<&Primitive> = instructions.iter().filter(|p| names.contains(&p.name().to_string())).copied().collect();
        let output_path = dir.join("AGENTS.md");

        for file_name in target.output_filenames() {
            let rendered = match file_name {
                "CLAUDE.md" => claude::render(&here, &installed_dependency_ids, build_id),
                _ => {
                    let body = template::generate_agents_md_template(&here, chatmode, version);
                    body.replace(template::BUILD_ID_PLACEHOLDER, build_id)
                }
            };
            let linked = linker::resolve_for_compilation(&rendered, &output_path, &registry, dependency_roots);
            let (content, status) = constitution::inject(&linked, constitution);
            if status == InjectionStatus::Skipped {
                warnings.push(format!("{}: constitution could not be read, left unstamped", dir.display()));
            }
            placements.push(PlacementResult {
                directory: (*dir).clone(),
                file_name: file_name.to_string(),
                content,
                injection_status: status,
            });
        }
    }

    let stats = CompileStats {
        files_written: placements.len(),
        directories: directories.len(),
        // One decision per instruction actually placed, regardless of how
        // many directories it matched (spec §4.7: a count of instructions,
        // not of instruction-directory pairings).
        instructions_placed: decisions.len(),
    };

    DistributedCompileOutput { placements, decisions, stats, warnings }
}

/// Every directory's placements, grouped for a caller that wants to write
/// (or dry-run-report) one directory at a time.
#[must_use]
pub fn group_by_directory(output: &DistributedCompileOutput) -> HashMap<&Path, Vec<&PlacementResult>> {
    let mut grouped: HashMap<&Path, Vec<&PlacementResult>> = HashMap::new();
    for placement in &output.placements {
        grouped.entry(placement.directory.as_path()).or_default().push(placement);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrimitiveCommon, PrimitiveCollection, Source};
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

    #[test]
    fn compiles_one_file_per_directory_placement() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        fs::write(dir.path().join("b.rs"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let output = compile_distributed(
            &collection,
            dir.path(),
            &[],
            &[],
            &[],
            None,
            None,
            "build1",
            "0.1.0",
            CompileTarget::Agents,
        );

        assert_eq!(output.placements.len(), 1);
        assert!(output.placements[0].content.contains("Use type hints."));
    }

    #[test]
    fn all_target_emits_both_agents_and_claude_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let output =
            compile_distributed(&collection, dir.path(), &[], &[], &[], None, None, "build1", "0.1.0", CompileTarget::All);
        let names: Vec<&str> = output.placements.iter().map(|p| p.file_name.as_str()).collect();
        assert!(names.contains(&"AGENTS.md"));
        assert!(names.contains(&"CLAUDE.md"));
    }

    #[test]
    fn instructions_placed_counts_instructions_not_directory_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        // Matches two directories (root and sub), but is still one
        // instruction.
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let output = compile_distributed(
            &collection,
            dir.path(),
            &[],
            &[],
            &[],
            None,
            None,
            "build1",
            "0.1.0",
            CompileTarget::Agents,
        );

        assert_eq!(output.stats.instructions_placed, 1);
    }

    #[test]
    fn dependencies_section_omits_ids_without_an_installed_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();
        let installed_root = dir.path().join("apm_modules/org/installed");
        fs::create_dir_all(&installed_root).unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let output = compile_distributed(
            &collection,
            dir.path(),
            &[],
            &["org/installed".to_string(), "org/missing".to_string()],
            &[("org/installed".to_string(), installed_root)],
            None,
            None,
            "build1",
            "0.1.0",
            CompileTarget::Claude,
        );

        let claude_md = &output.placements[0].content;
        assert!(claude_md.contains("org/installed"));
        assert!(!claude_md.contains("org/missing"));
    }

    #[test]
    fn constitution_is_stamped_into_every_placement() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x").unwrap();

        let mut collection = PrimitiveCollection::new();
        collection.add(instruction("py-style", "*.py", "Use type hints."));

        let output = compile_distributed(
            &collection,
            dir.path(),
            &[],
            &[],
            &[],
            None,
            Some(Ok("Org standards.")),
            "build1",
            "0.1.0",
            CompileTarget::Agents,
        );
        assert!(output.placements[0].content.contains("Org standards."));
        assert_eq!(output.placements[0].injection_status, InjectionStatus::Created);
    }
}
