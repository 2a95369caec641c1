//! The Context Optimizer (C7, spec §4.5).
//!
//! Decides, for each instruction primitive, which single directory its
//! body should be placed in so an editor walking up from any file's own
//! directory finds the instructions that apply to it without having to
//! read the whole project (spec §4.5.5's inheritance chain). Grounded in
//! shape (structured-logging style around a scored decision) on
//! `core::prompt_optimizer::PromptRefiner::optimize`'s `tracing::instrument`
//! usage; the scoring formula and thresholds themselves are the spec's own
//! (§4.5.2) and are preserved here as named constants rather than
//! rederived.

pub mod pattern;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::core::Primitive;

/// Directories never treated as part of the project surface to optimize
/// instruction placement over (spec §4.5.1).
const SKIP_DIR_NAMES: &[&str] = &[".git", "node_modules", "__pycache__", "dist", "build"];

/// Below this score, the match is narrow enough that one copy at the
/// common ancestor is as good as scattering copies (spec §4.5.2 table).
pub const SINGLE_POINT_MAX: f64 = 0.3;
/// At or above this score, the match is broad enough across the tree that
/// one root-level copy beats either alternative.
pub const DISTRIBUTED_MIN: f64 = 0.7;
/// Weight applied to normalized depth variance when computing the
/// diversity factor.
pub const DIVERSITY_FACTOR: f64 = 0.5;

/// How the optimizer decided to place one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Empty `apply_to`; always placed at the project root.
    Global,
    /// No file in the project matches; placed at the pattern's first
    /// literal segment if that names a real directory, else root.
    NoMatch,
    /// Score below [`SINGLE_POINT_MAX`]: one copy at the deepest common
    /// ancestor of every matching directory.
    SinglePoint,
    /// Score in `[SINGLE_POINT_MAX, DISTRIBUTED_MIN)`: same placement
    /// rule as `SinglePoint` (spec §4.5.2) — the distinction is
    /// diagnostic, reported so a verbose trace can explain *why* a
    /// mid-range match still resolved to one directory.
    SelectiveMulti,
    /// Score at or above [`DISTRIBUTED_MIN`]: the match is spread across
    /// enough of the tree that one root-level copy is cheaper than (and
    /// as correct as) chasing every matching directory individually.
    Distributed,
}

impl PlacementStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::NoMatch => "no_match",
            Self::SinglePoint => "single_point",
            Self::SelectiveMulti => "selective_multi",
            Self::Distributed => "distributed",
        }
    }
}

/// The optimizer's decision for a single instruction (spec §4.5.6).
#[derive(Debug, Clone)]
pub struct OptimizationDecision {
    pub instruction_name: String,
    pub apply_to: String,
    pub strategy: PlacementStrategy,
    /// `|M|`: the number of directories containing at least one matching
    /// file (0 for `Global`/`NoMatch`).
    pub matched_directories: usize,
    pub score: f64,
    /// The single directory this instruction's body is placed in.
    pub placement: PathBuf,
}

/// directory -> instruction names placed there, the structure the
/// template builder and compiler actually write out.
#[derive(Debug, Clone, Default)]
pub struct PlacementMap {
    pub by_directory: HashMap<PathBuf, Vec<String>>,
}

impl PlacementMap {
    fn place(&mut self, dir: PathBuf, instruction_name: &str) {
        let names = self.by_directory.entry(dir).or_default();
        if !names.iter().any(|n| n == instruction_name) {
            names.push(instruction_name.to_string());
        }
    }

    /// Every instruction whose placement covers `file_path`: placed
    /// directly in its directory, or in any ancestor directory (spec
    /// §4.5.5's inheritance chain).
    #[must_use]
    pub fn applicable_to(&self, file_path: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut dir = file_path.parent();
        while let Some(d) = dir {
            if let Some(here) = self.by_directory.get(d) {
                for n in here {
                    if !names.contains(n) {
                        names.push(n.clone());
                    }
                }
            }
            dir = if d.as_os_str().is_empty() { None } else { d.parent().or(Some(Path::new(""))) };
        }
        names
    }
}

/// Per-call scratch cache (spec §5): memoizes `(pattern, path)` matches
/// within one optimizer invocation, since distinct instructions often
/// share an `apply_to` pattern. Built fresh per call, dropped at the end
/// of it — this is the spec's `pattern_cache`.
#[derive(Default)]
struct PatternCache {
    matches: HashMap<(String, PathBuf), bool>,
}

impl PatternCache {
    fn matches(&mut self, pattern: &str, file: &Path) -> bool {
        let key = (pattern.to_string(), file.to_path_buf());
        if let Some(&cached) = self.matches.get(&key) {
            return cached;
        }
        let rel_str = file.to_string_lossy().replace('\\', "/");
        let result = pattern::matches(pattern, &rel_str);
        self.matches.insert(key, result);
        result
    }
}

/// Per-directory file counts, built once per call (spec's
/// `directory_cache`): every directory under the project root that
/// contains at least one direct (non-recursive) file, keyed by its path
/// relative to the root (`""` for the root itself).
#[derive(Default)]
struct DirectoryCache {
    file_counts: HashMap<PathBuf, usize>,
}

/// Walk `root`, returning every file's path relative to `root`, skipping
/// VCS/build directories, dot-prefixed directory segments, and anything
/// matching an operator-supplied exclude glob (spec §4.5.1).
#[must_use]
pub fn scan_project(root: &Path, exclude_globs: &[String]) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_str().unwrap_or("");
        if entry.file_type().is_dir() {
            if SKIP_DIR_NAMES.contains(&name) {
                return false;
            }
            if name.starts_with('.') && entry.depth() > 0 {
                return false;
            }
        }
        true
    });

    let mut files = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else { continue };
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if exclude_globs.iter().any(|g| pattern::matches(g, &rel_str)) {
            continue;
        }
        files.push(rel.to_path_buf());
    }
    files.sort();
    files
}

fn directory_cache_from(files: &[PathBuf]) -> DirectoryCache {
    let mut cache = DirectoryCache::default();
    for f in files {
        let dir = parent_of(f);
        *cache.file_counts.entry(dir).or_insert(0) += 1;
    }
    cache
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(PathBuf::from).unwrap_or_default()
}

fn depth_of(dir: &Path) -> usize {
    dir.components().count()
}

/// The pattern's first literal (non-wildcard) path segment, used by the
/// `NoMatch` placement rule to find an "intended directory" — the
/// directory a pattern like `src/**/*.py` is clearly *about* even when
/// nothing in the project currently matches it.
fn first_literal_segment(apply_to: &str) -> Option<&str> {
    apply_to.split('/').find(|seg| !seg.is_empty() && !seg.contains('*') && !seg.contains('?'))
}

/// Score and choose a placement for one instruction, given the full set
/// of project-relative file paths it could apply to.
#[instrument(skip(project_files, dir_cache, cache), fields(instruction = %instruction.name()))]
fn optimize_one(
    instruction: &Primitive,
    project_files: &[PathBuf],
    dir_cache: &DirectoryCache,
    cache: &mut PatternCache,
) -> OptimizationDecision {
    let apply_to = instruction.apply_to();

    if apply_to.is_empty() {
        return OptimizationDecision {
            instruction_name: instruction.name().to_string(),
            apply_to: apply_to.to_string(),
            strategy: PlacementStrategy::Global,
            matched_directories: 0,
            score: 0.0,
            placement: PathBuf::new(),
        };
    }

    let matched_files: Vec<&PathBuf> = project_files.iter().filter(|f| cache.matches(apply_to, f)).collect();

    let mut matched_dirs: Vec<PathBuf> = matched_files.iter().map(|f| parent_of(f)).collect();
    matched_dirs.sort();
    matched_dirs.dedup();

    if matched_dirs.is_empty() {
        let placement = match first_literal_segment(apply_to) {
            Some(seg) if dir_cache.file_counts.keys().any(|d| d.starts_with(seg)) => PathBuf::from(seg),
            _ => PathBuf::new(),
        };
        return OptimizationDecision {
            instruction_name: instruction.name().to_string(),
            apply_to: apply_to.to_string(),
            strategy: PlacementStrategy::NoMatch,
            matched_directories: 0,
            score: 0.0,
            placement,
        };
    }

    let total_non_empty_dirs = dir_cache.file_counts.len().max(1);
    let base_ratio = matched_dirs.len() as f64 / total_non_empty_dirs as f64;
    let diversity_factor = 1.0 + depth_variance(&matched_dirs) * DIVERSITY_FACTOR;
    let score = base_ratio * diversity_factor;

    let (strategy, placement) = if score < SINGLE_POINT_MAX {
        (PlacementStrategy::SinglePoint, common_ancestor(&matched_dirs))
    } else if score >= DISTRIBUTED_MIN {
        (PlacementStrategy::Distributed, PathBuf::new())
    } else {
        (PlacementStrategy::SelectiveMulti, common_ancestor(&matched_dirs))
    };

    debug!(score, strategy = strategy.as_str(), matched_dirs = matched_dirs.len(), "placement decided");

    OptimizationDecision {
        instruction_name: instruction.name().to_string(),
        apply_to: apply_to.to_string(),
        strategy,
        matched_directories: matched_dirs.len(),
        score,
        placement,
    }
}

/// Population variance of matched directories' depths, normalized into
/// roughly `[0, 1]` by dividing by the square of the deepest depth seen
/// (so one outlier deep directory doesn't dominate the diversity factor
/// for an otherwise shallow match set).
fn depth_variance(matched_dirs: &[PathBuf]) -> f64 {
    if matched_dirs.len() < 2 {
        return 0.0;
    }
    let depths: Vec<f64> = matched_dirs.iter().map(|d| depth_of(d) as f64).collect();
    let mean = depths.iter().sum::<f64>() / depths.len() as f64;
    let variance = depths.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / depths.len() as f64;
    let max_depth = depths.iter().cloned().fold(1.0_f64, f64::max);
    (variance / max_depth.powi(2)).min(1.0)
}

/// The deepest common ancestor directory of `dirs`. Falls back to the
/// project root when there is no shared prefix, or when `dirs` is empty.
fn common_ancestor(dirs: &[PathBuf]) -> PathBuf {
    let Some(first) = dirs.first() else { return PathBuf::new() };
    let mut common: Vec<_> = first.components().collect();
    for dir in &dirs[1..] {
        let other: Vec<_> = dir.components().collect();
        let shared = common.iter().zip(other.iter()).take_while(|(a, b)| a == b).count();
        common.truncate(shared);
    }
    common.into_iter().collect()
}

/// Run the optimizer over every instruction in `instructions` against the
/// project surface rooted at `project_root`.
#[must_use]
pub fn optimize(
    instructions: &[Primitive],
    project_root: &Path,
    exclude_globs: &[String],
) -> (PlacementMap, Vec<OptimizationDecision>) {
    let mut cache = PatternCache::default();
    let project_files = scan_project(project_root, exclude_globs);
    let dir_cache = directory_cache_from(&project_files);

    let mut map = PlacementMap::default();
    let mut decisions = Vec::with_capacity(instructions.len());

    for instruction in instructions {
        let decision = optimize_one(instruction, &project_files, &dir_cache, &mut cache);
        map.place(decision.placement.clone(), &decision.instruction_name);
        decisions.push(decision);
    }

    (map, decisions)
}

/// `total_context_load(w)` / `relevant_context_load(w)` / efficiency ratio
/// (spec §4.5.5): diagnostics over a placement map, never consulted for
/// placement decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InheritanceLoad {
    pub total: usize,
    pub relevant: usize,
}

impl InheritanceLoad {
    #[must_use]
    pub fn efficiency_ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.relevant as f64 / self.total as f64
        }
    }
}

/// Compute `w`'s inheritance load: every instruction placed anywhere in
/// `w`'s chain up to the project root counts toward `total`; those whose
/// pattern matches at least one file directly inside `w` count toward
/// `relevant`.
#[must_use]
pub fn inheritance_load(
    map: &PlacementMap,
    decisions: &[OptimizationDecision],
    working_dir: &Path,
    files_in_dir: &[PathBuf],
) -> InheritanceLoad {
    let applicable = map.applicable_to(&working_dir.join("_"));
    let total = applicable.len();
    let relevant = applicable
        .iter()
        .filter(|name| {
            decisions
                .iter()
                .find(|d| &d.instruction_name == *name)
                .map(|d| files_in_dir.iter().any(|f| pattern::matches(&d.apply_to, &f.to_string_lossy())))
                .unwrap_or(false)
        })
        .count();
    InheritanceLoad { total, relevant }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrimitiveCommon, Source};
    use std::fs;
    use tempfile::tempdir;

    fn instruction(name: &str, apply_to: &str) -> Primitive {
        Primitive::Instruction {
            common: PrimitiveCommon {
                name: name.to_string(),
                file_path: PathBuf::from(format!("{name}.instructions.md")),
                content: String::new(),
                source: Source::Local,
                description: None,
                author: None,
                version: None,
            },
            apply_to: apply_to.to_string(),
        }
    }

    fn make_project(files: &[&str]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for f in files {
            let path = dir.path().join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        dir
    }

    #[test]
    fn scan_skips_vcs_and_build_directories() {
        let dir = make_project(&["src/main.rs", ".git/HEAD", "node_modules/pkg/index.js"]);
        let files = scan_project(dir.path(), &[]);
        assert_eq!(files, vec![PathBuf::from("src/main.rs")]);
    }

    #[test]
    fn exclude_glob_removes_matching_files() {
        let dir = make_project(&["src/main.rs", "src/main_test.rs"]);
        let files = scan_project(dir.path(), &["**/*_test.rs".to_string()]);
        assert_eq!(files, vec![PathBuf::from("src/main.rs")]);
    }

    #[test]
    fn global_instruction_places_at_root() {
        let dir = make_project(&["src/a.rs"]);
        let files = scan_project(dir.path(), &[]);
        let dir_cache = directory_cache_from(&files);
        let mut cache = PatternCache::default();
        let decision = optimize_one(&instruction("base", ""), &files, &dir_cache, &mut cache);
        assert_eq!(decision.strategy, PlacementStrategy::Global);
        assert_eq!(decision.placement, PathBuf::new());
    }

    #[test]
    fn no_match_falls_back_to_intended_directory() {
        let dir = make_project(&["src/a.rs", "docs/readme.md"]);
        let files = scan_project(dir.path(), &[]);
        let dir_cache = directory_cache_from(&files);
        let mut cache = PatternCache::default();
        let decision = optimize_one(&instruction("go-style", "src/**/*.go"), &files, &dir_cache, &mut cache);
        assert_eq!(decision.strategy, PlacementStrategy::NoMatch);
        assert_eq!(decision.placement, PathBuf::from("src"));
    }

    #[test]
    fn no_match_with_no_existing_intended_directory_falls_back_to_root() {
        let dir = make_project(&["src/a.rs"]);
        let files = scan_project(dir.path(), &[]);
        let dir_cache = directory_cache_from(&files);
        let mut cache = PatternCache::default();
        let decision = optimize_one(&instruction("go-style", "missing/**/*.go"), &files, &dir_cache, &mut cache);
        assert_eq!(decision.placement, PathBuf::new());
    }

    #[test]
    fn sparse_match_uses_single_point_placement_at_common_ancestor() {
        let dir = make_project(&["src/a.py", "src/b.rs", "src/c.rs", "src/d.rs", "src/e.rs"]);
        let files = scan_project(dir.path(), &[]);
        let dir_cache = directory_cache_from(&files);
        let mut cache = PatternCache::default();
        let decision = optimize_one(&instruction("py-style", "**/*.py"), &files, &dir_cache, &mut cache);
        assert_eq!(decision.strategy, PlacementStrategy::SinglePoint);
        assert_eq!(decision.placement, PathBuf::from("src"));
    }

    #[test]
    fn broad_match_across_many_directories_is_distributed_to_root() {
        let files: Vec<String> = (0..10).map(|i| format!("pkg{i}/main.py")).collect();
        let refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let dir = make_project(&refs);
        let project_files = scan_project(dir.path(), &[]);
        let dir_cache = directory_cache_from(&project_files);
        let mut cache = PatternCache::default();
        let decision = optimize_one(&instruction("py-style", "**/*.py"), &project_files, &dir_cache, &mut cache);
        assert_eq!(decision.strategy, PlacementStrategy::Distributed);
        assert_eq!(decision.placement, PathBuf::new());
    }

    #[test]
    fn placement_map_applies_through_ancestor_directories() {
        let mut map = PlacementMap::default();
        map.place(PathBuf::from("src"), "py-style");
        let applicable = map.applicable_to(Path::new("src/nested/app.py"));
        assert_eq!(applicable, vec!["py-style".to_string()]);
    }

    #[test]
    fn every_matched_file_is_covered_by_its_strategys_placement() {
        let dir = make_project(&["a/x.py", "b/y.py", "c/z.py", "d/w.rs"]);
        let files = scan_project(dir.path(), &[]);
        let (map, decisions) = optimize(&[instruction("py-style", "**/*.py")], dir.path(), &[]);
        let decision = &decisions[0];
        for f in &files {
            if pattern::matches("**/*.py", &f.to_string_lossy()) {
                let applicable = map.applicable_to(f);
                match decision.strategy {
                    PlacementStrategy::Distributed => assert!(applicable.contains(&"py-style".to_string())),
                    _ => assert!(!applicable.is_empty(), "{f:?} must be covered"),
                }
            }
        }
    }
}
