//! Dependency resolution (C4, spec §4.2).
//!
//! Breadth-first traversal of the manifest's declared dependencies, each
//! expanded by asking a [`PackageSource`] for its own direct dependencies
//! in turn, stopping at `max_depth`. Cycle detection walks the current
//! BFS path (not the whole visited set — a diamond dependency is fine, a
//! package depending on its own ancestor is not). Grounded on the
//! teacher's "service-based" resolver (`resolver::mod`'s composition of a
//! `DependencyResolver` over small focused services) generalized into one
//! BFS loop, since APM's resolver doesn't need the teacher's separate
//! pattern-expansion/version-negotiation services.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::core::ApmError;
use crate::dependency::graph::{DependencyNode, DependencyTree, FlattenedDependencies};
use crate::dependency::reference::DependencyReference;
use crate::download::{DownloadCallback, MemoizedDownloader};

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Placeholder version recorded for a dependency whose install directory
/// is absent and could not be fetched by a [`DownloadCallback`] (spec
/// §4.2 step 3b).
pub const UNKNOWN_VERSION: &str = "unknown";

/// A single declared dependency entry, as read from a manifest (spec §6.1:
/// the `dependencies.apm` list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub reference: DependencyReference,
    pub version: Option<String>,
}

/// Supplies a package's own direct dependencies, given its reference.
/// Implementations are expected to ensure the package is available
/// locally first (via a [`crate::download::DownloadCallback`]) and then
/// read its manifest; resolution itself is agnostic to how that happens.
pub trait PackageSource {
    fn dependencies_of(&mut self, reference: &DependencyReference) -> Result<Vec<DependencySpec>, ApmError>;
}

/// The outcome of a full resolve: the literal tree (for diagnostics), the
/// deduplicated flattened view (for everything else), and non-fatal
/// problems encountered along the way.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub tree: DependencyTree,
    pub flattened: FlattenedDependencies,
    pub warnings: Vec<String>,
    /// One entry per cycle detected during traversal, each the `a -> b ->
    /// a` path that closed the loop (spec §4.2 step 3a, boundary
    /// behavior: a cycle halts descent at that node, it never aborts the
    /// whole resolve).
    pub circular_refs: Vec<String>,
}

struct QueueItem {
    spec: DependencySpec,
    depth: usize,
    parent: Option<usize>,
    /// Ids of every ancestor from the root down to (and including) this
    /// item, used for cycle detection.
    path: Vec<String>,
}

/// One resolved node as recorded in BFS visitation order, before the flat
/// list is reassembled into a [`DependencyTree`].
struct Visited {
    node: DependencyNode,
    parent: Option<usize>,
}

/// Resolve `roots` (a manifest's direct dependencies) against `source`,
/// stopping at `max_depth`. A cycle halts descent at the node that closes
/// the loop and is recorded in `circular_refs`; it never aborts the
/// resolve (spec §4.2 step 3a, spec §8 boundary behavior).
pub fn resolve(
    roots: Vec<DependencySpec>,
    source: &mut dyn PackageSource,
    max_depth: usize,
) -> Result<ResolutionResult, ApmError> {
    let mut warnings = Vec::new();
    let mut circular_refs = Vec::new();
    let mut edges: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    let mut visited: Vec<Visited> = Vec::new();

    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    for spec in roots {
        let id = spec.reference.id();
        queue.push_back(QueueItem { spec, depth: 1, parent: None, path: vec![id] });
    }

    while let Some(item) = queue.pop_front() {
        let id = item.spec.reference.id();
        let is_cycle = item.path[..item.path.len() - 1].contains(&id);

        let node = DependencyNode::leaf(
            id.clone(),
            item.spec.reference.clone(),
            item.spec.version.clone(),
            item.depth,
        );
        let self_index = visited.len();
        visited.push(Visited { node, parent: item.parent });

        if is_cycle {
            circular_refs.push(item.path.join(" -> "));
            continue;
        }

        if item.depth >= max_depth {
            warnings.push(format!("{id}: max dependency depth {max_depth} reached, not descending further"));
            continue;
        }

        match source.dependencies_of(&item.spec.reference) {
            Ok(children) => {
                let child_ids: Vec<String> = children.iter().map(|c| c.reference.id()).collect();
                edges.insert(id.clone(), child_ids);
                for child in children {
                    let mut child_path = item.path.clone();
                    child_path.push(child.reference.id());
                    queue.push_back(QueueItem {
                        spec: child,
                        depth: item.depth + 1,
                        parent: Some(self_index),
                        path: child_path,
                    });
                }
            }
            Err(ApmError::MissingPackage { id: missing }) => {
                // Spec §4.2 step 3b: absent and unfetchable becomes a
                // placeholder leaf, not a descent.
                visited[self_index].node.version = Some(UNKNOWN_VERSION.to_string());
                warnings.push(format!("{missing}: could not be fetched, treated as a leaf"));
            }
            Err(e) => return Err(e),
        }
    }

    let tree = reassemble(visited);
    let flattened = FlattenedDependencies::from_tree(&tree, &edges);
    Ok(ResolutionResult { tree, flattened, warnings, circular_refs })
}

/// Resolve starting from a project root directory (spec §4.2, the
/// top-level `resolve(root_dir) -> DependencyGraph` operation): loads
/// `apm.yml`, seeds the BFS with its declared dependencies in order, and
/// drives it with a [`FilesystemPackageSource`] that locates each
/// dependency under `apm_modules/`, optionally invoking `download` to
/// fetch one that isn't installed yet.
///
/// Step 1 of the spec ("if missing, return an empty graph whose root is a
/// placeholder") is realized as an empty, default [`ResolutionResult`]:
/// no roots, no warnings, nothing to flatten.
pub fn resolve_project(
    root_dir: &Path,
    download: Option<&mut dyn DownloadCallback>,
    max_depth: usize,
) -> Result<ResolutionResult, ApmError> {
    let manifest_path = root_dir.join("apm.yml");
    if !manifest_path.exists() {
        return Ok(ResolutionResult::default());
    }

    let manifest = crate::manifest::load(&manifest_path)?;
    let roots = manifest
        .dependencies
        .apm
        .iter()
        .map(|r| DependencyReference::parse(r).map(|reference| DependencySpec { reference, version: None }))
        .collect::<Result<Vec<_>, ApmError>>()?;

    let mut source = FilesystemPackageSource::new(root_dir, download);
    resolve(roots, &mut source, max_depth)
}

/// A [`PackageSource`] backed by the filesystem's `apm_modules/`
/// convention (spec §4.2 step 3b): locates
/// `apm_modules/<owner>/<repo>[/<subpath>]`, invoking an optional
/// [`DownloadCallback`] when that directory is absent, then reads the
/// found package's own `apm.yml` to discover its further dependencies.
pub struct FilesystemPackageSource<'a> {
    modules_dir: PathBuf,
    downloader: Option<MemoizedDownloader<'a>>,
}

impl<'a> FilesystemPackageSource<'a> {
    #[must_use]
    pub fn new(project_root: &Path, download: Option<&'a mut dyn DownloadCallback>) -> Self {
        let modules_dir = project_root.join("apm_modules");
        let downloader = download.map(|cb| MemoizedDownloader::new(cb, modules_dir.clone()));
        Self { modules_dir, downloader }
    }

    fn install_dir(&mut self, reference: &DependencyReference) -> Option<PathBuf> {
        let base = self.modules_dir.join(&reference.owner).join(&reference.repo);
        let candidate = match &reference.subpath {
            Some(sub) => base.join(sub),
            None => base,
        };
        if candidate.exists() {
            return Some(candidate);
        }
        self.downloader.as_mut().and_then(|d| d.get(reference))
    }
}

impl PackageSource for FilesystemPackageSource<'_> {
    fn dependencies_of(&mut self, reference: &DependencyReference) -> Result<Vec<DependencySpec>, ApmError> {
        let Some(install_dir) = self.install_dir(reference) else {
            return Err(ApmError::MissingPackage { id: reference.id() });
        };

        let manifest_path = install_dir.join("apm.yml");
        if !manifest_path.exists() {
            return Ok(Vec::new());
        }
        let manifest = crate::manifest::load(&manifest_path)?;
        manifest
            .dependencies
            .apm
            .iter()
            .map(|r| DependencyReference::parse(r).map(|reference| DependencySpec { reference, version: None }))
            .collect()
    }
}

/// Rebuild a [`DependencyTree`] from the flat BFS visitation list, using
/// each entry's recorded parent index. Children are attached in the order
/// they were visited, which for a single parent matches the order its
/// manifest declared them in.
fn reassemble(visited: Vec<Visited>) -> DependencyTree {
    let mut children_of: std::collections::HashMap<usize, Vec<DependencyNode>> =
        std::collections::HashMap::new();
    let mut roots = Vec::new();
    let parents: Vec<Option<usize>> = visited.iter().map(|v| v.parent).collect();

    // Attach children starting from the deepest BFS entries so that by the
    // time we build/materialize a parent, its child list is complete.
    let mut nodes: Vec<Option<DependencyNode>> = visited.into_iter().map(|v| Some(v.node)).collect();
    for idx in (0..nodes.len()).rev() {
        let mut node = nodes[idx].take().expect("each index visited exactly once");
        if let Some(kids) = children_of.remove(&idx) {
            node.children = kids;
        }
        match parents[idx] {
            Some(parent) => children_of.entry(parent).or_default().insert(0, node),
            None => roots.insert(0, node),
        }
    }

    DependencyTree { roots }
}
