//! Dependency tree and graph data model (spec §3.3).
//!
//! `DependencyTree` is the shape produced by a single resolve: the literal
//! BFS tree with parent/child edges preserved, useful for diagnostics and
//! cycle reporting. `FlattenedDependencies` is the deduplicated view the
//! rest of the pipeline actually consumes (one entry per winning package,
//! plus an install order and the conflicts that were resolved getting
//! there). Grounded on `resolver::types::ResolutionContext`'s separation of
//! "what resolution saw" from "what it decided" — here expressed as two
//! distinct structs instead of one context object carrying both.

use std::collections::HashMap;

use crate::dependency::reference::DependencyReference;

/// One node of the resolved dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub id: String,
    pub reference: DependencyReference,
    pub version: Option<String>,
    pub depth: usize,
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    #[must_use]
    pub fn leaf(id: String, reference: DependencyReference, version: Option<String>, depth: usize) -> Self {
        Self { id, reference, version, depth, children: Vec::new() }
    }
}

/// The full resolved tree, rooted at the project itself (which has no
/// [`DependencyNode`] of its own — `roots` are its direct dependencies).
#[derive(Debug, Clone, Default)]
pub struct DependencyTree {
    pub roots: Vec<DependencyNode>,
}

impl DependencyTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit every node in the tree, including duplicates across branches
    /// (a package installed at two depths appears twice).
    pub fn walk(&self) -> impl Iterator<Item = &DependencyNode> {
        fn recurse<'a>(nodes: &'a [DependencyNode], out: &mut Vec<&'a DependencyNode>) {
            for n in nodes {
                out.push(n);
                recurse(&n.children, out);
            }
        }
        let mut out = Vec::new();
        recurse(&self.roots, &mut out);
        out.into_iter()
    }
}

/// A package that was seen at more than one place in the tree, with a
/// differing git ref (or, once a lockfile is consulted, a differing
/// resolved commit) (spec §4.2 step 5: first-seen / shallowest wins, the
/// rest recorded as losers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub id: String,
    pub winning_version: Option<String>,
    pub winning_depth: usize,
    pub losing_versions: Vec<(Option<String>, usize)>,
}

/// The deduplicated, install-ordered view of a resolved dependency tree
/// (spec §3.3, §4.2). This is what discovery (C5) and the lockfile writer
/// actually consume.
#[derive(Debug, Clone, Default)]
pub struct FlattenedDependencies {
    /// `id -> winning node`, in first-seen order for iteration determinism.
    entries: Vec<(String, DependencyNode)>,
    index: HashMap<String, usize>,
    pub conflicts: Vec<VersionConflict>,
    /// Topologically sorted ids, dependencies before dependents (spec
    /// §4.2: used to decide download/link order).
    pub install_order: Vec<String>,
}

impl FlattenedDependencies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DependencyNode> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    #[must_use]
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten a resolved tree: each package id keeps the shallowest node it
    /// was first seen at (first-seen at a given depth, since BFS already
    /// visits shallower depths first); later sightings at any depth are
    /// recorded as conflicts, never inserted.
    #[must_use]
    pub fn from_tree(tree: &DependencyTree, edges: &HashMap<String, Vec<String>>) -> Self {
        let mut flattened = Self::new();
        for node in tree.walk() {
            flattened.observe(node);
        }
        flattened.install_order = topo_sort(&flattened.entries, edges);
        flattened
    }

    fn observe(&mut self, node: &DependencyNode) {
        if let Some(&idx) = self.index.get(&node.id) {
            let (_, existing) = &self.entries[idx];
            if node.depth < existing.depth {
                // A shallower sighting supersedes; demote the prior winner
                // to a conflict loser and promote this one.
                let prior = std::mem::replace(&mut self.entries[idx].1, node.clone());
                self.record_conflict(&node.id, node, &prior);
            } else {
                self.record_conflict(&node.id, &self.entries[idx].1.clone(), node);
            }
            return;
        }
        let idx = self.entries.len();
        self.entries.push((node.id.clone(), node.clone()));
        self.index.insert(node.id.clone(), idx);
    }

    fn record_conflict(&mut self, id: &str, winner: &DependencyNode, loser: &DependencyNode) {
        // Spec §4.2 step 5: a later occurrence is a conflict only if its
        // git ref differs (or, once consulted, its lockfile-resolved
        // commit differs) — not if its manifest-declared `version` string
        // differs, which is usually absent entirely.
        if winner.reference.git_ref == loser.reference.git_ref {
            return;
        }
        if let Some(existing) = self.conflicts.iter_mut().find(|c| c.id == id) {
            existing.losing_sources_push(loser.version.clone(), loser.depth);
        } else {
            self.conflicts.push(VersionConflict {
                id: id.to_string(),
                winning_version: winner.version.clone(),
                winning_depth: winner.depth,
                losing_versions: vec![(loser.version.clone(), loser.depth)],
            });
        }
    }
}

impl VersionConflict {
    fn losing_sources_push(&mut self, version: Option<String>, depth: usize) {
        self.losing_versions.push((version, depth));
    }
}

/// Kahn's algorithm over the flattened entries, using `edges` (id -> the
/// ids it directly depends on) to order dependencies before dependents.
/// Ties broken by first-seen order, so the result is deterministic for a
/// given manifest.
fn topo_sort(entries: &[(String, DependencyNode)], edges: &HashMap<String, Vec<String>>) -> Vec<String> {
    let order_index: HashMap<&str, usize> =
        entries.iter().enumerate().map(|(i, (id, _))| (id.as_str(), i)).collect();

    let mut in_degree: HashMap<&str, usize> = entries.iter().map(|(id, _)| (id.as_str(), 0)).collect();
    for (id, _) in entries {
        if let Some(deps) = edges.get(id) {
            for dep in deps {
                if order_index.contains_key(dep.as_str()) {
                    *in_degree.get_mut(id.as_str()).unwrap() += 1;
                }
            }
        }
    }

    let mut ready: Vec<&str> = entries
        .iter()
        .map(|(id, _)| id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();
    ready.sort_by_key(|id| order_index[id]);

    let mut result = Vec::with_capacity(entries.len());
    let mut queue = std::collections::VecDeque::from(ready);
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, _) in entries {
        if let Some(deps) = edges.get(id) {
            for dep in deps {
                if order_index.contains_key(dep.as_str()) {
                    dependents.entry(dep.as_str()).or_default().push(id.as_str());
                }
            }
        }
    }

    while let Some(id) = queue.pop_front() {
        result.push(id.to_string());
        if let Some(next) = dependents.get(id) {
            let mut newly_ready = Vec::new();
            for &n in next {
                let deg = in_degree.get_mut(n).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(n);
                }
            }
            newly_ready.sort_by_key(|id| order_index[id]);
            for n in newly_ready {
                queue.push_back(n);
            }
        }
    }

    // A leftover cycle (should have been rejected earlier by the resolver)
    // falls back to first-seen order for the remainder rather than losing
    // entries silently.
    if result.len() < entries.len() {
        for (id, _) in entries {
            if !result.contains(id) {
                result.push(id.clone());
            }
        }
    }

    result
}
