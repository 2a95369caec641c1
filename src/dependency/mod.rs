//! Dependency reference parsing, the dependency graph model, and the
//! resolver (C3, C4 — spec §4.1, §4.2).

pub mod graph;
pub mod reference;
pub mod resolver;

pub use graph::{DependencyNode, DependencyTree, FlattenedDependencies, VersionConflict};
pub use reference::DependencyReference;
pub use resolver::{
    resolve, resolve_project, DependencySpec, FilesystemPackageSource, PackageSource,
    ResolutionResult, DEFAULT_MAX_DEPTH, UNKNOWN_VERSION,
};
