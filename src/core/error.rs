//! Error kinds for APM core operations.
//!
//! Per the propagation policy of spec §7, `ApmError` is used at the
//! boundaries of public operations whose *kind* of failure a caller is
//! expected to branch on (e.g. telling a bad dependency reference apart
//! from an I/O failure). Most internal helpers instead return
//! `anyhow::Result` and attach context with [`anyhow::Context`]; recoverable
//! conditions inside resolution, discovery, and compilation are collected
//! into `errors[]`/`warnings[]` fields on result structs rather than
//! propagated as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// The error kinds a caller of APM core may need to distinguish.
///
/// Each variant corresponds to one row of spec §7's error table. Variants
/// that are "never fatal" in the spec (conflicts, validation warnings,
/// broken links) still exist here because some code paths construct them
/// as values to embed in a result's `warnings`/`errors` list, even though
/// they are never returned as a top-level `Err` from a public operation.
#[derive(Debug, Error)]
pub enum ApmError {
    /// A dependency reference string could not be parsed (§4.1).
    #[error("invalid dependency reference {reference:?}: {reason}")]
    BadReference { reference: String, reason: String },

    /// A manifest (`apm.yml`) failed to parse.
    #[error("failed to parse manifest at {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// A dependency's install directory was not found and no
    /// `DownloadCallback` was available (or it returned `None`).
    #[error("package {id} is not installed and could not be downloaded")]
    MissingPackage { id: String },

    /// A cycle was detected while walking the dependency tree.
    #[error("circular dependency detected: {path}")]
    CircularDependency { path: String },

    /// Two primitives (or two dependency versions) of the same identity
    /// conflicted; recorded, never fatal.
    #[error("conflict for {name}: {winner} won over {losers:?}")]
    Conflict { name: String, winner: String, losers: Vec<String> },

    /// A primitive file failed validation and was skipped.
    #[error("invalid primitive at {path}: {reason}")]
    PrimitiveValidation { path: PathBuf, reason: String },

    /// A markdown link's target could not be located.
    #[error("broken link to {target:?} from {source}")]
    BrokenLink { source: PathBuf, target: String },

    /// Writing a compiled output file failed.
    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// The constitution file could not be read; treated as absent.
    #[error("failed to read constitution at {path}: {reason}")]
    ConstitutionRead { path: PathBuf, reason: String },

    /// Wrapped I/O error for ergonomic `?` propagation.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped YAML error for ergonomic `?` propagation.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// A lightweight severity used when sorting mixed warnings/errors for
/// display, per spec §7 ("the CLI shell sorts results by severity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}
