//! Path safety helpers shared across discovery, the linker, and the
//! compiler (spec §5: "the core... writes only to paths *within* the
//! project root"). Grounded on the teacher's
//! `utils::path_validation::validate_no_traversal`/`ensure_within_directory`
//! pair, adapted to this crate's `ApmError` rather than `anyhow`.

use std::path::{Component, Path, PathBuf};

use crate::core::ApmError;

/// Reject a path containing a `..` component. Used on every
/// manifest-supplied or dependency-supplied relative path before it is
/// joined onto a project root, so a malicious `apm.yml` or dependency
/// manifest can't write outside the project tree.
pub fn reject_traversal(path: &Path) -> Result<(), ApmError> {
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(ApmError::BadReference {
                reference: path.display().to_string(),
                reason: "path contains a parent directory reference (..)".to_string(),
            });
        }
    }
    Ok(())
}

/// Join `relative` onto `root`, rejecting the result if `relative`
/// contains a traversal component. Never touches the filesystem — this
/// is a pure path check, not a canonicalization (discovery may need to
/// validate a path before the file it names necessarily exists).
pub fn join_within(root: &Path, relative: &Path) -> Result<PathBuf, ApmError> {
    reject_traversal(relative)?;
    Ok(root.join(relative))
}

/// Is `candidate` equal to or nested under `ancestor`, purely lexically
/// (no filesystem access)? Used by the optimizer's common-ancestor
/// bookkeeping and the linker's dependency-root rewriting, both of which
/// operate on project-relative paths that may not exist on disk yet.
#[must_use]
pub fn is_within(candidate: &Path, ancestor: &Path) -> bool {
    candidate.starts_with(ancestor)
}
