//! The lockfile (`apm.lock`, spec §6.2).
//!
//! Records exactly what was resolved: every dependency's repo URL,
//! resolved commit, and install depth, so a second `apm install` against
//! the same lockfile reproduces the same tree without re-resolving.
//! Grounded on the teacher's `lockfile::LockFile` struct shape (a
//! top-level version field plus `#[serde(default, skip_serializing_if)]`
//! collections), adapted from TOML to YAML and from AGPM's per-resource-
//! type vectors to this crate's single `dependencies` map keyed by id.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::ApmError;
use crate::dependency::FlattenedDependencies;

/// The lockfile format version this crate writes and reads. Bumped only
/// on a breaking schema change.
pub const LOCKFILE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedDependency {
    pub repo_url: String,
    pub resolved_commit: String,
    pub resolved_ref: String,
    #[serde(default)]
    pub version: Option<String>,
    /// `1` for a direct (manifest-declared) dependency.
    pub depth: u32,
    /// The id of the dependency that pulled this one in transitively;
    /// absent for direct dependencies (spec §6.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub lockfile_version: String,
    pub generated_at: String,
    pub apm_version: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub dependencies: HashMap<String, LockedDependency>,
}

impl LockFile {
    /// Build a fresh lockfile from a resolved dependency tree.
    /// `repo_urls` supplies each id's `repo_url` (the resolver itself
    /// only tracks references, not the URL a `DownloadCallback` fetched
    /// them from); entries with no known URL are skipped rather than
    /// guessed at.
    #[must_use]
    pub fn from_resolution(
        flattened: &FlattenedDependencies,
        repo_urls: &HashMap<String, String>,
        generated_at: &str,
        apm_version: &str,
    ) -> Self {
        let mut dependencies = HashMap::new();

        for id in flattened.ids() {
            let node = flattened.get(id).expect("id came from this same flattened set");
            let Some(repo_url) = repo_urls.get(id) else { continue };
            let resolved_by = (node.depth > 1).then(|| parent_id_for(flattened, id)).flatten();

            dependencies.insert(
                id.to_string(),
                LockedDependency {
                    repo_url: repo_url.clone(),
                    resolved_commit: node.reference.git_ref.clone().unwrap_or_default(),
                    resolved_ref: node.reference.git_ref.clone().unwrap_or_else(|| "HEAD".to_string()),
                    version: node.version.clone(),
                    depth: node.depth,
                    resolved_by,
                },
            );
        }

        Self {
            lockfile_version: LOCKFILE_VERSION.to_string(),
            generated_at: generated_at.to_string(),
            apm_version: apm_version.to_string(),
            dependencies,
        }
    }

    #[must_use]
    pub fn to_yaml(&self) -> Result<String, ApmError> {
        serde_yaml::to_string(self)
            .map_err(|e| ApmError::Write { path: "apm.lock".into(), reason: e.to_string() })
    }

    pub fn write(&self, path: &Path) -> Result<(), ApmError> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|e| ApmError::Write { path: path.to_path_buf(), reason: e.to_string() })
    }

    pub fn load(path: &Path) -> Result<Self, ApmError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApmError::ManifestParse { path: path.to_path_buf(), reason: e.to_string() })?;
        serde_yaml::from_str(&content)
            .map_err(|e| ApmError::ManifestParse { path: path.to_path_buf(), reason: e.to_string() })
    }
}

/// Find the id whose children include `id`, used to populate
/// `resolved_by` for a transitive dependency. Flattened entries don't
/// carry a parent pointer themselves (only depth), so this walks every
/// node's children once — cheap, since it runs once per lockfile write,
/// not per lookup.
fn parent_id_for(flattened: &FlattenedDependencies, id: &str) -> Option<String> {
    flattened.ids().find_map(|parent_id| {
        let node = flattened.get(parent_id)?;
        node.children.iter().any(|c| c.id == id).then(|| parent_id.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{resolve, DependencyReference, DependencySpec, PackageSource};
    use crate::core::ApmError as CoreApmError;

    struct FlatSource;
    impl PackageSource for FlatSource {
        fn dependencies_of(&mut self, _reference: &DependencyReference) -> Result<Vec<DependencySpec>, CoreApmError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn builds_lockfile_from_a_flat_resolution() {
        let reference = DependencyReference::parse("owner/repo").unwrap();
        let root = DependencySpec { reference, version: None };
        let result = resolve(vec![root], &mut FlatSource, 10).unwrap();

        let mut urls = HashMap::new();
        urls.insert("owner/repo".to_string(), "https://github.com/owner/repo.git".to_string());

        let lockfile = LockFile::from_resolution(&result.flattened, &urls, "2026-07-27T00:00:00Z", "0.1.0");
        assert_eq!(lockfile.lockfile_version, LOCKFILE_VERSION);
        assert_eq!(lockfile.dependencies["owner/repo"].depth, 1);
        assert!(lockfile.dependencies["owner/repo"].resolved_by.is_none());
    }

    #[test]
    fn round_trips_through_yaml() {
        let reference = DependencyReference::parse("owner/repo").unwrap();
        let root = DependencySpec { reference, version: None };
        let result = resolve(vec![root], &mut FlatSource, 10).unwrap();
        let mut urls = HashMap::new();
        urls.insert("owner/repo".to_string(), "https://github.com/owner/repo.git".to_string());
        let lockfile = LockFile::from_resolution(&result.flattened, &urls, "2026-07-27T00:00:00Z", "0.1.0");

        let yaml = lockfile.to_yaml().unwrap();
        let parsed: LockFile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.dependencies["owner/repo"].repo_url, "https://github.com/owner/repo.git");
    }
}
