//! The project manifest (`apm.yml`, spec §6.1).
//!
//! A declarative YAML file naming the project, its compile target, and
//! its dependencies. Parsed tolerantly: unknown keys are ignored rather
//! than rejected, and a parse failure never aborts the resolver outright
//! — it instead yields a manifest whose name is the sentinel `"error"`
//! carrying the failure as a single error entry, so a caller can still
//! report *something* useful. Grounded on the teacher's
//! `manifest::Manifest` struct shape (serde derive, `#[serde(default)]`
//! on every optional section), adapted from TOML to YAML per this
//! system's own wire format.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::CompileTarget;
use crate::core::ApmError;

/// Sentinel name given to the fallback manifest returned when parsing
/// fails, so a caller can distinguish "no project here" from "a project
/// whose manifest doesn't parse" without matching on the error text.
pub const ERROR_MANIFEST_NAME: &str = "error";

/// One `dependencies.apm` entry: a bare reference string (spec §4.1),
/// parsed lazily by the dependency resolver rather than here.
pub type DependencyRef = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependenciesSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apm: Vec<DependencyRef>,
    /// MCP server dependencies; out of scope for this crate, but kept so
    /// round-tripping a manifest that declares them doesn't drop them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "default_min_instructions_per_file")]
    pub min_instructions_per_file: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self { min_instructions_per_file: default_min_instructions_per_file() }
    }
}

fn default_min_instructions_per_file() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationConfig {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub chatmode: Option<String>,
    #[serde(default = "default_true")]
    pub resolve_links: bool,
    #[serde(default)]
    pub source_attribution: bool,
    /// Legacy alias for `strategy: single-file`.
    #[serde(default)]
    pub single_file: bool,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub exclude: ExcludeGlobs,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            target: None,
            strategy: None,
            chatmode: None,
            resolve_links: true,
            source_attribution: false,
            single_file: false,
            placement: PlacementConfig::default(),
            exclude: ExcludeGlobs::default(),
        }
    }
}

fn default_output() -> String {
    "AGENTS.md".to_string()
}

fn default_true() -> bool {
    true
}

/// `exclude` accepts either a single glob string or a list of them (spec
/// §6.1); normalized here into a plain `Vec<String>` for every other
/// module to consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExcludeGlobs {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl ExcludeGlobs {
    #[must_use]
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Default compile target; `None` means the caller decides (spec §4.9
    /// treats a missing value the same as `all`).
    #[serde(default)]
    pub target: Option<String>,
    /// Out of scope for this crate (spec §6.1); kept only to avoid
    /// dropping fields on a round trip.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scripts: HashMap<String, String>,
    #[serde(default)]
    pub dependencies: DependenciesSection,
    #[serde(default)]
    pub compilation: CompilationConfig,
    /// Set only on the fallback manifest returned by [`parse`] when YAML
    /// parsing failed; `None` for every manifest actually loaded.
    #[serde(skip)]
    pub parse_error: Option<String>,
}

impl Manifest {
    /// The effective compile target: `compilation.target`, falling back
    /// to the top-level `target`, falling back to `all`.
    #[must_use]
    pub fn compile_target(&self) -> CompileTarget {
        let value = self.compilation.target.as_deref().or(self.target.as_deref()).unwrap_or("all");
        CompileTarget::parse(value)
    }

    #[must_use]
    pub fn is_error_fallback(&self) -> bool {
        self.name == ERROR_MANIFEST_NAME
    }

    fn error_fallback(reason: String) -> Self {
        Self {
            name: ERROR_MANIFEST_NAME.to_string(),
            version: String::new(),
            description: None,
            author: None,
            target: None,
            scripts: HashMap::new(),
            dependencies: DependenciesSection::default(),
            compilation: CompilationConfig::default(),
            parse_error: Some(reason),
        }
    }
}

/// Parse a manifest from its YAML text. Unknown keys are ignored by
/// `serde_yaml`'s default behavior; a structural parse failure (missing
/// `name`, invalid YAML) never propagates as an error — it is captured in
/// the returned manifest's `parse_error` field instead (spec §6.1: "Parse
/// errors on the manifest cause the resolver to return a graph whose root
/// package has `name="error"` and a single error entry").
#[must_use]
pub fn parse(content: &str) -> Manifest {
    match serde_yaml::from_str::<Manifest>(content) {
        Ok(manifest) => manifest,
        Err(e) => Manifest::error_fallback(e.to_string()),
    }
}

/// Read and parse a manifest from disk, reporting the I/O failure via
/// [`ApmError::ManifestParse`] rather than the tolerant fallback above —
/// a missing file is a different failure mode than malformed YAML.
pub fn load(path: &Path) -> Result<Manifest, ApmError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ApmError::ManifestParse { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(parse(&content))
}
