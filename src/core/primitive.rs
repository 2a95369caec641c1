//! The primitive model (spec §3.1).
//!
//! A primitive is a markdown file carrying structured metadata. APM
//! recognizes four variants, modeled here as a tagged sum rather than a
//! class hierarchy (Design Notes §9): each variant shares a common set of
//! fields (name, path, content, source) and carries variant-specific
//! payload (an instruction's `apply_to` glob, for instance).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a primitive was discovered from (Invariant I1: exactly one source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Declared in the project itself.
    Local,
    /// Pulled in transitively from an installed dependency, by canonical id.
    Dependency(String),
}

impl Source {
    /// Render as the `"local"` / `"dependency:<id>"` strings used in
    /// `Conflict` records and diagnostics.
    #[must_use]
    pub fn as_label(&self) -> String {
        match self {
            Self::Local => "local".to_string(),
            Self::Dependency(id) => format!("dependency:{id}"),
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// The discriminant used for bucket lookups in [`crate::core::PrimitiveCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveType {
    Instruction,
    Context,
    Chatmode,
    Skill,
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Instruction => "instruction",
            Self::Context => "context",
            Self::Chatmode => "chatmode",
            Self::Skill => "skill",
        };
        write!(f, "{s}")
    }
}

/// Fields shared by every primitive variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveCommon {
    pub name: String,
    pub file_path: PathBuf,
    pub content: String,
    pub source: Source,
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
}

/// A parsed primitive, tagged by variant (spec §3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// Scoped to files matching `apply_to` (empty ⇒ global).
    Instruction { common: PrimitiveCommon, apply_to: String },
    /// Free-form knowledge file (`.context.md` / `.memory.md`).
    Context { common: PrimitiveCommon },
    /// Persona body (`.agent.md` / legacy `.chatmode.md`); never placed by
    /// the optimizer.
    Chatmode { common: PrimitiveCommon },
    /// Directory-level meta-guide (`SKILL.md` + siblings); never placed by
    /// the optimizer, copied verbatim by the (out-of-scope) install layer.
    Skill { common: PrimitiveCommon, sibling_files: Vec<PathBuf> },
}

impl Primitive {
    #[must_use]
    pub fn common(&self) -> &PrimitiveCommon {
        match self {
            Self::Instruction { common, .. }
            | Self::Context { common }
            | Self::Chatmode { common }
            | Self::Skill { common, .. } => common,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.common().name
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.common().file_path
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        &self.common().source
    }

    #[must_use]
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Instruction { .. } => PrimitiveType::Instruction,
            Self::Context { .. } => PrimitiveType::Context,
            Self::Chatmode { .. } => PrimitiveType::Chatmode,
            Self::Skill { .. } => PrimitiveType::Skill,
        }
    }

    /// The glob pattern an instruction applies to, empty string for every
    /// other variant (they are never placed by the optimizer).
    #[must_use]
    pub fn apply_to(&self) -> &str {
        match self {
            Self::Instruction { apply_to, .. } => apply_to,
            _ => "",
        }
    }
}
