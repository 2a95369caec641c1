//! The Primitive Parser (C2, spec §4.3).
//!
//! Parses frontmatter + body from a markdown file and emits a typed
//! [`Primitive`] based on the filename. Invalid files never abort the
//! caller: [`parse_file`] returns a [`ParseWarning`] instead of an error,
//! and discovery (C5) is responsible for collecting those and continuing.

pub mod frontmatter;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::primitive::{Primitive, PrimitiveCommon, Source};

/// A primitive file failed validation; the file is skipped, not fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Shared frontmatter fields common to every primitive variant.
#[derive(Debug, Default, Deserialize)]
struct CommonFrontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstructionFrontmatter {
    #[serde(flatten)]
    common: CommonFrontmatter,
    #[serde(rename = "applyTo")]
    apply_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SkillFrontmatter {
    #[serde(flatten)]
    common: CommonFrontmatter,
}

/// What kind of primitive a filename implies, or `None` if it is not a
/// recognized primitive file at all (discovery simply skips such files,
/// silently — they are not primitives, not invalid primitives).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Instruction,
    Context,
    Chatmode,
    Skill,
}

fn classify(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_str()?;
    if name == "SKILL.md" {
        Some(FileKind::Skill)
    } else if name.ends_with(".instructions.md") {
        Some(FileKind::Instruction)
    } else if name.ends_with(".context.md") || name.ends_with(".memory.md") {
        Some(FileKind::Context)
    } else if name.ends_with(".agent.md") || name.ends_with(".chatmode.md") {
        Some(FileKind::Chatmode)
    } else {
        None
    }
}

fn derive_name(path: &Path, kind: FileKind) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let suffix = match kind {
        FileKind::Instruction => ".instructions.md",
        FileKind::Context => {
            if file_name.ends_with(".memory.md") {
                ".memory.md"
            } else {
                ".context.md"
            }
        }
        FileKind::Chatmode => {
            if file_name.ends_with(".chatmode.md") {
                ".chatmode.md"
            } else {
                ".agent.md"
            }
        }
        FileKind::Skill => return "SKILL".to_string(),
    };
    file_name.strip_suffix(suffix).unwrap_or(file_name).to_string()
}

/// Parse a single file into a [`Primitive`], or a [`ParseWarning`] if it is
/// a recognized primitive filename whose content is invalid.
///
/// Returns `Ok(None)` if `path` is not a recognized primitive filename at
/// all (not an error condition — most files in a project tree aren't
/// primitives).
pub fn parse_file(
    path: &Path,
    content: &str,
    source: Source,
) -> Result<Option<Primitive>, ParseWarning> {
    let Some(kind) = classify(path) else {
        return Ok(None);
    };

    let fm = frontmatter::split(content);

    let primitive = match kind {
        FileKind::Instruction => {
            let raw = fm.raw_yaml.ok_or_else(|| ParseWarning {
                path: path.to_path_buf(),
                reason: "instruction file missing required frontmatter".to_string(),
            })?;
            let parsed: InstructionFrontmatter = serde_yaml::from_str(&raw).map_err(|e| ParseWarning {
                path: path.to_path_buf(),
                reason: format!("invalid frontmatter: {e}"),
            })?;
            let apply_to = parsed.apply_to.ok_or_else(|| ParseWarning {
                path: path.to_path_buf(),
                reason: "instruction file missing required 'applyTo' field".to_string(),
            })?;
            Primitive::Instruction {
                common: common_from(path, kind, &fm.body, parsed.common, source),
                apply_to,
            }
        }
        FileKind::Context => {
            let common = match fm.raw_yaml {
                Some(raw) => {
                    let parsed: CommonFrontmatter = serde_yaml::from_str(&raw).map_err(|e| ParseWarning {
                        path: path.to_path_buf(),
                        reason: format!("invalid frontmatter: {e}"),
                    })?;
                    parsed
                }
                None => CommonFrontmatter::default(),
            };
            Primitive::Context { common: common_from(path, kind, &fm.body, common, source) }
        }
        FileKind::Chatmode => {
            let common = match fm.raw_yaml {
                Some(raw) => serde_yaml::from_str(&raw).map_err(|e| ParseWarning {
                    path: path.to_path_buf(),
                    reason: format!("invalid frontmatter: {e}"),
                })?,
                None => CommonFrontmatter::default(),
            };
            Primitive::Chatmode { common: common_from(path, kind, &fm.body, common, source) }
        }
        FileKind::Skill => {
            let raw = fm.raw_yaml.ok_or_else(|| ParseWarning {
                path: path.to_path_buf(),
                reason: "SKILL.md missing required frontmatter".to_string(),
            })?;
            let parsed: SkillFrontmatter = serde_yaml::from_str(&raw).map_err(|e| ParseWarning {
                path: path.to_path_buf(),
                reason: format!("invalid frontmatter: {e}"),
            })?;
            if parsed.common.name.is_none() {
                return Err(ParseWarning {
                    path: path.to_path_buf(),
                    reason: "SKILL.md missing required 'name' field".to_string(),
                });
            }
            let sibling_files = sibling_files(path);
            Primitive::Skill {
                common: common_from(path, kind, &fm.body, parsed.common, source),
                sibling_files,
            }
        }
    };

    Ok(Some(primitive))
}

fn common_from(
    path: &Path,
    kind: FileKind,
    body: &str,
    fm: CommonFrontmatter,
    source: Source,
) -> PrimitiveCommon {
    let name = fm.name.unwrap_or_else(|| derive_name(path, kind));
    PrimitiveCommon {
        name,
        file_path: path.to_path_buf(),
        content: body.to_string(),
        source,
        description: fm.description,
        author: fm.author,
        version: fm.version,
    }
}

fn sibling_files(skill_md_path: &Path) -> Vec<PathBuf> {
    let Some(dir) = skill_md_path.parent() else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.file_name().and_then(|n| n.to_str()) != Some("SKILL.md"))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn non_primitive_filename_returns_none() {
        let result = parse_file(Path::new("README.md"), "# hi", Source::Local).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn instruction_requires_apply_to() {
        let content = "---\nname: py-style\n---\nUse type hints.\n";
        let err = parse_file(Path::new("py.instructions.md"), content, Source::Local).unwrap_err();
        assert!(err.reason.contains("applyTo"));
    }

    #[test]
    fn instruction_with_empty_apply_to_is_global() {
        let content = "---\napplyTo: \"\"\n---\nAlways true.\n";
        let primitive = parse_file(Path::new("global.instructions.md"), content, Source::Local)
            .unwrap()
            .unwrap();
        assert_eq!(primitive.apply_to(), "");
        assert_eq!(primitive.name(), "global");
    }

    #[test]
    fn instruction_parses_apply_to_and_name_override() {
        let content = "---\nname: py-style\napplyTo: \"*.py\"\ndescription: Use type hints\n---\nBody.\n";
        let primitive = parse_file(Path::new("src/py.instructions.md"), content, Source::Local)
            .unwrap()
            .unwrap();
        assert_eq!(primitive.name(), "py-style");
        assert_eq!(primitive.apply_to(), "*.py");
        assert_eq!(primitive.common().description.as_deref(), Some("Use type hints"));
    }

    #[test]
    fn context_file_without_frontmatter_is_valid() {
        let primitive = parse_file(Path::new("notes.context.md"), "# Notes\n", Source::Local)
            .unwrap()
            .unwrap();
        assert_eq!(primitive.name(), "notes");
    }

    #[test]
    fn memory_suffix_recognized_as_context() {
        let primitive = parse_file(Path::new("team.memory.md"), "content", Source::Local)
            .unwrap()
            .unwrap();
        assert_eq!(primitive.primitive_type(), crate::core::PrimitiveType::Context);
    }

    #[test]
    fn legacy_chatmode_suffix_recognized() {
        let primitive = parse_file(Path::new("reviewer.chatmode.md"), "persona", Source::Local)
            .unwrap()
            .unwrap();
        assert_eq!(primitive.primitive_type(), crate::core::PrimitiveType::Chatmode);
        assert_eq!(primitive.name(), "reviewer");
    }

    #[test]
    fn skill_requires_name_field() {
        let content = "---\ndescription: no name\n---\nBody\n";
        let err = parse_file(Path::new("SKILL.md"), content, Source::Local).unwrap_err();
        assert!(err.reason.contains("name"));
    }
}
