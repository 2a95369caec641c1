//! Low-level frontmatter splitting, shared by every primitive variant's
//! parser.
//!
//! Grounded on the teacher's `---`-splitting approach
//! (`skills::validate_skill_frontmatter`), generalized to return the raw
//! YAML string and body separately instead of deserializing into one fixed
//! struct, since different primitive variants need different frontmatter
//! shapes.

/// A file split into its optional frontmatter block and body.
pub struct Frontmatter {
    /// Raw YAML between the `---` delimiters, `None` if the file has no
    /// frontmatter block at all.
    pub raw_yaml: Option<String>,
    /// Content after the closing `---` line (or the whole file, if there
    /// was no frontmatter).
    pub body: String,
}

/// Split `content` into frontmatter and body.
///
/// A file has frontmatter iff it begins with `---\n` (or `---\r\n`); the
/// block runs up to the next line that is exactly `---`. Anything else is
/// treated as having no frontmatter at all — the whole file becomes the
/// body, per spec §4.3 ("invalid files produce a warning and are skipped",
/// which callers implement by checking `raw_yaml.is_none()` against a
/// primitive type that requires it).
#[must_use]
pub fn split(content: &str) -> Frontmatter {
    let starts_with_marker = content.starts_with("---\n") || content.starts_with("---\r\n");
    if !starts_with_marker {
        return Frontmatter { raw_yaml: None, body: content.to_string() };
    }

    // Skip the opening "---" line, then find the next line that is "---".
    let after_marker = content.splitn(2, '\n').nth(1).unwrap_or("");
    let mut lines = after_marker.lines();
    let mut yaml_lines = Vec::new();
    let mut found_close = false;
    let mut consumed = 0usize;

    for line in after_marker.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        consumed += line.len();
        if trimmed == "---" {
            found_close = true;
            break;
        }
        yaml_lines.push(trimmed.to_string());
    }
    let _ = &mut lines; // iterated via split_inclusive above

    if !found_close {
        return Frontmatter { raw_yaml: None, body: content.to_string() };
    }

    let body = after_marker[consumed..].trim_start_matches(['\n', '\r']).to_string();
    Frontmatter { raw_yaml: Some(yaml_lines.join("\n")), body }
}
