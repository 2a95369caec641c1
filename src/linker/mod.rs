//! The Link Resolver (C6, spec §4.4).
//!
//! Markdown links inside primitive bodies are classified, then rewritten
//! differently depending on whether the output is a compiled context file
//! (links into dependencies become `@apm_modules/...` imports) or an
//! installed copy (links stay relative to the installed file). A fourth
//! operation inlines a target file's body in place of the link entirely,
//! used by the template builder when a section pulls in a small shared
//! snippet. No teacher analogue exists (AGPM installs files, it doesn't
//! rewrite cross-file references); grounded on the general
//! parse-classify-rewrite shape of `metadata::extractor::MetadataExtractor::extract`,
//! generalized from frontmatter fields to markdown link targets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::ApmError;

/// What a markdown link target is, once classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// `http://` or `https://` with a non-empty host — left as-is.
    /// `javascript:`, `data:`, `file:`, `ftp:`, `mailto:`, and malformed
    /// variants are non-external too, but aren't resolvable either, so
    /// they fall through to [`LinkKind::Unresolvable`].
    ExternalUrl,
    /// `#section-id` — an in-document anchor, left as-is.
    Anchor,
    /// A relative path ending in `.context.md` or `.memory.md` that
    /// resolves to a known file — subject to rewriting (spec §4.4).
    ContextLink(PathBuf),
    /// A relative path that resolves to a known file but isn't a context
    /// file — only eligible for single-file inlining, never rewritten by
    /// `resolve_for_compilation`/`resolve_for_installation` (spec §4.4).
    LocalLink(PathBuf),
    /// A relative path that does not resolve to anything discovery knows
    /// about (spec Invariant I8: preserved unresolved, never dropped).
    Unresolvable(String),
}

/// Suffixes that make a resolvable local link a context link rather than
/// an "other local link" (spec §4.4).
const CONTEXT_LINK_SUFFIXES: &[&str] = &[".context.md", ".memory.md"];

/// One markdown link found in a primitive body: its raw target text, byte
/// range within the body (for rewriting), and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub raw_target: String,
    pub display_text: String,
    pub kind: LinkKind,
}

const EXTERNAL_SCHEMES: &[&str] = &["http://", "https://"];

/// A registry mapping every filename discovery saw to its full path,
/// built once per compile/install operation (spec B.3) and reused across
/// every link in every primitive, rather than re-walking the filesystem
/// per link.
#[derive(Debug, Default, Clone)]
pub struct FileRegistry {
    by_filename: HashMap<String, Vec<PathBuf>>,
}

impl FileRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf) {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            self.by_filename.entry(name.to_string()).or_default().push(path);
        }
    }

    /// Resolve a relative link target against `from`, falling back to a
    /// filename lookup if the literal relative path doesn't exist (files
    /// get moved around during compilation, but their names are stable).
    #[must_use]
    pub fn resolve(&self, from: &Path, target: &str) -> Option<PathBuf> {
        let candidate = from.parent().unwrap_or_else(|| Path::new("")).join(target);
        if candidate.exists() {
            return Some(candidate);
        }
        let filename = Path::new(target).file_name()?.to_str()?;
        match self.by_filename.get(filename) {
            Some(paths) if paths.len() == 1 => Some(paths[0].clone()),
            _ => None,
        }
    }
}

/// Classify every markdown `[text](target)` link in `body`. Non-link
/// content is unaffected; this only extracts link occurrences.
#[must_use]
pub fn extract_links(body: &str, from: &Path, registry: &FileRegistry) -> Vec<Link> {
    let mut links = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some((text, target, advance)) = try_parse_link(&body[i..]) {
                links.push(Link { raw_target: target.clone(), display_text: text, kind: classify(&target, from, registry) });
                i += advance;
                continue;
            }
        }
        i += 1;
    }
    links
}

fn try_parse_link(s: &str) -> Option<(String, String, usize)> {
    let close_bracket = s.find(']')?;
    if !s[close_bracket..].starts_with("](") {
        return None;
    }
    let text = &s[1..close_bracket];
    let paren_start = close_bracket + 2;
    let rel = &s[paren_start..];
    let close_paren = rel.find(')')?;
    let target = &rel[..close_paren];
    let total = paren_start + close_paren + 1;
    Some((text.to_string(), target.to_string(), total))
}

fn classify(target: &str, from: &Path, registry: &FileRegistry) -> LinkKind {
    if EXTERNAL_SCHEMES.iter().any(|scheme| target.starts_with(scheme)) {
        return LinkKind::ExternalUrl;
    }
    if let Some(stripped) = target.strip_prefix('#') {
        let _ = stripped;
        return LinkKind::Anchor;
    }
    let path_part = target.split('#').next().unwrap_or(target);
    match registry.resolve(from, path_part) {
        Some(resolved) => {
            let is_context = CONTEXT_LINK_SUFFIXES
                .iter()
                .any(|suffix| resolved.to_string_lossy().ends_with(suffix));
            if is_context {
                LinkKind::ContextLink(resolved)
            } else {
                LinkKind::LocalLink(resolved)
            }
        }
        None => LinkKind::Unresolvable(target.to_string()),
    }
}

/// Rewrite `body`'s links for inclusion in a compiled context file.
/// Context links that point into a dependency become
/// `@apm_modules/<owner>/<repo>/<relative path>` imports (spec §4.4);
/// links into the local project keep their original relative text.
/// External links, anchors, and unresolvable links pass through unchanged
/// (Invariant I8).
#[must_use]
pub fn resolve_for_compilation(
    body: &str,
    from: &Path,
    registry: &FileRegistry,
    dependency_roots: &[(String, PathBuf)],
) -> String {
    rewrite(body, from, registry, |link| match &link.kind {
        LinkKind::ContextLink(resolved) => {
            for (id, root) in dependency_roots {
                if let Ok(rel) = resolved.strip_prefix(root) {
                    return Some(format!("@apm_modules/{id}/{}", rel.display()));
                }
            }
            None
        }
        _ => None,
    })
}

/// Rewrite `body`'s links for installation into `target_dir`: context
/// links are re-pointed to be relative to the installed file's new
/// location rather than its source location.
#[must_use]
pub fn resolve_for_installation(
    body: &str,
    from: &Path,
    target_dir: &Path,
    registry: &FileRegistry,
) -> String {
    rewrite(body, from, registry, |link| match &link.kind {
        LinkKind::ContextLink(resolved) => {
            let file_name = resolved.file_name()?;
            let new_target = target_dir.join(file_name);
            pathdiff(&new_target, from.parent().unwrap_or_else(|| Path::new("")))
        }
        _ => None,
    })
}

/// Express `target` as a relative path from `from_dir`, walking up with
/// `../` past any non-shared prefix components.
fn pathdiff(target: &Path, from_dir: &Path) -> Option<String> {
    let target_components: Vec<_> = target.components().collect();
    let from_components: Vec<_> = from_dir.components().collect();
    let shared = target_components
        .iter()
        .zip(from_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in shared..from_components.len() {
        parts.push("..".to_string());
    }
    for component in &target_components[shared..] {
        parts.push(component.as_os_str().to_string_lossy().to_string());
    }
    Some(parts.join("/"))
}

/// Replace each context link whose target resolves to a single-file
/// primitive with that file's body, stripping any frontmatter block from
/// the inlined content first. Used by the template builder for small
/// shared snippets that should read as part of the including file rather
/// than as a cross-reference.
#[must_use]
pub fn resolve_markdown_links_inline(body: &str, from: &Path, registry: &FileRegistry) -> String {
    rewrite_whole(body, from, registry, |link, resolved| {
        let content = std::fs::read_to_string(resolved).ok()?;
        let stripped = crate::parser::frontmatter::split(&content).body;
        Some(format!("**{}**:\n\n{}\n", link.display_text, stripped.trim_end()))
    })
}

fn rewrite(
    body: &str,
    from: &Path,
    registry: &FileRegistry,
    mut new_target: impl FnMut(&Link) -> Option<String>,
) -> String {
    let links = extract_links(body, from, registry);
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for link in &links {
        let needle = format!("[{}]({})", link.display_text, link.raw_target);
        if let Some(pos) = body[cursor..].find(&needle) {
            let abs_pos = cursor + pos;
            out.push_str(&body[cursor..abs_pos]);
            match new_target(link) {
                Some(new) => out.push_str(&format!("[{}]({})", link.display_text, new)),
                None => out.push_str(&needle),
            }
            cursor = abs_pos + needle.len();
        }
    }
    out.push_str(&body[cursor..]);
    out
}

fn rewrite_whole(
    body: &str,
    from: &Path,
    registry: &FileRegistry,
    mut replacement: impl FnMut(&Link, &Path) -> Option<String>,
) -> String {
    let links = extract_links(body, from, registry);
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for link in &links {
        let needle = format!("[{}]({})", link.display_text, link.raw_target);
        if let Some(pos) = body[cursor..].find(&needle) {
            let abs_pos = cursor + pos;
            out.push_str(&body[cursor..abs_pos]);
            let replaced = match &link.kind {
                LinkKind::ContextLink(resolved) | LinkKind::LocalLink(resolved) => replacement(link, resolved),
                _ => None,
            };
            match replaced {
                Some(new) => out.push_str(&new),
                None => out.push_str(&needle),
            }
            cursor = abs_pos + needle.len();
        }
    }
    out.push_str(&body[cursor..]);
    out
}

/// Check every context link in `body` resolves to a real file, returning
/// one [`ApmError::BrokenLink`] per unresolvable target.
#[must_use]
pub fn validate_link_targets(body: &str, from: &Path, registry: &FileRegistry) -> Vec<ApmError> {
    extract_links(body, from, registry)
        .into_iter()
        .filter_map(|link| match link.kind {
            LinkKind::Unresolvable(target) => Some(ApmError::BrokenLink { source: from.to_path_buf(), target }),
            _ => None,
        })
        .collect()
}
