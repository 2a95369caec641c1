//! The Constitution Injector (C10, spec §4.8).
//!
//! If the project declares a "constitution" file (a project-wide
//! standards document meant to appear verbatim at the top of every
//! compiled output), this stamps a hash-addressed, idempotent block
//! containing it into each compiled file, right after the file's own
//! heading line. Grounded on the teacher's checksum convention
//! (`lockfile::checksum::LockFile::compute_checksum`'s `sha256:<hex>`
//! formatting) and on `instructions_compiler`'s `instruction_hash`
//! computation, combined into a content-addressed block so re-running
//! the compiler is a no-op when nothing changed (Invariant I10).

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::ApmError;

const BLOCK_START: &str = "<!-- SPEC-KIT CONSTITUTION: BEGIN -->";
const BLOCK_END: &str = "<!-- SPEC-KIT CONSTITUTION: END -->";
const CONSTITUTION_PATH: &str = ".specify/memory/constitution.md";

/// What happened when injecting the constitution block into one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStatus {
    /// No block existed; one was inserted.
    Created,
    /// A block existed and already carried the current hash.
    Unchanged,
    /// A block existed with a stale hash; its content was replaced.
    Updated,
    /// No constitution file is configured for this project.
    Missing,
    /// A constitution file is configured but could not be read; the
    /// compiled file is left untouched rather than injecting nothing.
    Skipped,
}

/// First 12 hex characters of the constitution's content hash — short
/// enough to keep the marker line readable, long enough that an
/// accidental collision within one project is not a practical concern.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn render_block(hash: &str, content: &str) -> String {
    format!("{BLOCK_START}\nhash: {hash} path: {CONSTITUTION_PATH}\n{}\n{BLOCK_END}\n", content.trim_end())
}

/// Find an existing constitution block in `compiled`, returning its byte
/// range and the hash recorded in its marker line, if any.
fn find_existing(compiled: &str) -> Option<(std::ops::Range<usize>, String)> {
    let start = compiled.find(BLOCK_START)?;
    let marker_line_start = start + BLOCK_START.len() + 1;
    let marker_line_end = compiled[marker_line_start..].find('\n').map(|i| marker_line_start + i)?;
    let marker_line = &compiled[marker_line_start..marker_line_end];
    let hash = marker_line.strip_prefix("hash: ")?.split(' ').next()?.to_string();
    let end_marker_pos = compiled[marker_line_end..].find(BLOCK_END)?;
    let block_end = marker_line_end + end_marker_pos + BLOCK_END.len();
    // Consume a single trailing newline after the end marker, if present.
    let block_end = if compiled[block_end..].starts_with('\n') { block_end + 1 } else { block_end };
    Some((start..block_end, hash))
}

/// Where, in `compiled`, the header ends and the block should be
/// inserted: right after the first blank line following the title (the
/// split point spec calls for), so the block always sits between a
/// file's header and its body rather than inside either.
fn header_insertion_point(compiled: &str) -> usize {
    match compiled.find("\n\n") {
        Some(idx) => idx + 2,
        None => compiled.len(),
    }
}

/// Inject (or refresh, or leave alone) the constitution block inside
/// `compiled`. `constitution` is `None` if the project has no
/// constitution configured, `Some(Err(_))` if one is configured but
/// unreadable, `Some(Ok(content))` otherwise.
#[must_use]
pub fn inject(
    compiled: &str,
    constitution: Option<Result<&str, &ApmError>>,
) -> (String, InjectionStatus) {
    let Some(result) = constitution else {
        return (compiled.to_string(), InjectionStatus::Missing);
    };
    let Ok(content) = result else {
        return (compiled.to_string(), InjectionStatus::Skipped);
    };

    let hash = content_hash(content);
    let block = render_block(&hash, content);

    match find_existing(compiled) {
        Some((_, existing_hash)) if existing_hash == hash => {
            (compiled.to_string(), InjectionStatus::Unchanged)
        }
        Some((range, _)) => {
            let mut out = String::with_capacity(compiled.len());
            out.push_str(&compiled[..range.start]);
            out.push_str(&block);
            out.push_str(&compiled[range.end..]);
            (out, InjectionStatus::Updated)
        }
        None => {
            let insert_at = header_insertion_point(compiled);
            let mut out = String::with_capacity(compiled.len() + block.len() + 1);
            out.push_str(&compiled[..insert_at]);
            out.push_str(&block);
            out.push('\n');
            out.push_str(&compiled[insert_at..]);
            (out, InjectionStatus::Created)
        }
    }
}

/// Read a constitution file from disk, returning an [`ApmError::ConstitutionRead`]
/// rather than propagating the I/O error, per the "never fatal, always
/// Skipped" policy (spec §7).
pub fn read_constitution(path: &Path) -> Result<String, ApmError> {
    std::fs::read_to_string(path).map_err(|e| ApmError::ConstitutionRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_constitution_configured_is_missing() {
        let (out, status) = inject("# Heading\n\nbody\n", None);
        assert_eq!(status, InjectionStatus::Missing);
        assert_eq!(out, "# Heading\n\nbody\n");
    }

    #[test]
    fn unreadable_constitution_is_skipped_and_leaves_file_untouched() {
        let err = ApmError::ConstitutionRead { path: "c.md".into(), reason: "denied".into() };
        let (out, status) = inject("# Heading\n\nbody\n", Some(Err(&err)));
        assert_eq!(status, InjectionStatus::Skipped);
        assert_eq!(out, "# Heading\n\nbody\n");
    }

    #[test]
    fn first_injection_creates_block_after_header() {
        let (out, status) = inject("# Heading\n\nbody\n", Some(Ok("Standards text.")));
        assert_eq!(status, InjectionStatus::Created);
        assert!(out.starts_with("# Heading\n"));
        assert!(out.contains(BLOCK_START));
        assert!(out.contains("Standards text."));
    }

    #[test]
    fn rerunning_with_same_constitution_is_unchanged() {
        let (first, _) = inject("# Heading\n\nbody\n", Some(Ok("Standards text.")));
        let (second, status) = inject(&first, Some(Ok("Standards text.")));
        assert_eq!(status, InjectionStatus::Unchanged);
        assert_eq!(first, second);
    }

    #[test]
    fn changed_constitution_content_updates_the_block() {
        let (first, _) = inject("# Heading\n\nbody\n", Some(Ok("Old text.")));
        let (second, status) = inject(&first, Some(Ok("New text.")));
        assert_eq!(status, InjectionStatus::Updated);
        assert!(second.contains("New text."));
        assert!(!second.contains("Old text."));
        assert!(second.contains("body"));
    }

    #[test]
    fn injection_is_idempotent_across_three_runs() {
        let (r1, _) = inject("# Heading\n\nbody\n", Some(Ok("Standards text.")));
        let (r2, _) = inject(&r1, Some(Ok("Standards text.")));
        let (r3, _) = inject(&r2, Some(Ok("Standards text.")));
        assert_eq!(r2, r3);
    }
}
