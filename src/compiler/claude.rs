//! `CLAUDE.md` rendering (spec §4.7, §6.3).
//!
//! Its own "# Project Standards" heading and conditional-section body
//! (reusing the template builder's grouping logic, not its `AGENTS.md`
//! header/footer), plus a sorted `# Dependencies` section naming each
//! direct dependency's own compiled `CLAUDE.md`, so an agent reading one
//! file can follow imports down into installed packages. Chatmode bodies
//! are never included here — chatmodes are a persona a user selects
//! explicitly, not ambient context every file should carry. Grounded on
//! `instructions_compiler::CompileTarget::output_filename`'s per-target
//! naming and `merge_nodes`'s per-target header.

use crate::core::Primitive;
use crate::template::{self, GENERATED_MARKER};

/// Render a directory's `CLAUDE.md`: a "# Project Standards" header, the
/// conditional sections grouped by `apply_to`, and a sorted list of
/// `@apm_modules/<id>/CLAUDE.md` dependency imports.
#[must_use]
pub fn render(instructions: &[&Primitive], dependency_ids: &[String], build_id: &str) -> String {
    let sections = template::build_conditional_sections(instructions);

    let mut body = String::new();
    body.push_str("# Project Standards\n");
    body.push_str(&format!("{GENERATED_MARKER}\n"));
    body.push_str(&format!("<!-- Build ID: {build_id} -->\n\n"));

    for section in &sections {
        let heading = if section.apply_to.is_empty() {
            "## Global".to_string()
        } else {
            format!("## Files matching `{}`", section.apply_to)
        };
        body.push_str(&format!("{heading}\n\n"));
        for section_body in &section.bodies {
            body.push_str(section_body.trim_end());
            body.push_str("\n\n");
        }
    }

    if !dependency_ids.is_empty() {
        let mut sorted = dependency_ids.to_vec();
        sorted.sort();
        body.push_str("# Dependencies\n\n");
        for id in &sorted {
            body.push_str(&format!("- @apm_modules/{id}/CLAUDE.md\n"));
        }
    }

    body
}

#[must_use]
pub fn output_filename() -> &'static str {
    "CLAUDE.md"
}
