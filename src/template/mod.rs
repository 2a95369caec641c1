//! The Template Builder (C8, spec §4.6).
//!
//! Groups instructions into conditional sections by their exact `apply_to`
//! pattern (instructions sharing a pattern share a section; a global
//! instruction — empty `apply_to` — belongs to an always-applied bucket),
//! then renders the `AGENTS.md`/`CLAUDE.md` scaffold a directory's
//! placement needs. Grounded on
//! `instructions_compiler::InstructionCompiler::merge_nodes`'s per-node
//! `<!-- scope:.. priority:.. -->` block convention, generalized here to
//! group-by-pattern sections instead of one block per node.

use crate::core::Primitive;

/// `__BUILD_ID__` is substituted by the distributed compiler (C9) with a
/// short hash identifying the compile run, so stale generated files are
/// easy to spot in a diff.
pub const BUILD_ID_PLACEHOLDER: &str = "__BUILD_ID__";

/// Stamped as the second line of every compiled output file. The
/// orphan-cleanup pass (C11, spec §4.9) refuses to delete a file it
/// doesn't find this exact marker on line 2 of, so a user's own
/// hand-written `AGENTS.md` is never mistaken for one APM generated.
pub const GENERATED_MARKER: &str = "<!-- Generated by APM CLI -->";

/// Version line stamped below the build-id marker; reported by the
/// caller rather than derived here, since the compiler knows its own
/// crate version.
fn version_comment(version: &str) -> String {
    format!("<!-- APM Version: {version} -->")
}

/// One group of instructions sharing an `apply_to` pattern.
#[derive(Debug, Clone)]
pub struct ConditionalSection {
    /// Empty string for the always-applied (global) section.
    pub apply_to: String,
    pub instruction_names: Vec<String>,
    pub bodies: Vec<String>,
}

/// Group `instructions` into sections by their exact `apply_to` string,
/// the global (empty-pattern) section sorted first, the rest sorted by
/// pattern and then by instruction name within a pattern (spec §4.6:
/// deterministic output ordering).
#[must_use]
pub fn build_conditional_sections(instructions: &[&Primitive]) -> Vec<ConditionalSection> {
    let mut sections: Vec<ConditionalSection> = Vec::new();

    for instruction in instructions {
        let apply_to = instruction.apply_to().to_string();
        let name = instruction.name().to_string();
        let body = instruction.common().content.clone();

        match sections.iter_mut().find(|s| s.apply_to == apply_to) {
            Some(section) => {
                section.instruction_names.push(name);
                section.bodies.push(body);
            }
            None => sections.push(ConditionalSection {
                apply_to,
                instruction_names: vec![name],
                bodies: vec![body],
            }),
        }
    }

    for section in &mut sections {
        let mut order: Vec<usize> = (0..section.instruction_names.len()).collect();
        order.sort_by(|&a, &b| section.instruction_names[a].cmp(&section.instruction_names[b]));
        section.instruction_names = order.iter().map(|&i| section.instruction_names[i].clone()).collect();
        section.bodies = order.iter().map(|&i| section.bodies[i].clone()).collect();
    }

    sections.sort_by(|a, b| match (a.apply_to.is_empty(), b.apply_to.is_empty()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.apply_to.cmp(&b.apply_to),
    });

    sections
}

/// Render one section as a markdown block: a heading naming the pattern
/// (or "Global" for the always-applied section), then each instruction's
/// body in name order, separated by a blank line.
#[must_use]
fn render_section(section: &ConditionalSection) -> String {
    let heading = if section.apply_to.is_empty() {
        "## Global".to_string()
    } else {
        format!("## Files matching `{}`", section.apply_to)
    };
    let mut out = format!("{heading}\n\n");
    for body in &section.bodies {
        out.push_str(body.trim_end());
        out.push_str("\n\n");
    }
    out.trim_end().to_string() + "\n"
}

/// Build the full `AGENTS.md` template for one directory's placement: the
/// fixed generated-file header, optional chatmode content, the
/// conditional sections in deterministic order, and a fixed footer.
/// `version` is the compiler's own crate version, stamped alongside the
/// build id so a stale generated file is identifiable at a glance.
#[must_use]
pub fn generate_agents_md_template(
    instructions: &[&Primitive],
    chatmode_content: Option<&str>,
    version: &str,
) -> String {
    let sections = build_conditional_sections(instructions);

    let mut out = String::new();
    out.push_str("# AGENTS.md\n");
    out.push_str(&format!("{GENERATED_MARKER}\n"));
    out.push_str(&format!("<!-- Build ID: {BUILD_ID_PLACEHOLDER} -->\n"));
    out.push_str(&format!("{}\n\n", version_comment(version)));

    if let Some(chatmode) = chatmode_content {
        out.push_str(chatmode.trim_end());
        out.push_str("\n\n");
    }

    for section in &sections {
        out.push_str(&render_section(section));
        out.push('\n');
    }

    out.push_str("---\n");
    out.push_str("*This file was generated by APM CLI. Do not edit manually.*\n");
    out.push_str("*To regenerate: `apm compile`*\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrimitiveCommon, Source};
    use std::path::PathBuf;

    fn instruction(name: &str, apply_to: &str, body: &str) -> Primitive {
        Primitive::Instruction {
            common: PrimitiveCommon {
                name: name.to_string(),
                file_path: PathBuf::from(format!("{name}.instructions.md")),
                content: body.to_string(),
                source: Source::Local,
                description: None,
                author: None,
                version: None,
            },
            apply_to: apply_to.to_string(),
        }
    }

    #[test]
    fn global_section_sorts_first() {
        let py = instruction("py-style", "*.py", "Use type hints.");
        let global = instruction("base", "", "Be concise.");
        let sections = build_conditional_sections(&[&py, &global]);
        assert_eq!(sections[0].apply_to, "");
        assert_eq!(sections[1].apply_to, "*.py");
    }

    #[test]
    fn instructions_sharing_a_pattern_group_into_one_section() {
        let a = instruction("a", "*.py", "rule a");
        let b = instruction("b", "*.py", "rule b");
        let sections = build_conditional_sections(&[&a, &b]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].instruction_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn sections_sorted_by_name_within_a_pattern_regardless_of_input_order() {
        let b = instruction("b", "*.py", "rule b");
        let a = instruction("a", "*.py", "rule a");
        let sections = build_conditional_sections(&[&b, &a]);
        assert_eq!(sections[0].instruction_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn template_carries_build_id_placeholder_and_heading() {
        let base = instruction("base", "", "Be concise.");
        let rendered = generate_agents_md_template(&[&base], None, "0.1.0");
        assert!(rendered.starts_with("# AGENTS.md"));
        assert!(rendered.contains(BUILD_ID_PLACEHOLDER));
        assert!(rendered.contains("## Global"));
        assert!(rendered.contains("*This file was generated by APM CLI. Do not edit manually.*"));
    }

    #[test]
    fn generated_marker_is_the_second_line() {
        let base = instruction("base", "", "Be concise.");
        let rendered = generate_agents_md_template(&[&base], None, "0.1.0");
        let second_line = rendered.lines().nth(1).unwrap();
        assert_eq!(second_line, GENERATED_MARKER);
    }

    #[test]
    fn chatmode_content_is_included_when_present() {
        let base = instruction("base", "", "Be concise.");
        let rendered = generate_agents_md_template(&[&base], Some("You are a pirate."), "0.1.0");
        assert!(rendered.contains("You are a pirate."));
    }

    #[test]
    fn section_heading_names_the_pattern() {
        let py = instruction("py-style", "*.py", "Use type hints.");
        let rendered = generate_agents_md_template(&[&py], None, "0.1.0");
        assert!(rendered.contains("## Files matching `*.py`"));
    }
}
