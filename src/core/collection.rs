//! `PrimitiveCollection` — the keyed container produced by discovery
//! (spec §3.2).

use std::collections::HashMap;

use super::primitive::{Primitive, PrimitiveType, Source};

/// A recorded conflict: two primitives of the same `(type, name)` were
/// discovered, and `winning_source` was kept per Invariant I6 (local beats
/// dependency; earlier-declared dependency beats later).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub primitive_type: PrimitiveType,
    pub name: String,
    pub winning_source: Source,
    pub losing_sources: Vec<Source>,
}

/// Four typed buckets (chatmodes, instructions, contexts, skills) plus a
/// list of conflicts, built by the discovery phase and consumed by the
/// optimizer and compiler (spec §3.6: it does not persist).
#[derive(Debug, Clone, Default)]
pub struct PrimitiveCollection {
    instructions: Vec<Primitive>,
    contexts: Vec<Primitive>,
    chatmodes: Vec<Primitive>,
    skills: Vec<Primitive>,
    /// `(type, name) -> index into the owning bucket`, used to implement
    /// "first one in wins" lookups without rescanning on every insert.
    index: HashMap<(PrimitiveType, String), usize>,
    conflicts: Vec<Conflict>,
}

impl PrimitiveCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, ty: PrimitiveType) -> &mut Vec<Primitive> {
        match ty {
            PrimitiveType::Instruction => &mut self.instructions,
            PrimitiveType::Context => &mut self.contexts,
            PrimitiveType::Chatmode => &mut self.chatmodes,
            PrimitiveType::Skill => &mut self.skills,
        }
    }

    #[must_use]
    pub fn bucket(&self, ty: PrimitiveType) -> &[Primitive] {
        match ty {
            PrimitiveType::Instruction => &self.instructions,
            PrimitiveType::Context => &self.contexts,
            PrimitiveType::Chatmode => &self.chatmodes,
            PrimitiveType::Skill => &self.skills,
        }
    }

    /// Add a primitive, applying the "existing wins" priority rule
    /// (Invariant I6). Returns `true` if the primitive was inserted,
    /// `false` if it lost a conflict and was dropped (with the conflict
    /// recorded).
    pub fn add(&mut self, primitive: Primitive) -> bool {
        let ty = primitive.primitive_type();
        let key = (ty, primitive.name().to_string());

        if let Some(&idx) = self.index.get(&key) {
            let existing_source = self.bucket(ty)[idx].source().clone();
            self.record_conflict(ty, primitive.name().to_string(), existing_source, primitive.source().clone());
            return false;
        }

        let bucket = self.bucket_mut(ty);
        let idx = bucket.len();
        bucket.push(primitive);
        self.index.insert(key, idx);
        true
    }

    fn record_conflict(&mut self, ty: PrimitiveType, name: String, winner: Source, loser: Source) {
        if let Some(existing) = self
            .conflicts
            .iter_mut()
            .find(|c| c.primitive_type == ty && c.name == name)
        {
            existing.losing_sources.push(loser);
        } else {
            self.conflicts.push(Conflict {
                primitive_type: ty,
                name,
                winning_source: winner,
                losing_sources: vec![loser],
            });
        }
    }

    #[must_use]
    pub fn instructions(&self) -> &[Primitive] {
        &self.instructions
    }

    #[must_use]
    pub fn contexts(&self) -> &[Primitive] {
        &self.contexts
    }

    #[must_use]
    pub fn chatmodes(&self) -> &[Primitive] {
        &self.chatmodes
    }

    #[must_use]
    pub fn skills(&self) -> &[Primitive] {
        &self.skills
    }

    /// Every primitive across all four buckets.
    pub fn all(&self) -> impl Iterator<Item = &Primitive> {
        self.instructions
            .iter()
            .chain(self.contexts.iter())
            .chain(self.chatmodes.iter())
            .chain(self.skills.iter())
    }

    /// Filter all primitives by source (local vs a specific dependency).
    pub fn by_source<'a>(&'a self, source: &'a Source) -> impl Iterator<Item = &'a Primitive> {
        self.all().filter(move |p| p.source() == source)
    }

    #[must_use]
    pub fn lookup(&self, ty: PrimitiveType, name: &str) -> Option<&Primitive> {
        self.index.get(&(ty, name.to_string())).map(|&idx| &self.bucket(ty)[idx])
    }

    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::primitive::PrimitiveCommon;
    use std::path::PathBuf;

    fn instr(name: &str, source: Source) -> Primitive {
        Primitive::Instruction {
            common: PrimitiveCommon {
                name: name.to_string(),
                file_path: PathBuf::from(format!("{name}.instructions.md")),
                content: "body".to_string(),
                source,
                description: None,
                author: None,
                version: None,
            },
            apply_to: String::new(),
        }
    }

    #[test]
    fn local_wins_over_dependency() {
        let mut c = PrimitiveCollection::new();
        assert!(c.add(instr("security", Source::Local)));
        assert!(!c.add(instr("security", Source::Dependency("org/a".into()))));
        assert_eq!(c.instructions().len(), 1);
        assert_eq!(c.conflicts().len(), 1);
        assert_eq!(c.conflicts()[0].winning_source, Source::Local);
    }

    #[test]
    fn earlier_declared_dependency_wins_over_later() {
        // S4: org/a declared before org/b, both define "security".
        let mut c = PrimitiveCollection::new();
        assert!(c.add(instr("security", Source::Dependency("org/a".into()))));
        assert!(!c.add(instr("security", Source::Dependency("org/b".into()))));
        let conflict = &c.conflicts()[0];
        assert_eq!(conflict.winning_source, Source::Dependency("org/a".into()));
        assert_eq!(conflict.losing_sources, vec![Source::Dependency("org/b".into())]);
    }

    #[test]
    fn distinct_names_never_conflict() {
        let mut c = PrimitiveCollection::new();
        assert!(c.add(instr("a", Source::Local)));
        assert!(c.add(instr("b", Source::Local)));
        assert!(c.conflicts().is_empty());
    }
}
