use mccode_ir::{ComponentDefinition, DefId};
use std::collections::HashMap;

/// A code section of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Share,
    Declare,
    Initialize,
    Trace,
    Save,
    Finally,
    Display,
}

impl Section {
    /// Name of the section in the language.
    pub fn keyword(&self) -> &'static str {
        match self {
            Section::Share => "SHARE",
            Section::Declare => "DECLARE",
            Section::Initialize => "INITIALISE",
            Section::Trace => "TRACE",
            Section::Save => "SAVE",
            Section::Finally => "FINALLY",
            Section::Display => "DISPLAY",
        }
    }

    /// Suffix of the generated routines of the section.
    pub fn routine(&self) -> &'static str {
        match self {
            Section::Share => "share",
            Section::Declare => "declare",
            Section::Initialize => "init",
            Section::Trace => "trace",
            Section::Save => "save",
            Section::Finally => "finally",
            Section::Display => "display",
        }
    }

    pub fn code<'a>(&self, def: &'a ComponentDefinition) -> &'a mccode_ir::CodeBlock {
        match self {
            Section::Share => &def.share,
            Section::Declare => &def.declare,
            Section::Initialize => &def.initialize,
            Section::Trace => &def.trace,
            Section::Save => &def.save,
            Section::Finally => &def.finally,
            Section::Display => &def.display,
        }
    }
}

/// Remembers which per-type code has been generated, so that the code of a
/// component type is emitted once however many instances share it.
#[derive(Debug, Default)]
pub struct EmitCache {
    /// `true` once the routine exists in the output.
    seen: HashMap<(DefId, Section), bool>,
}

impl EmitCache {
    /// Returns `true` the first time it is called for `(def, section)`.
    pub fn claim(&mut self, def: DefId, section: Section) -> bool {
        if self.seen.contains_key(&(def, section)) {
            return false;
        }
        self.seen.insert((def, section), false);
        true
    }

    /// Record that the routine of `section` for `def` was written.
    pub fn define(&mut self, def: DefId, section: Section) {
        self.seen.insert((def, section), true);
    }

    /// Was a routine written for `section` of `def`?
    pub fn is_defined(&self, def: DefId, section: Section) -> bool {
        self.seen.get(&(def, section)).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mccode_ir::DefinitionTable;

    #[test]
    fn claims_are_per_section() {
        let mut table = DefinitionTable::default();
        let def = table.add(ComponentDefinition {
            name: "Arm".into(),
            ..Default::default()
        });
        let mut cache = EmitCache::default();
        assert!(cache.claim(def, Section::Trace));
        assert!(!cache.claim(def, Section::Trace));
        assert!(cache.claim(def, Section::Save));
        assert!(!cache.is_defined(def, Section::Trace));
        cache.define(def, Section::Trace);
        assert!(cache.is_defined(def, Section::Trace));
        assert!(!cache.is_defined(def, Section::Save));
    }
}
