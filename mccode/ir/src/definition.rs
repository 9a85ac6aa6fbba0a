use crate::{CodeBlock, CompFormal, Metadatum};
use mccode_utils::{GPosIdx, GetName, Id, WithPos};
use std::collections::HashMap;

/// Handle of a definition in a [DefinitionTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct DefId(u32);

impl DefId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A reusable component type.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ComponentDefinition {
    pub name: Id,
    /// File the definition was read from.
    pub source: String,
    pub def_par: Vec<CompFormal>,
    pub set_par: Vec<CompFormal>,
    pub out_par: Vec<CompFormal>,
    pub metadata: Vec<Metadatum>,
    pub share: CodeBlock,
    pub uservars: CodeBlock,
    pub declare: CodeBlock,
    pub initialize: CodeBlock,
    pub trace: CodeBlock,
    pub save: CodeBlock,
    pub finally: CodeBlock,
    pub display: CodeBlock,
    /// Cannot run on an accelerator.
    pub noacc: bool,
    pub dependency: Option<String>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl ComponentDefinition {
    /// A definition with no parameters and no code, used in place of one
    /// that could not be found.
    pub fn stand_in(name: Id, span: GPosIdx) -> Self {
        Self {
            name,
            span,
            ..Default::default()
        }
    }

    /// DEFINITION parameters followed by SETTING parameters.
    pub fn bound_params(&self) -> impl Iterator<Item = &CompFormal> {
        self.def_par.iter().chain(self.set_par.iter())
    }

    /// All parameter names, in every namespace.
    pub fn all_params(&self) -> impl Iterator<Item = &CompFormal> {
        self.bound_params().chain(self.out_par.iter())
    }

    pub fn has_param(&self, name: Id) -> bool {
        self.all_params().any(|f| f.name == name)
    }
}

impl GetName for ComponentDefinition {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for ComponentDefinition {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// Append-only table of component definitions. The first definition
/// registered under a name wins; later ones are ignored.
#[derive(Debug, Default)]
pub struct DefinitionTable {
    defs: Vec<ComponentDefinition>,
    by_name: HashMap<Id, DefId>,
}

impl DefinitionTable {
    /// Register `def` and return its handle. If a definition with the same
    /// name exists, that one is returned instead.
    pub fn add(&mut self, def: ComponentDefinition) -> DefId {
        if let Some(id) = self.by_name.get(&def.name) {
            log::debug!(
                "Definition of component `{}' already known, ignoring the one in {}",
                def.name,
                def.source
            );
            return *id;
        }
        let id = DefId(self.defs.len() as u32);
        self.by_name.insert(def.name, id);
        self.defs.push(def);
        id
    }

    pub fn find(&self, name: Id) -> Option<DefId> {
        self.by_name.get(&name).copied()
    }

    pub fn get(&self, id: DefId) -> &ComponentDefinition {
        &self.defs[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefId, &ComponentDefinition)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, def)| (DefId(i as u32), def))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl std::ops::Index<DefId> for DefinitionTable {
    type Output = ComponentDefinition;

    fn index(&self, id: DefId) -> &Self::Output {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_definition_wins() {
        let mut table = DefinitionTable::default();
        let a = table.add(ComponentDefinition {
            name: "Arm".into(),
            source: "first.comp".into(),
            ..Default::default()
        });
        let b = table.add(ComponentDefinition {
            name: "Arm".into(),
            source: "second.comp".into(),
            ..Default::default()
        });
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table[a].source, "first.comp");
        assert_eq!(table.find("Arm".into()), Some(a));
        assert_eq!(table.find("Slit".into()), None);
    }
}
