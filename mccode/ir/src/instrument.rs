use crate::{
    CodeBlock, ComponentInstance, GroupIdx, GroupInstance, InstIdx,
    InstrFormal,
};
use mccode_utils::{GPosIdx, GetName, Id, WithPos};

/// A `METADATA` entry of a definition, an instance or the instrument.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Metadatum {
    /// Name of the component type or instance carrying the entry.
    pub source: Id,
    pub name: String,
    pub mime: String,
    pub body: CodeBlock,
}

/// Root of a compilation.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct InstrumentDefinition {
    pub name: Id,
    pub source: String,
    pub formals: Vec<InstrFormal>,
    pub decls: CodeBlock,
    pub uservars: CodeBlock,
    pub inits: CodeBlock,
    pub saves: CodeBlock,
    pub finals: CodeBlock,
    /// Instances in declaration order; slot `i` holds index `i + 1`.
    pub instances: Vec<ComponentInstance>,
    pub groups: Vec<GroupInstance>,
    /// Extra flags needed to build the generated program.
    pub dependency: String,
    /// Number of instruments spliced in with `%include`.
    pub included: u32,
    pub metadata: Vec<Metadatum>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl InstrumentDefinition {
    pub fn get(&self, idx: InstIdx) -> &ComponentInstance {
        &self.instances[idx.slot()]
    }

    pub fn get_mut(&mut self, idx: InstIdx) -> &mut ComponentInstance {
        &mut self.instances[idx.slot()]
    }

    /// Instance named `name`. With duplicate names, the first one.
    pub fn find(&self, name: Id) -> Option<InstIdx> {
        self.instances
            .iter()
            .find(|inst| inst.name == name)
            .map(|inst| inst.index)
    }

    pub fn group(&self, idx: GroupIdx) -> &GroupInstance {
        &self.groups[idx.index()]
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Active instrument parameters.
    pub fn params(&self) -> impl Iterator<Item = &InstrFormal> {
        self.formals.iter().filter(|f| f.is_active())
    }

    pub fn has_param(&self, name: &str) -> bool {
        name != "NULL" && self.params().any(|f| f.name == name)
    }

    /// Append ` flags` to the dependency string unless already present.
    pub fn add_dependency(&mut self, flags: &str) {
        let flags = flags.trim();
        if flags.is_empty() || self.dependency.contains(flags) {
            return;
        }
        self.dependency.push(' ');
        self.dependency.push_str(flags);
    }

    /// Build with the funnel driver.
    pub fn require_funnel(&mut self) {
        self.add_dependency("-DFUNNEL");
    }
}

impl GetName for InstrumentDefinition {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for InstrumentDefinition {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::InstrumentDefinition;

    #[test]
    fn dependency_is_not_repeated() {
        let mut instr = InstrumentDefinition::default();
        instr.add_dependency("-lm");
        instr.add_dependency("-lm");
        instr.require_funnel();
        instr.require_funnel();
        assert_eq!(instr.dependency, " -lm -DFUNNEL");
    }
}
