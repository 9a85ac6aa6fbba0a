//! The compilation session. Owns everything built from the input and read
//! by the passes and the backend.
use crate::{ComponentDefinition, ComponentInstance, DefinitionTable, InstrumentDefinition};
use mccode_frontend::Workspace;

/// Configuration information for the backends.
#[derive(Debug, Default, Clone)]
pub struct BackendConf {
    /// Emit the per-instance trace hooks (`MC_TRACE_ENABLED`).
    pub trace: bool,
    /// Generate a program without platform specific code (`MC_PORTABLE`).
    pub portable: bool,
    /// Use the runtime's `main()`.
    pub default_main: bool,
    /// Copy the runtime sources into the output instead of `#include`ing
    /// them.
    pub embed_runtime: bool,
    /// Make the funnel driver the default one.
    pub funnel_default: bool,
    /// Name of the input file, as given on the command line.
    pub source_name: String,
}

/// An instrument with all of its component definitions resolved.
pub struct Context {
    pub instrument: InstrumentDefinition,
    /// Every definition read while building, used or not.
    pub definitions: DefinitionTable,
    /// Where files are looked up. The backend uses it for libraries and the
    /// runtime.
    pub workspace: Workspace,
    /// Configuration flags for backends.
    pub bc: BackendConf,
    /// Extra options provided to the command line.
    /// Interpreted by individual passes
    pub extra_opts: Vec<String>,
}

impl Context {
    /// Definition of the instance `inst`.
    pub fn def_of(&self, inst: &ComponentInstance) -> &ComponentDefinition {
        &self.definitions[inst.def]
    }

    /// Instances paired with their definitions, in declaration order.
    pub fn instances(
        &self,
    ) -> impl Iterator<Item = (&ComponentInstance, &ComponentDefinition)> {
        self.instrument
            .instances
            .iter()
            .map(|inst| (inst, &self.definitions[inst.def]))
    }
}
