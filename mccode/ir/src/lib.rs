//! Semantic model of an instrument.
//!
//! [ast_to_ir] turns the syntax tree of an instrument file into a [Context]:
//! the [InstrumentDefinition] with its instances bound, placed and indexed,
//! and the table of every [ComponentDefinition] read on the way.
mod builder;
mod context;
mod definition;
mod exp;
mod formal;
mod instance;
mod instrument;

pub use builder::{ast_to_ir, Builder};
pub use context::{BackendConf, Context};
pub use definition::{ComponentDefinition, DefId, DefinitionTable};
pub use exp::{Coords, Exp};
pub use formal::{CompFormal, InstrFormal, ParamType};
pub use instance::{
    Bindings, ComponentInstance, GroupIdx, GroupInstance, InstIdx, JumpSpec,
    JumpTarget, Position,
};
pub use instrument::{InstrumentDefinition, Metadatum};
pub use mccode_frontend::CodeBlock;
pub use mccode_utils::{GetName, Id};
