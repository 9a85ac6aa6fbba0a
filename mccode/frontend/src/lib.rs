//! Frontend parsing and AST representation.
//!
//! Defines the grammar of instrument and component files, the syntax tree
//! produced from them, and the [Workspace] used to find the files an
//! instrument refers to.
pub mod ast;
pub mod parser;
mod workspace;

pub use ast::CodeBlock;
pub use parser::McParser;
pub use workspace::Workspace;
