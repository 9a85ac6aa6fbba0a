//! Helpers for traversing the instances of an instrument
mod action;
mod construct;
mod diagnostics;
mod visitor;

pub use action::{Action, VisResult};
pub use construct::{ConstructVisitor, Named, ParseVal, PassOpt};
pub use diagnostics::DiagnosticPass;
pub use mccode_utils::DiagnosticContext;
pub use visitor::Visitor;
