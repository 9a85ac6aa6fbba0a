//! Shared utilities for the McCode compiler.
mod diagnostics;
mod errors;
mod id;
mod out_file;
mod pos_string;
mod position;

pub use diagnostics::DiagnosticContext;
pub use errors::{Error, ErrorKind, McResult, MultiError};
pub use id::{GSym, GetName, Id};
pub use out_file::OutputFile;
pub use pos_string::PosString;
pub use position::{
    FileIdx, GPosIdx, GlobalPositionTable, PosIdx, PositionTable, WithPos,
};
