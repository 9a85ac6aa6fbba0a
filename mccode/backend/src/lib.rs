//! Backends for the McCode compiler.
mod backend_opt;
mod c;
mod json;
mod traits;

pub use backend_opt::BackendOpt;
pub use c::{
    c_quote, CBackend, CodeVar, EmitCache, LibraryFiles, RuntimeEmbedder,
    Section, RUNTIME_HEADER, RUNTIME_TRAILER,
};
pub use json::JsonBackend;
pub use traits::Backend;
