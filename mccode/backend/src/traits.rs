use mccode_ir as ir;
use mccode_utils::{McResult, OutputFile};

/// A backend for the McCode compiler.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;
    /// Validate this instrument for emitting using this backend. Returns an
    /// Err(..) if the instrument has unexpected constructs.
    fn validate(prog: &ir::Context) -> McResult<()>;
    /// Write the support code the generated program depends on to `write`.
    fn link_externs(prog: &ir::Context, write: &mut OutputFile)
    -> McResult<()>;
    /// Transforms the instrument into a formatted string and writes it to
    /// `write`.
    fn emit(prog: &ir::Context, write: &mut OutputFile) -> McResult<()>;
    /// Convenience function to validate and emit the instrument.
    fn run(&self, prog: &ir::Context, mut file: OutputFile) -> McResult<()> {
        Self::validate(prog)?;
        Self::link_externs(prog, &mut file)?;
        Self::emit(prog, &mut file)
    }
}
