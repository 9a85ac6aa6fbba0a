//! C code generator.
//!
//! The generated program is laid out as
//! 1. the header: particle structure, particle accessors and the runtime
//!    library, copied in or `#include`d ([CBackend::link_externs]);
//! 2. the declarations, the INITIALISE routines, the component TRACE
//!    routines with the `raytrace` and `raytrace_all_funnel` drivers, the
//!    SAVE, FINALLY and DISPLAY routines and the lookup functions used by
//!    the runtime ([CBackend::emit]).
mod accessors;
mod cache;
mod decls;
mod funnel;
mod header;
mod raytrace;
mod runtime;
mod sections;
mod vars;
mod writer;

pub use cache::{EmitCache, Section};
pub use runtime::{LibraryFiles, RuntimeEmbedder, RUNTIME_HEADER, RUNTIME_TRAILER};
pub use vars::{codeblock_vars, CodeVar};
pub use writer::{c_quote, CWriter};

use crate::traits::Backend;
use itertools::Itertools;
use mccode_ir as ir;
use mccode_utils::{Error, McResult, OutputFile};
use std::io::Write;

/// Generates the C program of an instrument.
#[derive(Default)]
pub struct CBackend;

impl Backend for CBackend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn validate(ctx: &ir::Context) -> McResult<()> {
        let instr = &ctx.instrument;
        vars::warn_assignments(&instr.uservars, "USERVARS", instr.name.as_str(), "EXTEND");
        for id in instr.instances.iter().map(|inst| inst.def).unique() {
            let def = &ctx.definitions[id];
            vars::warn_assignments(&def.declare, "DECLARE", def.name.as_str(), "INITIALIZE");
            vars::warn_assignments(&def.uservars, "USERVARS", def.name.as_str(), "EXTEND");
        }
        for (inst, def) in ctx.instances() {
            for jump in &inst.jumps {
                if jump.target_index.is_none() {
                    return Err(Error::malformed_structure(format!(
                        "JUMP {} of component `{}' has no target",
                        jump.target.label(),
                        inst.name
                    ))
                    .with_pos(jump));
                }
            }
            for formal in def.bound_params() {
                let static_vector = formal.ty == ir::ParamType::Vector
                    && inst.binding(formal.name).is_some_and(|v| v.is_brace_list());
                if static_vector {
                    log::warn!(
                        "The parameter {} of {} is initialized using a static {{,,,}} vector. Such static vectors support literal numbers ONLY. Any vector use of variables or defines must happen via a DECLARE/INITIALIZE pointer.",
                        formal.name,
                        inst.name
                    );
                }
            }
        }
        Ok(())
    }

    fn link_externs(ctx: &ir::Context, file: &mut OutputFile) -> McResult<()> {
        let runtime = LibraryFiles::new(&ctx.workspace);
        let name = file.as_path_string();
        let mut generator = Generator::new(ctx, &runtime, file.get_write()?, name);
        generator.header()?;
        generator.finish()
    }

    fn emit(ctx: &ir::Context, file: &mut OutputFile) -> McResult<()> {
        let runtime = LibraryFiles::new(&ctx.workspace);
        let name = file.as_path_string();
        let mut generator = Generator::new(ctx, &runtime, file.get_write()?, name);
        generator.program()?;
        generator.finish()
    }
}

impl CBackend {
    /// Write the whole program for `ctx` to `out`, reading support files
    /// from `runtime`.
    pub fn generate<'a>(
        ctx: &'a ir::Context,
        runtime: &'a dyn RuntimeEmbedder,
        out: Box<dyn Write + 'a>,
        output_name: &str,
    ) -> McResult<()> {
        Self::validate(ctx)?;
        let mut generator = Generator::new(ctx, runtime, out, output_name.to_string());
        generator.header()?;
        generator.program()?;
        generator.finish()
    }
}

/// State of one generation.
pub(crate) struct Generator<'a> {
    ctx: &'a ir::Context,
    out: CWriter<'a>,
    cache: EmitCache,
    /// Fields added to the particle: the USERVARS of the instrument, then
    /// those of the component types renamed per instance.
    uservars: Vec<CodeVar>,
    output_name: String,
}

impl<'a> Generator<'a> {
    fn new(
        ctx: &'a ir::Context,
        runtime: &'a dyn RuntimeEmbedder,
        out: Box<dyn Write + 'a>,
        output_name: String,
    ) -> Self {
        Self {
            ctx,
            out: CWriter::new(out, runtime),
            cache: EmitCache::default(),
            uservars: vars::user_vars(ctx),
            output_name,
        }
    }

    fn instr(&self) -> &'a ir::InstrumentDefinition {
        &self.ctx.instrument
    }

    /// Everything after the header.
    fn program(&mut self) -> McResult<()> {
        self.decls()?;
        self.section(Section::Initialize)?;

        self.def_trace_section()?;
        self.trace_routines()?;
        self.def_uservars()?;
        self.raytrace()?;
        self.funnel()?;
        self.undef_uservars()?;
        self.undef_trace_section()?;

        self.section(Section::Save)?;
        self.section(Section::Finally)?;
        self.section(Section::Display)?;

        self.lookup_functions()?;
        for name in RUNTIME_TRAILER {
            self.out.embed(name).map_err(|err| {
                Error::fatal(format!("Cannot embed runtime file `{name}': {err}"))
            })?;
        }
        writeln!(self.out, "/* end of generated C code {} */", self.output_name)?;
        Ok(())
    }

    fn finish(self) -> McResult<()> {
        self.out.finish()
    }
}
