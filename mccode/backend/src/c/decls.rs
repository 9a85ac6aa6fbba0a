//! Declarations: the instrument parameters and their table, the metadata
//! table, SHARE code, and the parameter structure of every component type
//! with one variable per instance.
use super::{c_quote, codeblock_vars, Generator, Section};
use itertools::Itertools;
use mccode_ir::{ComponentInstance, Context, Metadatum, ParamType};
use mccode_utils::{Id, McResult};
use std::io::Write;

/// Size of the buffers holding string parameters.
pub const STRING_SIZE: usize = 16384;

/// Rows of the metadata table: the instrument, each used component type
/// once, then each instance.
fn metadata_rows(ctx: &Context) -> Vec<&Metadatum> {
    let types = ctx
        .instrument
        .instances
        .iter()
        .map(|inst| inst.def)
        .unique()
        .flat_map(|def| ctx.definitions[def].metadata.iter());
    ctx.instrument
        .metadata
        .iter()
        .chain(types)
        .chain(ctx.instrument.instances.iter().flat_map(|i| i.metadata.iter()))
        .collect()
}

/// Length of the array holding the vector parameter `name` of the type of
/// `inst`: the longest `{..}` list given by any instance of the type.
fn static_vector_len(ctx: &Context, inst: &ComponentInstance, name: Id) -> usize {
    let lens = ctx
        .instrument
        .instances
        .iter()
        .filter(|other| other.def == inst.def)
        .filter_map(|other| other.binding(name).filter(|v| v.is_brace_list()))
        .map(|v| v.brace_elements().len())
        .collect_vec();
    let max = lens.iter().copied().max().unwrap_or(0);
    if lens.iter().any(|len| *len != max) {
        log::warn!(
            "The vector parameter {name} of component type {} is given lists of different lengths. Its array holds {max} elements.",
            ctx.def_of(inst).name
        );
    }
    max
}

impl Generator<'_> {
    pub(super) fn decls(&mut self) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        log::info!("Writing instrument `{}' and components DECLARE", instr.name);

        writeln!(self.out)?;
        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* instrument '{}' and components DECLARE", instr.name)?;
        writeln!(self.out, "***************************************************************************** */")?;
        writeln!(self.out)?;
        self.instrument_parameters()?;
        self.instrument_struct()?;
        self.input_table()?;
        self.metadata_table()?;
        self.shares()?;

        writeln!(self.out)?;
        writeln!(self.out, "/* ********************** component definition declarations. **************** */")?;
        writeln!(self.out)?;
        for inst in &instr.instances {
            self.comp_declare(inst)?;
        }
        writeln!(self.out, "int mcNUMCOMP = {};", instr.len())?;
        writeln!(self.out)?;

        writeln!(self.out, "/* User declarations from instrument definition. Can define functions. */")?;
        self.out.code(&instr.decls)?;
        writeln!(self.out)?;
        writeln!(self.out, "#undef compcurname")?;
        writeln!(self.out, "#undef compcurtype")?;
        writeln!(self.out, "#undef compcurindex")?;
        writeln!(self.out, "/* end of instrument '{}' and components DECLARE */", instr.name)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn instrument_parameters(&mut self) -> McResult<()> {
        let instr = &self.ctx.instrument;
        writeln!(self.out, "/* Instrument parameters: structure and a table for the initialisation")?;
        writeln!(self.out, "   (Used in e.g. inputparse and I/O function (e.g. detector_out) */")?;
        writeln!(self.out)?;
        writeln!(self.out, "struct _struct_instrument_parameters {{")?;
        if instr.params().next().is_none() {
            writeln!(self.out, "  char {}_has_no_parameter;", instr.name)?;
        }
        for formal in instr.params() {
            writeln!(self.out, "  {} {};", formal.ty.c_type(), formal.name)?;
        }
        writeln!(self.out, "}};")?;
        writeln!(self.out, "typedef struct _struct_instrument_parameters _class_instrument_parameters;")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// The instrument structure: counters and positions per instance, and
    /// the GROUP and SPLIT state when there are any.
    fn instrument_struct(&mut self) -> McResult<()> {
        let instr = &self.ctx.instrument;
        let splits = instr
            .instances
            .iter()
            .filter(|inst| inst.split.is_some())
            .collect_vec();
        let has_logic = !instr.groups.is_empty() || !splits.is_empty();
        if has_logic {
            writeln!(self.out, "/* instrument SPLIT and GROUP control logic */")?;
            writeln!(self.out, "struct instrument_logic_struct {{")?;
            for group in &instr.groups {
                writeln!(
                    self.out,
                    "  long Group_{}; /* equals index of scattering comp when in group */",
                    group.name
                )?;
            }
            for inst in &splits {
                writeln!(self.out, "  long Split_{}; /* this is the SPLIT counter decremented down to 0 */", inst.name)?;
                writeln!(self.out, "  _class_particle Split_{}_particle; /* this is the particle to duplicate */", inst.name)?;
            }
            writeln!(self.out, "}};")?;
            writeln!(self.out)?;
        }

        let n = instr.len() + 2;
        writeln!(self.out, "struct _instrument_struct {{")?;
        writeln!(self.out, "  char   _name[256]; /* the name of this instrument e.g. '{}' */", instr.name)?;
        writeln!(self.out, "/* Counters per component instance */")?;
        writeln!(self.out, "  double counter_AbsorbProp[{n}]; /* absorbed events in PROP routines */")?;
        writeln!(self.out, "  double counter_N[{n}], counter_P[{n}], counter_P2[{n}]; /* event counters after each component instance */")?;
        writeln!(self.out, "  _class_particle _trajectory[{n}]; /* current trajectory for STORE/RESTORE */")?;
        writeln!(self.out, "/* Components position table (absolute and relative coords) */")?;
        writeln!(self.out, "  Coords _position_relative[{n}]; /* positions of all components */")?;
        writeln!(self.out, "  Coords _position_absolute[{n}];")?;
        writeln!(self.out, "  _class_instrument_parameters _parameters; /* instrument parameters */")?;
        if has_logic {
            writeln!(self.out, "  struct instrument_logic_struct logic; /* instrument logic */")?;
        }
        writeln!(self.out, "}} _instrument_var;")?;
        writeln!(self.out, "struct _instrument_struct *instrument = & _instrument_var;")?;
        writeln!(self.out, "#pragma acc declare create ( _instrument_var )")?;
        writeln!(self.out, "#pragma acc declare create ( instrument )")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Table read by the runtime to set the instrument parameters from the
    /// command line. A parameter without default has an empty default.
    fn input_table(&mut self) -> McResult<()> {
        let instr = &self.ctx.instrument;
        writeln!(self.out, "int numipar = {};", instr.params().count())?;
        writeln!(self.out, "struct mcinputtable_struct mcinputtable[] = {{")?;
        for formal in instr.params() {
            let default = match &formal.default {
                // String defaults already carry their quotes.
                Some(value) if formal.ty == ParamType::String => value.text.clone(),
                Some(value) => value.quoted(),
                None => "\"\"".to_string(),
            };
            writeln!(
                self.out,
                "  \"{0}\", &(_instrument_var._parameters.{0}), {1}, {2}, \"{3}\",",
                formal.name,
                formal.ty.tag(),
                default,
                c_quote(formal.unit.as_deref().unwrap_or_default())
            )?;
        }
        writeln!(self.out, "  NULL, NULL, instr_type_double, \"\"")?;
        writeln!(self.out, "}};")?;
        writeln!(self.out)?;
        Ok(())
    }

    fn metadata_table(&mut self) -> McResult<()> {
        let rows = metadata_rows(self.ctx);
        writeln!(self.out, "struct metadata_table_struct metadata_table[] = {{")?;
        for row in &rows {
            writeln!(
                self.out,
                "\"{}\", \"{}\", \"{}\",",
                row.source,
                c_quote(&row.name),
                c_quote(&row.mime)
            )?;
            self.out.string_lines(&row.body.lines)?;
            writeln!(self.out, ",")?;
        }
        writeln!(self.out, "  \"\", \"\", \"\", \"\"")?;
        writeln!(self.out, "}};")?;
        writeln!(self.out, "int num_metadata = {};", rows.len())?;
        Ok(())
    }

    /// SHARE code of every used component type, once per type.
    fn shares(&mut self) -> McResult<()> {
        let ctx = self.ctx;
        let mut any = false;
        for (inst, def) in ctx.instances() {
            if def.share.is_empty() || !self.cache.claim(inst.def, Section::Share) {
                continue;
            }
            if !any {
                writeln!(self.out)?;
                writeln!(self.out, "/* ************************************************************************** */")?;
                writeln!(self.out, "/*             SHARE user declarations for all components                     */")?;
                writeln!(self.out, "/* ************************************************************************** */")?;
                writeln!(self.out)?;
                any = true;
            }
            writeln!(self.out, "/* Shared user declarations for all components types '{}'. */", def.name)?;
            self.out.code(&def.share)?;
            self.cache.define(inst.def, Section::Share);
            writeln!(self.out)?;
        }
        if any {
            writeln!(self.out)?;
            writeln!(self.out)?;
            writeln!(self.out, "/* ************************************************************************** */")?;
            writeln!(self.out, "/*             End of SHARE user declarations for all components              */")?;
            writeln!(self.out, "/* ************************************************************************** */")?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// The structures of the type of `inst` when not written yet, then the
    /// variable of `inst`.
    fn comp_declare(&mut self, inst: &ComponentInstance) -> McResult<()> {
        let ctx = self.ctx;
        let def = ctx.def_of(inst);
        if self.cache.claim(inst.def, Section::Declare) {
            writeln!(self.out, "/* component {}={}() [{}] DECLARE */", inst.name, def.name, inst.index)?;
            writeln!(self.out, "/* Parameter definition for component type '{}' */", def.name)?;
            writeln!(self.out, "struct _struct_{}_parameters {{", def.name)?;

            let mut count = 0;
            if def.bound_params().next().is_some() {
                writeln!(self.out, "  /* Component type '{}' setting parameters */", def.name)?;
            }
            for formal in def.bound_params() {
                count += 1;
                match formal.ty {
                    ParamType::Vector => match inst.binding(formal.name) {
                        Some(value) if value.is_brace_list() => writeln!(
                            self.out,
                            "  MCNUM {}[{}];",
                            formal.name,
                            static_vector_len(ctx, inst, formal.name)
                        )?,
                        _ => writeln!(self.out, "  MCNUM* {};", formal.name)?,
                    },
                    ParamType::String => {
                        writeln!(self.out, "  char {}[{STRING_SIZE}];", formal.name)?
                    }
                    ty => writeln!(self.out, "  {} {};", ty.c_type(), formal.name)?,
                }
            }
            let private = codeblock_vars(&def.declare);
            if !private.is_empty() {
                writeln!(self.out, "  /* Component type '{}' private parameters */", def.name)?;
            }
            for var in &private {
                count += 1;
                writeln!(self.out, "  {}", var.member())?;
            }
            if count == 0 {
                writeln!(self.out, "  char {}_has_no_parameters;", def.name)?;
            }
            writeln!(self.out, "}}; /* _struct_{}_parameters */", def.name)?;
            writeln!(
                self.out,
                "typedef struct _struct_{0}_parameters _class_{0}_parameters;",
                def.name
            )?;
            writeln!(self.out)?;

            writeln!(self.out, "/* Parameters for component type '{}' */", def.name)?;
            writeln!(self.out, "struct _struct_{} {{", def.name)?;
            writeln!(self.out, "  char     _name[256]; /* e.g. {} */", inst.name)?;
            writeln!(self.out, "  char     _type[256]; /* {} */", def.name)?;
            writeln!(self.out, "  long     _index; /* e.g. {} index in TRACE list */", inst.index)?;
            writeln!(self.out, "  Coords   _position_absolute;")?;
            writeln!(self.out, "  Coords   _position_relative; /* wrt PREVIOUS */")?;
            writeln!(self.out, "  Rotation _rotation_absolute;")?;
            writeln!(self.out, "  Rotation _rotation_relative; /* wrt PREVIOUS */")?;
            writeln!(self.out, "  int      _rotation_is_identity;")?;
            writeln!(self.out, "  int      _position_relative_is_zero;")?;
            writeln!(self.out, "  _class_{0}_parameters _parameters;", def.name)?;
            writeln!(self.out, "}};")?;
            writeln!(self.out, "typedef struct _struct_{0} _class_{0};", def.name)?;
            self.cache.define(inst.def, Section::Declare);
        }
        writeln!(self.out, "_class_{} _{}_var;", def.name, inst.name)?;
        writeln!(self.out, "#pragma acc declare create ( _{}_var )", inst.name)?;
        writeln!(self.out)?;
        Ok(())
    }
}
