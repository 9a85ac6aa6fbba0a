//! Lifecycle sections: one routine per component type and section, called
//! for every instance by the instrument routine of the section. INITIALISE
//! also places every instance.
use super::{c_quote, codeblock_vars, decls::STRING_SIZE, Generator, Section};
use mccode_ir::{ComponentDefinition, ComponentInstance, ParamType};
use mccode_utils::McResult;
use std::io::Write;

/// Drawing primitives renamed inside the DISPLAY routines.
const DISPLAY_PRIMITIVES: [&str; 12] = [
    "magnify",
    "line",
    "dashed_line",
    "multiline",
    "rectangle",
    "box",
    "circle",
    "cylinder",
    "sphere",
    "cone",
    "polygon",
    "polyhedron",
];

const DISTANCE_FUNCTIONS: &str = r#"int _getcomp_index(char* compname);

double index_getdistance(int first_index, int second_index)
/* Calculate the distance two components from their indexes*/
{
  return coords_len(coords_sub(POS_A_COMP_INDEX(first_index), POS_A_COMP_INDEX(second_index)));
}

double getdistance(char* first_component, char* second_component)
/* Calculate the distance between two named components */
{
  int first_index = _getcomp_index(first_component);
  int second_index = _getcomp_index(second_component);
  return index_getdistance(first_index, second_index);
}

double checked_setpos_getdistance(int current_index, char* first_component, char* second_component)
/* Calculate the distance between two named components at *_setpos() time, with component index checking */
{
  int first_index = _getcomp_index(first_component);
  int second_index = _getcomp_index(second_component);
  if (first_index >= current_index || second_index >= current_index) {
    printf("setpos_getdistance can only be used with the names of components before the current one!\n");
    return 0;
  }
  return index_getdistance(first_index, second_index);
}
#define setpos_getdistance(first, second) checked_setpos_getdistance(current_setpos_index, first, second)
"#;

const NAN_CHECKS: &str = r#"#ifndef NOABSORB_INF_NAN
  /* Check for nan or inf particle parms */
  if(isnan(p + t + vx + vy + vz + x + y + z)) ABSORB;
  if(isinf(fabs(p) + fabs(t) + fabs(vx) + fabs(vy) + fabs(vz) + fabs(x) + fabs(y) + fabs(z))) ABSORB;
#else"#;

/// Names usable as plain identifiers in the code of `def`: its bound
/// parameters and the variables of its DECLARE block.
fn parameter_names(def: &ComponentDefinition) -> Vec<String> {
    def.bound_params()
        .map(|f| f.name.to_string())
        .chain(codeblock_vars(&def.declare).into_iter().map(|v| v.name))
        .collect()
}

impl Generator<'_> {
    /// The routines of a section and the instrument routine calling them.
    pub(super) fn section(&mut self, section: Section) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        let keyword = section.keyword();
        let routine = section.routine();
        log::info!("Writing instrument `{}' and components {keyword}", instr.name);

        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* instrument '{}' and components {keyword}", instr.name)?;
        writeln!(self.out, "***************************************************************************** */")?;
        writeln!(self.out)?;

        if section == Section::Display {
            for name in DISPLAY_PRIMITIVES {
                writeln!(self.out, "  #define {name:<11} mcdis_{name}")?;
            }
        }
        if section == Section::Initialize {
            writeln!(self.out, "{DISTANCE_FUNCTIONS}")?;
            let mut last = None;
            for inst in &instr.instances {
                self.setpos(inst, last)?;
                if !inst.skip_transform {
                    last = Some(inst);
                }
            }
        }
        for inst in &instr.instances {
            self.class_routine(inst, section)?;
        }
        writeln!(self.out)?;
        if section == Section::Display {
            for name in DISPLAY_PRIMITIVES {
                writeln!(self.out, "  #undef {name}")?;
            }
        }
        writeln!(self.out)?;

        let (code, arg) = match section {
            Section::Initialize => (Some(&instr.inits), "void"),
            Section::Save => (Some(&instr.saves), "FILE *handle"),
            Section::Finally => (Some(&instr.finals), "void"),
            _ => (None, "void"),
        };
        writeln!(
            self.out,
            "int {routine}({arg}) {{ /* called by mccode_main for {}:{keyword} */",
            instr.name
        )?;
        match section {
            Section::Initialize => {
                writeln!(self.out, "  DEBUG_INSTR();")?;
                writeln!(self.out)?;
                writeln!(self.out, "  /* code_main/parseoptions/readparams sets instrument parameters value */")?;
                writeln!(self.out, "  stracpy(instrument->_name, \"{}\", 256);", instr.name)?;
            }
            Section::Save => writeln!(self.out, "  if (!handle) siminfo_init(NULL);")?,
            Section::Finally => {
                for inst in &instr.instances {
                    writeln!(self.out, "#pragma acc update host(_{}_var)", inst.name)?;
                }
                writeln!(self.out, "#pragma acc update host(_instrument_var)")?;
                writeln!(self.out)?;
                writeln!(self.out, "  siminfo_init(NULL);")?;
                writeln!(self.out, "  save(siminfo_file); /* save data when simulation ends */")?;
            }
            _ => writeln!(self.out, "  printf(\"MCDISPLAY: start\\n\");")?,
        }
        writeln!(self.out)?;

        if let Some(code) = code.filter(|c| !c.is_empty()) {
            writeln!(self.out, "  /* Instrument '{}' {keyword} */", instr.name)?;
            writeln!(
                self.out,
                "  SIG_MESSAGE(\"[{}] {keyword} [{}:{}]\");",
                instr.name,
                c_quote(&code.file),
                code.line
            )?;
            for formal in instr.params() {
                writeln!(self.out, "  #define {0} (instrument->_parameters.{0})", formal.name)?;
            }
            self.out.code_braced(code)?;
            for formal in instr.params() {
                writeln!(self.out, "  #undef {}", formal.name)?;
            }
        }

        if section == Section::Initialize {
            for inst in &instr.instances {
                writeln!(self.out, "  _{}_setpos(); /* type {} */", inst.name, ctx.def_of(inst).name)?;
            }
            writeln!(self.out)?;
        }

        writeln!(self.out, "  /* call iteratively all components {keyword} */")?;
        for (inst, def) in ctx.instances() {
            if self.cache.is_defined(inst.def, section) {
                writeln!(self.out, "  class_{}_{routine}(&_{}_var);", def.name, inst.name)?;
            }
            writeln!(self.out)?;
        }

        match section {
            Section::Initialize => {
                writeln!(self.out, "  if (mcdotrace) display();")?;
                writeln!(self.out, "  DEBUG_INSTR_END();")?;
                writeln!(self.out)?;
                writeln!(self.out, "#ifdef OPENACC")?;
                writeln!(self.out, "#include <openacc.h>")?;
                for inst in &instr.instances {
                    writeln!(self.out, "#pragma acc update device(_{}_var)", inst.name)?;
                }
                writeln!(self.out, "#pragma acc update device(_instrument_var)")?;
                writeln!(self.out, "#endif")?;
            }
            Section::Save => writeln!(self.out, "  if (!handle) siminfo_close(); ")?,
            Section::Finally => writeln!(self.out, "  siminfo_close(); ")?,
            _ => writeln!(self.out, "  printf(\"MCDISPLAY: end\\n\");")?,
        }
        writeln!(self.out)?;
        writeln!(self.out, "  return(0);")?;
        writeln!(self.out, "}} /* {routine} */")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// TRACE routines of every component type.
    pub(super) fn trace_routines(&mut self) -> McResult<()> {
        log::info!("Writing components TRACE");
        let ctx = self.ctx;
        for inst in &ctx.instrument.instances {
            self.class_routine(inst, Section::Trace)?;
        }
        Ok(())
    }

    /// The routine of `section` for the type of `inst`, unless it was
    /// written for another instance of the type. A type without code for the
    /// section gets no routine; for TRACE, an EXTEND on any instance of the
    /// type is code too.
    fn class_routine(
        &mut self,
        inst: &ComponentInstance,
        section: Section,
    ) -> McResult<()> {
        let ctx = self.ctx;
        let def = ctx.def_of(inst);
        let code = section.code(def);
        let trace = section == Section::Trace;
        let extended: Vec<&ComponentInstance> = if trace {
            ctx.instrument
                .instances
                .iter()
                .filter(|i| i.def == inst.def && !i.extend.is_empty())
                .collect()
        } else {
            vec![]
        };
        if code.is_empty() && extended.is_empty() {
            return Ok(());
        }
        if !self.cache.claim(inst.def, section) {
            return Ok(());
        }
        let routine = section.routine();
        let name = def.name;

        if trace {
            if !def.noacc {
                writeln!(self.out, "#pragma acc routine")?;
            }
            writeln!(self.out, "void class_{name}_{routine}(_class_{name} *_comp")?;
            writeln!(self.out, "  , _class_particle *_particle) {{")?;
            writeln!(self.out, "  ABSORBED=SCATTERED=RESTORE=0;")?;
        } else {
            writeln!(self.out, "_class_{name} *class_{name}_{routine}(_class_{name} *_comp")?;
            writeln!(self.out, ") {{")?;
        }
        let params = parameter_names(def);
        for param in &params {
            writeln!(self.out, "  #define {param} (_comp->_parameters.{param})")?;
        }
        let (file, line) = if code.is_empty() {
            (def.name.to_string(), 0)
        } else {
            (c_quote(&code.file), code.line)
        };
        writeln!(
            self.out,
            "  SIG_MESSAGE(\"[_{}_{routine}] component {}={name}() {} [{file}:{line}]\");",
            inst.name,
            inst.name,
            section.keyword()
        )?;
        writeln!(self.out)?;

        if trace {
            self.symbol_assignments(inst, def)?;
        }
        if section == Section::Display {
            writeln!(self.out, "  printf(\"MCDISPLAY: component %s\\n\", _comp->_name);")?;
        }
        self.out.code(code)?;

        if trace {
            writeln!(self.out, "{NAN_CHECKS}")?;
            for var in ["p", "t", "vx", "vy", "vz", "x", "y", "z"] {
                writeln!(
                    self.out,
                    "  if(isnan({var}) || isinf({var})) printf(\"NAN or INF found in {var}, %s (particle %lld)\\n\",_comp->_name,_particle->_uid);"
                )?;
            }
            writeln!(self.out, "#endif")?;
        }
        if !extended.is_empty() {
            writeln!(self.out)?;
            for var in &self.uservars {
                writeln!(self.out, "  #define {0} (_particle->{0})", var.name)?;
            }
            for ext in &extended {
                writeln!(self.out, "if (_comp->_index == {}) {{ // EXTEND '{}'", ext.index, ext.name)?;
                self.out.code(&ext.extend)?;
                writeln!(self.out, "}}")?;
            }
            for var in &self.uservars {
                writeln!(self.out, "  #undef {}", var.name)?;
            }
            writeln!(self.out)?;
        }

        for param in &params {
            writeln!(self.out, "  #undef {param}")?;
        }
        if trace {
            writeln!(self.out, "  return;")?;
        } else {
            writeln!(self.out, "  return(_comp);")?;
        }
        writeln!(self.out, "}} /* class_{name}_{routine} */")?;
        writeln!(self.out)?;
        self.cache.define(inst.def, section);
        Ok(())
    }

    /// `symbol` parameters name a variable of the generated program. The
    /// TRACE routine assigns it to the parameter of each instance setting
    /// one.
    fn symbol_assignments(
        &mut self,
        inst: &ComponentInstance,
        def: &ComponentDefinition,
    ) -> McResult<()> {
        let is_set = |i: &ComponentInstance| {
            def.bound_params().any(|f| {
                f.ty == ParamType::Symbol
                    && i.binding(f.name)
                        .is_some_and(|v| !v.text.is_empty() && v.text != "NULL")
            })
        };
        if !is_set(inst) {
            return Ok(());
        }
        for other in self.ctx.instrument.instances.iter().filter(|i| i.def == inst.def) {
            writeln!(self.out, "  /* Check if this is component '{}' */ ", other.name)?;
            writeln!(self.out, "  if(_comp->_index == {}) {{ ", other.index)?;
            for formal in def.bound_params().filter(|f| f.ty == ParamType::Symbol) {
                if let Some(value) = other.binding(formal.name) {
                    writeln!(self.out, "    {} = {};", formal.name, value)?;
                }
            }
            writeln!(self.out, "  }}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// `_<inst>_setpos`: sets the parameters of `inst` and places it.
    /// `last` is the closest preceding instance whose frame is entered.
    fn setpos(
        &mut self,
        inst: &ComponentInstance,
        last: Option<&ComponentInstance>,
    ) -> McResult<()> {
        let ctx = self.ctx;
        let def = ctx.def_of(inst);
        let n = &inst.name;
        writeln!(self.out, "/* component {n}={}() SETTING, POSITION/ROTATION */", def.name)?;
        writeln!(self.out, "int _{n}_setpos(void)")?;
        writeln!(self.out, "{{ /* sets initial component parameters, position and rotation */")?;
        let (file, line) = if def.initialize.is_empty() {
            (def.name.to_string(), 0)
        } else {
            (c_quote(&def.initialize.file), def.initialize.line)
        };
        writeln!(
            self.out,
            "  SIG_MESSAGE(\"[_{n}_setpos] component {n}={}() SETTING [{file}:{line}]\");",
            def.name
        )?;
        writeln!(self.out, "  stracpy(_{n}_var._name, \"{n}\", {STRING_SIZE});")?;
        writeln!(self.out, "  stracpy(_{n}_var._type, \"{}\", {STRING_SIZE});", def.name)?;
        writeln!(self.out, "  _{n}_var._index={};", inst.index)?;
        writeln!(self.out, "  int current_setpos_index = {};", inst.index)?;
        self.init_par(inst, def)?;
        self.position(inst, last)?;
        let i = inst.index;
        writeln!(
            self.out,
            "  instrument->counter_N[{i}]  = instrument->counter_P[{i}] = instrument->counter_P2[{i}] = 0;"
        )?;
        writeln!(self.out, "  instrument->counter_AbsorbProp[{i}]= 0;")?;
        writeln!(self.out, "  return(0);")?;
        writeln!(self.out, "}} /* _{n}_setpos */")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Copy the parameter values of `inst` into its variable.
    fn init_par(
        &mut self,
        inst: &ComponentInstance,
        def: &ComponentDefinition,
    ) -> McResult<()> {
        let n = &inst.name;
        let mut any = false;
        for formal in def.bound_params() {
            let Some(value) = inst.binding(formal.name) else {
                continue;
            };
            any = true;
            let p = &formal.name;
            match formal.ty {
                ParamType::String => {
                    if !value.is_null() {
                        writeln!(self.out, "  if({value} && strlen({value}))")?;
                        writeln!(
                            self.out,
                            "    stracpy(_{n}_var._parameters.{p}, {value} ? {value} : \"\", {STRING_SIZE});"
                        )?;
                        writeln!(self.out, "  else ")?;
                    }
                    writeln!(self.out, "  _{n}_var._parameters.{p}[0]='\\0';")?;
                }
                ParamType::Vector if value.is_brace_list() => {
                    for (i, elem) in value.brace_elements().iter().enumerate() {
                        writeln!(self.out, "  _{n}_var._parameters.{p}[{i}] = {elem};")?;
                    }
                }
                ParamType::Vector => writeln!(
                    self.out,
                    "  _{n}_var._parameters.{p} = {value}; // default pointer allocation"
                )?,
                ParamType::Symbol => {
                    writeln!(self.out, "  _{n}_var._parameters.{p} = '\\0';")?
                }
                _ => writeln!(self.out, "  _{n}_var._parameters.{p} = {value};")?,
            }
        }
        if any {
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Absolute and relative placement of `inst`. The rotation is composed
    /// with the absolute rotation of its reference, the position is
    /// expressed in the frame of its reference. Relative values are taken
    /// with respect to `last`.
    fn position(
        &mut self,
        inst: &ComponentInstance,
        last: Option<&ComponentInstance>,
    ) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        let def = ctx.def_of(inst);
        let n = &inst.name;
        let pos = &inst.position;
        let rot = &pos.orientation;
        writeln!(self.out, "  /* component {n}={}() AT ROTATED */", def.name)?;
        writeln!(self.out, "  {{")?;
        writeln!(self.out, "    Coords tc1, tc2;")?;
        writeln!(self.out, "    tc1 = coords_set(0,0,0);")?;
        writeln!(self.out, "    tc2 = coords_set(0,0,0);")?;
        writeln!(self.out, "    Rotation tr1;")?;
        writeln!(self.out, "    rot_set_rotation(tr1,0,0,0);")?;
        match pos.orientation_rel {
            None => {
                writeln!(self.out, "    rot_set_rotation(_{n}_var._rotation_absolute,")?;
                writeln!(
                    self.out,
                    "      ({})*DEG2RAD, ({})*DEG2RAD, ({})*DEG2RAD);",
                    rot.x, rot.y, rot.z
                )?;
            }
            Some(rel) => {
                let r = &instr.get(rel).name;
                writeln!(self.out, "    rot_set_rotation(tr1,")?;
                writeln!(
                    self.out,
                    "      ({})*DEG2RAD, ({})*DEG2RAD, ({})*DEG2RAD);",
                    rot.x, rot.y, rot.z
                )?;
                writeln!(
                    self.out,
                    "    rot_mul(tr1, _{r}_var._rotation_absolute, _{n}_var._rotation_absolute);"
                )?;
            }
        }
        match last {
            None => writeln!(
                self.out,
                "    rot_copy(_{n}_var._rotation_relative, _{n}_var._rotation_absolute);"
            )?,
            Some(last) => {
                writeln!(self.out, "    rot_transpose(_{}_var._rotation_absolute, tr1);", last.name)?;
                writeln!(
                    self.out,
                    "    rot_mul(_{n}_var._rotation_absolute, tr1, _{n}_var._rotation_relative);"
                )?;
            }
        }
        writeln!(
            self.out,
            "    _{n}_var._rotation_is_identity =  rot_test_identity(_{n}_var._rotation_relative);"
        )?;

        let at = &pos.place;
        match pos.place_rel {
            None => {
                writeln!(self.out, "    _{n}_var._position_absolute = coords_set(")?;
                writeln!(self.out, "      {}, {}, {});", at.x, at.y, at.z)?;
            }
            Some(rel) => {
                let r = &instr.get(rel).name;
                writeln!(self.out, "    tc1 = coords_set(")?;
                writeln!(self.out, "      {}, {}, {});", at.x, at.y, at.z)?;
                writeln!(self.out, "    rot_transpose(_{r}_var._rotation_absolute, tr1);")?;
                writeln!(self.out, "    tc2 = rot_apply(tr1, tc1);")?;
                writeln!(
                    self.out,
                    "    _{n}_var._position_absolute = coords_add(_{r}_var._position_absolute, tc2);"
                )?;
            }
        }
        match last {
            None => writeln!(self.out, "    tc1 = coords_neg(_{n}_var._position_absolute);")?,
            Some(last) => writeln!(
                self.out,
                "    tc1 = coords_sub(_{}_var._position_absolute, _{n}_var._position_absolute);",
                last.name
            )?,
        }
        writeln!(
            self.out,
            "    _{n}_var._position_relative = rot_apply(_{n}_var._rotation_absolute, tc1);"
        )?;
        writeln!(self.out, "  }} /* {n}={}() AT ROTATED */", def.name)?;
        writeln!(
            self.out,
            "  DEBUG_COMPONENT(\"{n}\", _{n}_var._position_absolute, _{n}_var._rotation_absolute);"
        )?;
        writeln!(
            self.out,
            "  instrument->_position_absolute[{}] = _{n}_var._position_absolute;",
            inst.index
        )?;
        writeln!(
            self.out,
            "  instrument->_position_relative[{}] = _{n}_var._position_relative;",
            inst.index
        )?;
        writeln!(
            self.out,
            "    _{n}_var._position_relative_is_zero =  coords_test_zero(_{n}_var._position_relative);"
        )?;
        Ok(())
    }
}
