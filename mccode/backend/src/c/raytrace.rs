//! The `raytrace` state machine: a loop over component indices that
//! carries one particle through the instrument.
use super::Generator;
use mccode_ir::{ComponentInstance, GroupInstance};
use mccode_utils::McResult;
use std::io::Write;

/// Particle fields visible as plain names inside TRACE code.
const STATE_VARS: [&str; 17] = [
    "x",
    "y",
    "z",
    "vx",
    "vy",
    "vz",
    "t",
    "sx",
    "sy",
    "sz",
    "p",
    "mcgravitation",
    "mcMagnet",
    "allow_backprop",
    "_mctmp_a",
    "_mctmp_b",
    "_mctmp_c",
];

const ACC_DEFINES: &str = r#"#ifdef OPENACC
#ifdef USE_PGI
#include <cudadevice.h>
#endif
#define fprintf(stderr,...) printf(__VA_ARGS__)
#define sprintf(string,...) printf(__VA_ARGS__)
#define exit(...) noprintf()
#define strcmp(a,b) str_comp(a,b)
#define strlen(a) str_len(a)
#endif"#;

pub(super) const ACC_UNDEFS: &str = r#"#ifdef OPENACC
#undef strlen
#undef strcmp
#undef exit
#undef printf
#undef sprintf
#undef fprintf
#endif"#;

const TRACE_MACROS: &str = r#"#define SCATTERED (_particle->_scattered)
#define RESTORE (_particle->_restore)
#define RESTORE_NEUTRON(_index, ...) _particle->_restore = _index;
#define ABSORBED (_particle->_absorbed)
#define mcget_run_num() _particle->_uid
#define ABSORB0 do { DEBUG_STATE(); DEBUG_ABSORB(); MAGNET_OFF; ABSORBED++; return; } while(0)
#define ABSORB ABSORB0"#;

const TRACE_UNDEFS: [&str; 7] = [
    "SCATTERED",
    "RESTORE",
    "RESTORE_NEUTRON",
    "STORE_NEUTRON",
    "ABSORBED",
    "ABSORB",
    "ABSORB0",
];

/// Inside the drivers, absorbing a particle ends its component, not the
/// driver.
pub(super) const ABSORB_IN_DRIVER: &str = r#"  #undef ABSORB0
  #undef ABSORB
  #define ABSORB0 do { DEBUG_ABSORB(); MAGNET_OFF; ABSORBED++;} while(0)
  #define ABSORB ABSORB0"#;

pub(super) const ACC_LOOPS: &str = r#"#ifdef OPENACC
  if (ncount>gpu_innerloop) {
    printf("Defining %llu batches of %llu particles\n",loops,gpu_innerloop);
  } else {
    printf("Running single batch of %llu particles\n",ncount);
    loops=1;
    gpu_innerloop = ncount;
  }
#else
  gpu_innerloop = ncount;
#endif"#;

pub(super) const MPI_UID: &str = r#"    #ifdef USE_MPI
    _particle->_uid += mpi_node_rank * ncount;
    #endif"#;

/// Lines closing the body of a component in the state machine when it is a
/// member of `group`. A scattered particle leaves the group; otherwise the
/// next member is tried on the saved particle. `none_scattered` is what
/// happens after the last member.
pub(super) fn group_exit(
    group: &GroupInstance,
    inst: &ComponentInstance,
    indent: &str,
    not_scattered: &str,
    none_scattered: &str,
) -> String {
    let (first, first_idx) = group.first;
    let (last, last_idx) = group.last;
    let mut out = format!(
        "{indent}// GROUP {}: from {first} [{first_idx}] to {last} [{last_idx}]\n",
        group.name
    );
    out.push_str(&format!(
        "{indent}if (SCATTERED) _particle->_index = {last_idx}; // when SCATTERED in GROUP: reach exit of GROUP after {last}\n"
    ));
    if group.is_last(inst.index) {
        out.push_str(&format!("{indent}{none_scattered}\n"));
    } else {
        out.push_str(&format!("{indent}{not_scattered}\n"));
    }
    out
}

impl Generator<'_> {
    /// Macros giving the TRACE code access to the particle.
    pub(super) fn def_trace_section(&mut self) -> McResult<()> {
        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* components TRACE")?;
        writeln!(self.out, "***************************************************************************** */")?;
        writeln!(self.out)?;
        for var in STATE_VARS {
            writeln!(self.out, "#define {var} (_particle->{var})")?;
        }
        writeln!(self.out, "/* if on GPU, globally nullify sprintf,fprintf,printfs   */")?;
        writeln!(self.out, "/* (Similar defines are available in each comp trace but */")?;
        writeln!(self.out, "/*  those are not enough to handle external libs etc. )  */")?;
        writeln!(self.out, "{ACC_DEFINES}")?;
        writeln!(self.out, "{TRACE_MACROS}")?;
        writeln!(self.out)?;
        Ok(())
    }

    pub(super) fn undef_trace_section(&mut self) -> McResult<()> {
        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* instrument '{}' end of TRACE", self.instr().name)?;
        writeln!(self.out, "***************************************************************************** */")?;
        for var in STATE_VARS {
            writeln!(self.out, "#undef {var}")?;
        }
        writeln!(self.out, "{ACC_UNDEFS}")?;
        for name in TRACE_UNDEFS {
            writeln!(self.out, "#undef {name}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub(super) fn def_uservars(&mut self) -> McResult<()> {
        for var in &self.uservars {
            writeln!(self.out, "#define {0} (_particle->{0})", var.name)?;
        }
        Ok(())
    }

    pub(super) fn undef_uservars(&mut self) -> McResult<()> {
        for var in &self.uservars {
            writeln!(self.out, "#undef {}", var.name)?;
        }
        Ok(())
    }

    /// `raytrace` and `raytrace_all`, compiled unless FUNNEL is defined.
    pub(super) fn raytrace(&mut self) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        log::info!("Writing raytrace state machine of `{}'", instr.name);

        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* instrument '{}' TRACE", instr.name)?;
        writeln!(self.out, "***************************************************************************** */")?;
        writeln!(self.out)?;
        writeln!(self.out, "#ifndef FUNNEL")?;
        writeln!(self.out, "#pragma acc routine")?;
        writeln!(
            self.out,
            "int raytrace(_class_particle* _particle) {{ /* single event propagation, called by mccode_main for {}:TRACE */",
            instr.name
        )?;
        writeln!(self.out)?;
        writeln!(self.out, "  /* init variables and counters for TRACE */")?;
        writeln!(self.out, "{ABSORB_IN_DRIVER}")?;
        writeln!(self.out, "  DEBUG_ENTER();")?;
        writeln!(self.out, "  DEBUG_STATE();")?;
        for inst in &instr.instances {
            for jump in inst.jumps.iter().filter(|j| j.iterate) {
                writeln!(self.out, "  _particle->_logic.{}=0;", jump.counter_name(inst.name))?;
            }
        }
        writeln!(self.out, "  _particle->flag_nocoordschange=0; /* Init */")?;
        writeln!(self.out, "  _class_particle _particle_save=*_particle;")?;
        writeln!(self.out, "  /* the main iteration loop for one incoming event */")?;
        writeln!(self.out, "  while (!ABSORBED) {{ /* iterate event until absorbed */")?;

        let mut splits = vec![];
        for (inst, def) in ctx.instances() {
            if let Some(count) = &inst.split {
                self.split_prelude(inst, &count.to_string())?;
                splits.push(inst);
            }
            let n = &inst.name;
            let i = inst.index;
            writeln!(self.out, "    /* begin component {n}={}() [{i}] */", def.name)?;
            if !inst.skip_transform {
                writeln!(self.out, "    if (!_particle->flag_nocoordschange) {{ // flag activated by JUMP to pass coords change")?;
                writeln!(self.out, "      if (_{n}_var._rotation_is_identity) {{")?;
                writeln!(self.out, "        if(!_{n}_var._position_relative_is_zero) {{")?;
                writeln!(self.out, "          coords_get(coords_add(coords_set(x,y,z), _{n}_var._position_relative),&x, &y, &z);")?;
                writeln!(self.out, "        }}")?;
                writeln!(self.out, "      }} else {{")?;
                writeln!(self.out, "          mccoordschange(_{n}_var._position_relative, _{n}_var._rotation_relative, _particle);")?;
                writeln!(self.out, "      }}")?;
                writeln!(self.out, "    }}")?;
            }
            writeln!(self.out, "    if (!ABSORBED && _particle->_index == {i}) {{")?;
            writeln!(self.out, "      _particle->flag_nocoordschange=0; /* Reset if we came here from a JUMP */")?;

            let group = inst.group.map(|g| instr.group(g));
            match group {
                Some(g) if !g.is_first(inst.index) => {
                    writeln!(self.out, "      // GROUP {}: restore the particle saved at the GROUP entry, in the frame of {n}", g.name)?;
                    writeln!(
                        self.out,
                        "      mccoordschange(_{n}_var._position_relative, _{n}_var._rotation_relative, &_particle_save);"
                    )?;
                }
                _ if !inst.skip_transform => {
                    writeln!(self.out, "      _particle_save = *_particle;")?;
                }
                _ => {}
            }
            if !inst.skip_transform {
                writeln!(self.out, "      DEBUG_COMP(_{n}_var._name);")?;
                writeln!(self.out, "      DEBUG_STATE();")?;
            }

            if !def.trace.is_empty() || !inst.extend.is_empty() {
                if let Some(when) = &inst.when {
                    writeln!(self.out, "      if (({when})) // conditional WHEN execution")?;
                }
                let extend_note = if inst.extend.is_empty() {
                    ""
                } else {
                    " /* contains EXTEND code */"
                };
                writeln!(self.out, "      class_{}_trace(&_{n}_var, _particle);{extend_note}", def.name)?;
                writeln!(self.out, "      if (_particle->_restore)")?;
                writeln!(self.out, "        particle_restore(_particle, &_particle_save);")?;
            }

            for jump in &inst.jumps {
                let Some(target) = jump.target_index else {
                    continue;
                };
                let cond = &jump.condition;
                let target_idx = target.get() - 1;
                if jump.iterate {
                    let counter = jump.counter_name(inst.name);
                    writeln!(self.out, "      if (++_particle->_logic.{counter} < {cond}) {{ /* test for iteration */")?;
                    writeln!(self.out, "        _particle->_index = {target_idx};")?;
                    writeln!(self.out, "        _particle->flag_nocoordschange=1; // pass coords change")?;
                    writeln!(self.out, "      }}")?;
                    writeln!(self.out, "      else _particle->_logic.{counter}=0;")?;
                } else {
                    writeln!(self.out, "      if ({cond}) {{/* conditional JUMP to {} */", jump.target.label())?;
                    writeln!(self.out, "        _particle->_index={target_idx};")?;
                    writeln!(self.out, "        _particle->flag_nocoordschange=1; // pass coords change")?;
                    writeln!(self.out, "      }}")?;
                }
            }

            if let Some(g) = group {
                write!(
                    self.out,
                    "{}",
                    group_exit(
                        g,
                        inst,
                        "      ",
                        "else particle_restore(_particle, &_particle_save); // not SCATTERED in GROUP, restore",
                        "else ABSORBED=1; // not SCATTERED at last GROUP member: absorbed",
                    )
                )?;
            }

            writeln!(self.out, "      _particle->_index++;")?;
            if !inst.skip_transform {
                writeln!(self.out, "      if (!ABSORBED) {{ DEBUG_STATE(); }}")?;
            }
            writeln!(self.out, "    }} /* end component {n} [{i}] */")?;
        }

        for inst in splits.iter().rev() {
            writeln!(self.out, "#ifndef NOSPLIT")?;
            writeln!(self.out, "    }} /* end SPLIT at {} */", inst.name)?;
            writeln!(self.out, "  }} /* if (!ABSORBED) relating to SPLIT at {} */", inst.name)?;
            writeln!(self.out, "#endif")?;
        }

        writeln!(
            self.out,
            "    if (_particle->_index > {}) ABSORBED++; /* absorbed when passed all components */",
            instr.len()
        )?;
        writeln!(self.out, "  }} /* while !ABSORBED */")?;
        writeln!(self.out)?;
        writeln!(self.out, "  DEBUG_LEAVE()")?;
        writeln!(self.out, "  particle_restore(_particle, &_particle_save);")?;
        writeln!(self.out, "  DEBUG_STATE()")?;
        writeln!(self.out)?;
        writeln!(self.out, "  return(_particle->_index);")?;
        writeln!(self.out, "}} /* raytrace */")?;
        writeln!(self.out)?;
        self.raytrace_all()
    }

    /// Opens the loop of a SPLIT: the particle reaching `inst` is copied,
    /// then traced `count` times through the rest of the instrument with a
    /// share of its weight. The loop is closed after the last component.
    fn split_prelude(&mut self, inst: &ComponentInstance, count: &str) -> McResult<()> {
        let n = &inst.name;
        writeln!(self.out, "#ifndef NOSPLIT")?;
        writeln!(self.out, "    /* start SPLIT at {n} */")?;
        writeln!(self.out, "    if (!ABSORBED) {{")?;
        writeln!(self.out, "    _class_particle Split_{n}_particle=*_particle;")?;
        writeln!(self.out, "    int Split_{n}_counter;")?;
        writeln!(self.out, "    int SplitS_{n} = {count};")?;
        writeln!(self.out, "    #pragma acc loop independent")?;
        writeln!(
            self.out,
            "    for (Split_{n}_counter = 0; Split_{n}_counter< SplitS_{n}; Split_{n}_counter++) {{"
        )?;
        writeln!(self.out, "      randstate_t randbackup = *_particle->randstate;")?;
        writeln!(self.out, "      *_particle=Split_{n}_particle;")?;
        writeln!(self.out, "      *_particle->randstate = randbackup;")?;
        writeln!(self.out, "      p /= SplitS_{n} > 0 ? SplitS_{n} : 1;")?;
        writeln!(self.out, "#endif")?;
        Ok(())
    }

    /// Traces `ncount` particles, in batches on accelerators.
    fn raytrace_all(&mut self) -> McResult<()> {
        writeln!(self.out, "void raytrace_all(unsigned long long ncount, unsigned long seed) {{")?;
        writeln!(self.out)?;
        writeln!(self.out, "/* CPU-loop */")?;
        writeln!(self.out, "unsigned long long loops;")?;
        writeln!(self.out, "loops = ceil((double)ncount/gpu_innerloop);")?;
        writeln!(self.out, "/* if on GPU, printf has been globally nullified, re-enable here */")?;
        writeln!(self.out, "{ACC_UNDEFS}")?;
        writeln!(self.out)?;
        writeln!(self.out, "{ACC_LOOPS}")?;
        writeln!(self.out)?;
        writeln!(self.out, "for (unsigned long long cloop=0; cloop<loops; cloop++) {{")?;
        writeln!(self.out, "  if (loops>1) fprintf(stdout, \"%d..\", (int)cloop); fflush(stdout);")?;
        writeln!(self.out)?;
        writeln!(self.out, "  /* if on GPU, re-nullify printf */")?;
        writeln!(self.out, "  #ifdef OPENACC")?;
        writeln!(self.out, "  #define printf(...) noprintf()")?;
        writeln!(self.out, "  #endif")?;
        writeln!(self.out)?;
        writeln!(self.out, "  #pragma acc parallel loop num_gangs(numgangs) vector_length(vecsize)")?;
        writeln!(self.out, "  for (unsigned long pidx=0 ; pidx < gpu_innerloop ; pidx++) {{")?;
        writeln!(self.out, "    _class_particle particleN = mcgenstate(); // initial particle")?;
        writeln!(self.out, "    _class_particle* _particle = &particleN;")?;
        writeln!(self.out, "    particleN._uid = pidx;")?;
        writeln!(self.out, "{MPI_UID}")?;
        writeln!(self.out)?;
        writeln!(self.out, "    srandom(_hash((pidx+1)*(seed+1)));")?;
        writeln!(self.out, "    particle_uservar_init(_particle);")?;
        writeln!(self.out)?;
        writeln!(self.out, "    raytrace(_particle);")?;
        writeln!(self.out, "  }} /* inner for */")?;
        writeln!(self.out, "  seed = seed+gpu_innerloop;")?;
        writeln!(self.out, "}} /* CPU for */")?;
        writeln!(self.out, "/* if on GPU, printf has been globally nullified, re-enable here */")?;
        writeln!(self.out, "{ACC_UNDEFS}")?;
        writeln!(self.out, "MPI_MASTER( printf(\"*** TRACE end *** \\n\"); );")?;
        writeln!(self.out, "}} /* raytrace_all */")?;
        writeln!(self.out)?;
        writeln!(self.out, "#endif //no-FUNNEL")?;
        writeln!(self.out)?;
        Ok(())
    }
}
