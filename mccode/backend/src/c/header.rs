//! Start of the generated program: build switches, the particle structure
//! and the runtime library.
use super::{c_quote, Generator, RUNTIME_HEADER};
use mccode_utils::{Error, McResult};
use std::io::Write;

pub const MCCODE_STRING: &str =
    concat!("McStas ", env!("CARGO_PKG_VERSION"), " (mccode)");
const FLAVOR: &str = "mcstas";
/// Environment variable naming the library root in the generated program.
const LIBENV: &str = "MCSTAS";

const TYPES: &str = r#"
#include <string.h>
#include <inttypes.h>

typedef double MCNUM;
typedef struct {MCNUM x, y, z;} Coords;
typedef MCNUM Rotation[3][3];
#define MCCODE_BASE_TYPES

/* available random number generators */
#define _RNG_ALG_MT         1
#define _RNG_ALG_KISS       2
/* selection of random number generator */
#ifndef RNG_ALG
#  define RNG_ALG  _RNG_ALG_KISS
#endif
#if RNG_ALG == _RNG_ALG_MT // MT
#define randstate_t uint32_t
#elif RNG_ALG == _RNG_ALG_KISS  // KISS
#define randstate_t uint64_t
#endif

#ifndef MC_NUSERVAR
#define MC_NUSERVAR 10
#endif
"#;

const PARTICLE_STATE: &str = r#"struct _struct_particle {
  double x,y,z; /* position [m] */
  double vx,vy,vz; /* velocity [m/s] */
  double sx,sy,sz; /* spin [0-1] */
  int mcgravitation; /* gravity-state */
  void *mcMagnet;    /* precession-state */
  int allow_backprop; /* allow backprop */
  /* Generic Temporaries: */
  /* May be used internally by components e.g. for special */
  /* return-values from functions used in trace, thus returned via */
  /* particle struct. */
  double _mctmp_a; /* temp a */
  double _mctmp_b; /* temp b */
  double _mctmp_c; /* temp c */
  randstate_t randstate[7];
  double t, p;     /* time, event weight */
  long long _uid;  /* Unique event ID */
  long _index;     /* component index where to send this event */
  long _absorbed;  /* flag set to TRUE when this event is to be removed/ignored */
  long _scattered; /* flag set to TRUE when this event has interacted with the last component instance */
  long _restore;   /* set to true if neutron event must be restored */
  long flag_nocoordschange;   /* set to true if particle is jumping */
  struct particle_logic_struct _logic;"#;

const PARTICLE_STATE_FUNCTIONS: &str = r#"typedef struct _struct_particle _class_particle;

_class_particle _particle_global_randnbuse_var;
_class_particle* _particle = &_particle_global_randnbuse_var;

#pragma acc routine
_class_particle mcgenstate(void);
#pragma acc routine
_class_particle mcsetstate(double x, double y, double z, double vx, double vy, double vz,
                           double t, double sx, double sy, double sz, double p, int mcgravitation, void *mcMagnet, int mcallowbackprop);
#pragma acc routine
_class_particle mcgetstate(_class_particle mcneutron, double *x, double *y, double *z,
                           double *vx, double *vy, double *vz, double *t,
                           double *sx, double *sy, double *sz, double *p);

extern int mcgravitation;      /* flag to enable gravitation */
#pragma acc declare create ( mcgravitation )
int mcallowbackprop;
#pragma acc declare create ( mcallowbackprop )

_class_particle mcgenstate(void) {
  _class_particle particle = mcsetstate(0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, mcgravitation, NULL, mcallowbackprop);
  return(particle);
}"#;

impl Generator<'_> {
    /// The library root as written in the generated program.
    fn sys_dir(&self) -> String {
        let sep = std::path::MAIN_SEPARATOR.to_string().replace('\\', "\\\\");
        let dir = self
            .ctx
            .workspace
            .lib_path
            .as_ref()
            .map(|p| p.to_string_lossy().replace('\\', "\\\\"))
            .unwrap_or_default();
        format!("{dir}{sep}")
    }

    pub(super) fn header(&mut self) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        let bc = &ctx.bc;
        log::info!("Writing header of instrument `{}'", instr.name);

        writeln!(self.out, "/* Automatically generated file. Do not edit.")?;
        writeln!(self.out, " * Format:     ANSI C source code")?;
        writeln!(self.out, " * Creator:    McStas <http://www.mcstas.org>")?;
        writeln!(self.out, " * Instrument: {} ({})", instr.source, instr.name)?;
        writeln!(self.out, " * File:       {}", self.output_name)?;
        writeln!(self.out, " * CFLAGS={}", instr.dependency)?;
        writeln!(self.out, " */")?;
        writeln!(self.out)?;
        writeln!(self.out, "#ifndef WIN32")?;
        writeln!(self.out, "#  ifndef OPENACC")?;
        writeln!(self.out, "#    define _GNU_SOURCE")?;
        writeln!(self.out, "#  endif")?;
        writeln!(self.out, "#  define _POSIX_C_SOURCE 200809L")?;
        writeln!(self.out, "#endif")?;
        writeln!(self.out, "/* In case of cl.exe on Windows, supppress warnings about #pragma acc */")?;
        writeln!(self.out, "#ifdef _MSC_EXTENSIONS")?;
        writeln!(self.out, "#pragma warning(disable: 4068)")?;
        writeln!(self.out, "#endif")?;
        writeln!(self.out)?;
        writeln!(self.out, "#define MCCODE_STRING \"{MCCODE_STRING}\"")?;
        writeln!(self.out, "#define FLAVOR        \"{FLAVOR}\"")?;
        writeln!(self.out, "#define FLAVOR_UPPER  \"{}\"", FLAVOR.to_uppercase())?;
        writeln!(self.out)?;
        if bc.default_main {
            writeln!(self.out, "#define MC_USE_DEFAULT_MAIN")?;
        }
        if bc.trace {
            writeln!(self.out, "#define MC_TRACE_ENABLED")?;
        }
        if bc.portable {
            writeln!(self.out, "#define MC_PORTABLE")?;
        }
        writeln!(self.out, "{TYPES}")?;

        self.particle()?;
        self.particle_accessors()?;
        self.runtime()?;

        writeln!(self.out)?;
        writeln!(self.out, "/* *****************************************************************************")?;
        writeln!(self.out, "* Start of instrument '{}' generated code", instr.name)?;
        writeln!(self.out, "***************************************************************************** */")?;
        writeln!(self.out)?;
        writeln!(self.out, "#ifdef MC_TRACE_ENABLED")?;
        writeln!(self.out, "int traceenabled = 1;")?;
        writeln!(self.out, "#else")?;
        writeln!(self.out, "int traceenabled = 0;")?;
        writeln!(self.out, "#endif")?;
        writeln!(self.out, "#define {LIBENV} \"{}\"", self.sys_dir())?;
        writeln!(self.out, "int   defaultmain         = {};", i32::from(bc.default_main))?;
        writeln!(self.out, "char  instrument_name[]   = \"{}\";", instr.name)?;
        writeln!(self.out, "char  instrument_source[] = \"{}\";", c_quote(&instr.source))?;
        writeln!(self.out, "char *instrument_exe      = NULL; /* will be set to argv[0] in main */")?;
        writeln!(
            self.out,
            "char  instrument_code[]   = \"Instrument {} source code {} is not embedded in this executable.\\n  Use --source option when running McStas.\\n\";",
            instr.name,
            c_quote(&instr.source)
        )?;
        writeln!(self.out)?;
        if bc.default_main {
            writeln!(self.out, "int main(int argc, char *argv[]){{return mccode_main(argc, argv);}}")?;
        }
        Ok(())
    }

    /// The particle structure, with a counter per iterating JUMP and the
    /// USERVARS fields.
    fn particle(&mut self) -> McResult<()> {
        writeln!(self.out, "/* Particle JUMP control logic */")?;
        writeln!(self.out, "struct particle_logic_struct {{")?;
        writeln!(self.out, "int dummy;")?;
        for inst in &self.instr().instances {
            for jump in inst.jumps.iter().filter(|j| j.iterate) {
                writeln!(
                    self.out,
                    "  long {}; /* the JUMP connection <from>_<to> */",
                    jump.counter_name(inst.name)
                )?;
            }
        }
        writeln!(self.out, "}};")?;
        writeln!(self.out)?;

        writeln!(self.out, "{PARTICLE_STATE}")?;
        if !self.uservars.is_empty() {
            writeln!(self.out, "  // user variables and comp-injections:")?;
            for var in &self.uservars {
                writeln!(self.out, "  {}", var.member())?;
            }
        }
        writeln!(self.out, "}};")?;
        writeln!(self.out, "{PARTICLE_STATE_FUNCTIONS}")?;
        Ok(())
    }

    /// Copy the runtime library in, or `#include` it.
    fn runtime(&mut self) -> McResult<()> {
        if self.ctx.bc.embed_runtime {
            writeln!(self.out, "#define MC_EMBEDDED_RUNTIME")?;
            for name in RUNTIME_HEADER {
                self.out.embed(name).map_err(|err| {
                    Error::fatal(format!("Cannot embed runtime file `{name}': {err}"))
                })?;
            }
        } else {
            for name in RUNTIME_HEADER.iter().filter(|n| n.ends_with(".h")) {
                let path = self.out.include_path(name);
                writeln!(self.out, "#include \"{path}\"")?;
            }
            log::info!(
                "To build instrument `{}', compile and link with the runtime library in {}share",
                self.instr().source,
                self.sys_dir()
            );
        }
        Ok(())
    }
}
