//! Lookup of particle fields and component instances by name, used by the
//! runtime library and by component code through macros.
use super::Generator;
use mccode_utils::McResult;
use std::io::Write;

/// Particle fields readable by name, besides the USERVARS.
const READABLE: [&str; 14] = [
    "x", "y", "z", "vx", "vy", "vz", "sx", "sy", "sz", "t", "p", "_mctmp_a",
    "_mctmp_b", "_mctmp_c",
];

/// Particle fields writable by name, besides the USERVARS.
const WRITABLE: [&str; 11] =
    ["x", "y", "z", "vx", "vy", "vz", "sx", "sy", "sz", "p", "t"];

const STR_COMP: &str = r#"#ifdef OPENACC
#pragma acc routine
int str_comp(char *str1, char *str2);
#endif
"#;

const NO_ACC_STR_COMP: &str = r#"#ifndef OPENACC
#define str_comp strcmp
#endif"#;

impl Generator<'_> {
    /// Access to the particle fields: `particle_getvar` and friends,
    /// `particle_restore` and `particle_uservar_init`.
    pub(super) fn particle_accessors(&mut self) -> McResult<()> {
        writeln!(self.out, "/*Generated user variable handlers:*/")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "double particle_getvar(_class_particle *p, char *name, int *suc);")?;
        writeln!(self.out)?;
        writeln!(self.out, "{STR_COMP}")?;
        writeln!(self.out, "double particle_getvar(_class_particle *p, char *name, int *suc){{")?;
        writeln!(self.out, "{NO_ACC_STR_COMP}")?;
        writeln!(self.out, "  int s=1;")?;
        writeln!(self.out, "  double rval=0;")?;
        for field in READABLE {
            writeln!(self.out, "  if(!str_comp(\"{field}\",name)){{rval=p->{field};s=0;}}")?;
        }
        for var in &self.uservars {
            writeln!(
                self.out,
                "  if(!str_comp(\"{0}\",name)){{rval=*( (double *)(&(p->{0})) );s=0;}}",
                var.name
            )?;
        }
        writeln!(self.out, "  if (suc!=0x0) {{*suc=s;}}")?;
        writeln!(self.out, "  return rval;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "void* particle_getvar_void(_class_particle *p, char *name, int *suc);")?;
        writeln!(self.out)?;
        writeln!(self.out, "{STR_COMP}")?;
        writeln!(self.out, "void* particle_getvar_void(_class_particle *p, char *name, int *suc){{")?;
        writeln!(self.out, "{NO_ACC_STR_COMP}")?;
        writeln!(self.out, "  int s=1;")?;
        writeln!(self.out, "  void* rval=0;")?;
        for field in WRITABLE
            .iter()
            .copied()
            .chain(self.uservars.iter().map(|v| v.name.as_str()))
        {
            writeln!(self.out, "  if(!str_comp(\"{field}\",name)){{rval=(void*)&(p->{field});s=0;}}")?;
        }
        writeln!(self.out, "  if (suc!=0x0) {{*suc=s;}}")?;
        writeln!(self.out, "  return rval;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "int particle_setvar_void(_class_particle *, char *, void*);")?;
        writeln!(self.out)?;
        writeln!(self.out, "int particle_setvar_void(_class_particle *p, char *name, void* value){{")?;
        writeln!(self.out, "{NO_ACC_STR_COMP}")?;
        writeln!(self.out, "  int rval=1;")?;
        for field in WRITABLE {
            writeln!(
                self.out,
                "  if(!str_comp(\"{field}\",name)){{memcpy(&(p->{field}), value, sizeof(double)); rval=0;}}"
            )?;
        }
        for var in self.uservars.iter().filter(|v| v.is_scalar()) {
            writeln!(
                self.out,
                "  if(!str_comp(\"{0}\",name)){{memcpy(&(p->{0}), value, sizeof({1})); rval=0;}}",
                var.name, var.ty
            )?;
        }
        writeln!(self.out, "  return rval;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "int particle_setvar_void_array(_class_particle *, char *, void*, int);")?;
        writeln!(self.out)?;
        writeln!(self.out, "int particle_setvar_void_array(_class_particle *p, char *name, void* value, int elements){{")?;
        writeln!(self.out, "{NO_ACC_STR_COMP}")?;
        writeln!(self.out, "  int rval=1;")?;
        for var in self.uservars.iter().filter(|v| !v.is_scalar()) {
            let elem = var.ty.trim_end_matches('*').trim_end();
            writeln!(
                self.out,
                "  if(!str_comp(\"{0}\",name)){{memcpy(&(p->{0}), value, elements * sizeof({1})); rval=0;}}",
                var.name, elem
            )?;
        }
        writeln!(self.out, "  return rval;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "void particle_restore(_class_particle *p, _class_particle *p0);")?;
        writeln!(self.out)?;
        writeln!(self.out, "void particle_restore(_class_particle *p, _class_particle *p0) {{")?;
        writeln!(self.out, "  p->x  = p0->x;  p->y  = p0->y;  p->z  = p0->z;")?;
        writeln!(self.out, "  p->vx = p0->vx; p->vy = p0->vy; p->vz = p0->vz;")?;
        writeln!(self.out, "  p->sx = p0->sx; p->sy = p0->sy; p->sz = p0->sz;")?;
        writeln!(self.out, "  p->t = p0->t;  p->p  = p0->p;")?;
        writeln!(self.out, "  p->_absorbed=0; p->_restore=0;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "double particle_getuservar_byid(_class_particle *p, int id, int *suc){{")?;
        writeln!(self.out, "  int s=1;")?;
        writeln!(self.out, "  double rval=0;")?;
        writeln!(self.out, "  switch(id){{")?;
        for (id, var) in self.uservars.iter().enumerate() {
            writeln!(
                self.out,
                "  case {id}: {{ rval=*( (double *)(&(p->{})) );s=0;break;}}",
                var.name
            )?;
        }
        writeln!(self.out, "  }}")?;
        writeln!(self.out, "  if (suc!=0x0) {{*suc=s;}}")?;
        writeln!(self.out, "  return rval;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "#pragma acc routine")?;
        writeln!(self.out, "void particle_uservar_init(_class_particle *p){{")?;
        for var in &self.uservars {
            let numeric = ["double", "MCNUM", "int"]
                .iter()
                .any(|t| var.ty.contains(t));
            if numeric && var.is_scalar() {
                writeln!(self.out, "  p->{}=0;", var.name)?;
            } else {
                log::warn!(
                    "USERVAR {} is of type {}{} and may need specific per-particle initialisation through an EXTEND block",
                    var.name,
                    var.ty,
                    var.dims
                );
            }
        }
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Functions looking up instances and particle fields by name.
    pub(super) fn lookup_functions(&mut self) -> McResult<()> {
        let instances = &self.ctx.instrument.instances;

        writeln!(self.out, "void* _getvar_parameters(char* compname)")?;
        writeln!(self.out, "/* enables settings parameters based use of the GETPAR macro */")?;
        writeln!(self.out, "{{")?;
        writeln!(self.out, "  #ifdef OPENACC")?;
        writeln!(self.out, "    #define strcmp(a,b) str_comp(a,b)")?;
        writeln!(self.out, "  #endif")?;
        for inst in instances {
            writeln!(
                self.out,
                "  if (!strcmp(compname, \"{0}\")) return (void *) &(_{0}_var._parameters);",
                inst.name
            )?;
        }
        writeln!(self.out, "  return 0;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "void* _get_particle_var(char *token, _class_particle *p)")?;
        writeln!(self.out, "/* enables setpars based use of GET_PARTICLE_DVAR macro and similar */")?;
        writeln!(self.out, "{{")?;
        for var in &self.uservars {
            writeln!(
                self.out,
                "  if (!strcmp(token, \"{0}\")) return (void *) &(p->{0});",
                var.name
            )?;
        }
        writeln!(self.out, "  return 0;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        writeln!(self.out, "int _getcomp_index(char* compname)")?;
        writeln!(self.out, "/* Enables retrieving the component position & rotation when the index is not known.")?;
        writeln!(self.out, " * Component indexing into MACROS, e.g., POS_A_COMP_INDEX, are 1-based! */")?;
        writeln!(self.out, "{{")?;
        for inst in instances {
            writeln!(
                self.out,
                "  if (!strcmp(compname, \"{}\")) return {};",
                inst.name, inst.index
            )?;
        }
        writeln!(self.out, "  return -1;")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        Ok(())
    }
}
