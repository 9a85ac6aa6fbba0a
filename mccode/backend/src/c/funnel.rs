//! `raytrace_all_funnel`: traces a whole batch of particles component by
//! component. Runs of CPU-only components leave the accelerator loop, and
//! a SPLIT regroups the live particles in front of the batch.
use super::{
    raytrace::{group_exit, ABSORB_IN_DRIVER, ACC_LOOPS, ACC_UNDEFS, MPI_UID},
    Generator,
};
use mccode_utils::McResult;
use std::io::Write;

const PARTITION_LIVE: &str = r#"/* Move the particles still alive to the front of the batch, keeping their
   order. Returns the number of particles alive. */
long mc_partition_live(_class_particle* particles, _class_particle* pbuffer, long livebatchsize) {
  long live = 0;
  long dead = 0;
  for (long i = 0; i < livebatchsize; i++) {
    if (!particles[i]._absorbed) particles[live++] = particles[i];
    else pbuffer[dead++] = particles[i];
  }
  for (long i = 0; i < dead; i++) particles[live + i] = pbuffer[i];
  return live;
}
"#;

impl Generator<'_> {
    pub(super) fn funnel(&mut self) -> McResult<()> {
        let ctx = self.ctx;
        let instr = &ctx.instrument;
        log::info!("Writing funnel driver of `{}'", instr.name);

        writeln!(self.out, "#ifdef FUNNEL")?;
        writeln!(self.out, "// Alternative raytrace algorithm which iterates all particles through")?;
        writeln!(self.out, "// one component at the time, can remove absorbs from the next loop and")?;
        writeln!(self.out, "// switch between cpu/gpu.")?;
        writeln!(self.out, "{PARTITION_LIVE}")?;
        writeln!(self.out, "void raytrace_all_funnel(unsigned long long ncount, unsigned long seed) {{")?;
        writeln!(self.out)?;
        writeln!(self.out, "  // set up outer (CPU) loop / particle batches")?;
        writeln!(self.out, "  unsigned long long loops;")?;
        writeln!(self.out)?;
        writeln!(self.out, "  /* if on GPU, printf has been globally nullified, re-enable here */")?;
        writeln!(self.out, "{ACC_UNDEFS}")?;
        for inst in instr.instances.iter().filter(|i| !i.jumps.is_empty()) {
            writeln!(
                self.out,
                "  printf(\"\\nWARNING:\\n --> JUMP found at COMPONENT {}, {}\\n\");",
                inst.index, inst.name
            )?;
            writeln!(self.out, "  printf(\" --> JUMPS are not supported in FUNNEL mode and are ignored\\n\");")?;
            writeln!(self.out, "  printf(\" --> Please compile without -DFUNNEL to use JUMP\\n\\n\");")?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "  loops = ceil((double)ncount/gpu_innerloop);")?;
        writeln!(self.out, "{ACC_LOOPS}")?;
        writeln!(self.out)?;
        writeln!(self.out, "  // create particles struct and pointer arrays (same memory used by all batches)")?;
        writeln!(self.out, "  _class_particle* particles = malloc(gpu_innerloop*sizeof(_class_particle));")?;
        writeln!(self.out, "  _class_particle* pbuffer = malloc(gpu_innerloop*sizeof(_class_particle));")?;
        writeln!(self.out, "  long livebatchsize = gpu_innerloop;")?;
        writeln!(self.out)?;
        writeln!(self.out, "{ABSORB_IN_DRIVER}")?;
        writeln!(self.out)?;
        writeln!(self.out, "  // outer loop / particle batches")?;
        writeln!(self.out, "  for (unsigned long long cloop=0; cloop<loops; cloop++) {{")?;
        writeln!(self.out, "    if (loops>1) fprintf(stdout, \"%d..\", (int)cloop); fflush(stdout);")?;
        writeln!(self.out, "    livebatchsize = gpu_innerloop;")?;
        writeln!(self.out)?;
        writeln!(self.out, "    // init particles")?;
        writeln!(self.out, "    #pragma acc parallel loop present(particles[0:livebatchsize])")?;
        writeln!(self.out, "    for (unsigned long pidx=0 ; pidx < livebatchsize ; pidx++) {{")?;
        writeln!(self.out, "      // generate particle state, set loop index and seed")?;
        writeln!(self.out, "      particles[pidx] = mcgenstate();")?;
        writeln!(self.out, "      _class_particle* _particle = particles + pidx;")?;
        writeln!(self.out, "      _particle->_uid = pidx;")?;
        writeln!(self.out, "{MPI_UID}")?;
        writeln!(self.out, "      srandom(_hash((pidx+1)*(seed+1))); // _particle->state usage built into srandom macro")?;
        writeln!(self.out, "      particle_uservar_init(_particle);")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out)?;

        let mut cpu = false;
        for (pos, (inst, def)) in ctx.instances().enumerate() {
            let n = &inst.name;
            let first = pos == 0;
            let changed = inst.cpuonly != cpu;
            let split = inst.split.is_some();
            cpu = inst.cpuonly;
            if def.noacc {
                writeln!(self.out, "    #define JUMP_FUNNEL")?;
            }
            if !first && (changed || split) {
                writeln!(self.out, "    }}")?;
            }
            if split {
                writeln!(self.out, "    // SPLIT at {n}: regroup the live particles in front of the batch")?;
                writeln!(self.out, "    long mult_{n};")?;
                writeln!(self.out, "    livebatchsize = mc_partition_live(particles, pbuffer, livebatchsize);")?;
            }
            if first || changed || split {
                if inst.cpuonly {
                    writeln!(self.out, "    #ifdef MULTICORE")?;
                    writeln!(self.out, "    #pragma acc parallel loop device_type(host)")?;
                    writeln!(self.out, "    #endif")?;
                } else {
                    writeln!(self.out, "    #pragma acc parallel loop present(particles[0:livebatchsize])")?;
                }
                writeln!(self.out, "    for (unsigned long pidx=0 ; pidx < livebatchsize ; pidx++) {{")?;
                writeln!(self.out, "      _class_particle* _particle = &particles[pidx];")?;
                writeln!(self.out, "      _class_particle _particle_save;")?;
            }
            writeln!(self.out)?;
            writeln!(self.out, "      // {n}")?;
            writeln!(self.out, "      if (!ABSORBED && _particle->_index == {}) {{", inst.index)?;
            if !inst.skip_transform {
                writeln!(self.out, "#ifndef MULTICORE")?;
                writeln!(self.out, "        if (_{n}_var._rotation_is_identity)")?;
                writeln!(self.out, "          coords_get(coords_add(coords_set(x,y,z), _{n}_var._position_relative),&x, &y, &z);")?;
                writeln!(self.out, "        else")?;
                writeln!(self.out, "#endif")?;
                writeln!(self.out, "          mccoordschange(_{n}_var._position_relative, _{n}_var._rotation_relative, _particle);")?;
                writeln!(self.out, "        _particle_save = *_particle;")?;
            }
            if !def.trace.is_empty() || !inst.extend.is_empty() {
                if let Some(when) = &inst.when {
                    writeln!(self.out, "        if (({when})) // conditional WHEN")?;
                }
                writeln!(self.out, "        class_{}_trace(&_{n}_var, _particle);", def.name)?;
                writeln!(self.out, "        if (_particle->_restore)")?;
                writeln!(self.out, "          particle_restore(_particle, &_particle_save);")?;
            }
            if let Some(g) = inst.group.map(|g| instr.group(g)) {
                write!(
                    self.out,
                    "{}",
                    group_exit(
                        g,
                        inst,
                        "        ",
                        "else ABSORBED=0; // not SCATTERED within GROUP: always tries next",
                        "else ABSORBED=1; // not SCATTERED at last GROUP member: absorbed",
                    )
                )?;
            }
            writeln!(self.out, "        _particle->_index++;")?;
            writeln!(self.out, "      }}")?;
        }
        if !instr.is_empty() {
            writeln!(self.out, "    }}")?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "    // jump to next viable seed")?;
        writeln!(self.out, "    seed = seed + gpu_innerloop;")?;
        writeln!(self.out, "  }} // outer loop / particle batches")?;
        writeln!(self.out)?;
        writeln!(self.out, "  free(particles);")?;
        writeln!(self.out, "  free(pbuffer);")?;
        writeln!(self.out)?;
        writeln!(self.out, "  printf(\"\\n\");")?;
        writeln!(self.out, "}} /* raytrace_all_funnel */")?;
        writeln!(self.out, "#endif // FUNNEL")?;
        writeln!(self.out)?;
        Ok(())
    }
}
