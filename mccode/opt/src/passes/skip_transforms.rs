use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use mccode_ir::{ComponentDefinition, ComponentInstance, Context, InstIdx};
use mccode_utils::{McResult, OutputFile};
use std::collections::HashSet;
use std::io::Write;

/// Marks the instances whose coordinate transform can be left out of the
/// generated raytrace loop.
///
/// Every instance starts out skippable. An instance must apply its
/// transform when:
/// 1. its type has TRACE code, or it carries an EXTEND block;
/// 2. it is the source of a JUMP;
/// 3. it is the target of a JUMP.
///
/// Jump targets must be resolved first (see `resolve-jumps`).
pub struct SkipTransforms {
    /// Never skip a transform.
    keep_all: bool,
    /// Where to write the table of skipped instances.
    report: Option<OutputFile>,
    /// Targets of the jumps seen so far.
    targets: HashSet<InstIdx>,
}

impl Named for SkipTransforms {
    fn name() -> &'static str {
        "skip-transforms"
    }

    fn description() -> &'static str {
        "Find instances whose coordinate transform is redundant"
    }

    fn opts() -> Vec<PassOpt> {
        vec![
            PassOpt::new(
                "keep-all",
                "Apply the transform of every instance",
                ParseVal::Bool(false),
                PassOpt::parse_bool,
            ),
            PassOpt::new(
                "report",
                "Write which instances skip their transform",
                ParseVal::OutStream(OutputFile::Null),
                PassOpt::parse_outstream,
            ),
        ]
    }
}

impl ConstructVisitor for SkipTransforms {
    fn from(ctx: &Context) -> McResult<Self>
    where
        Self: Sized,
    {
        let opts = Self::get_opts(ctx);
        Ok(SkipTransforms {
            keep_all: opts["keep-all"].bool(),
            report: opts["report"].not_null_outstream(),
            targets: HashSet::new(),
        })
    }
}

impl SkipTransforms {
    fn write_report(out: &OutputFile, ctx: &Context) -> McResult<()> {
        let mut w = out.clone().get_write()?;
        for inst in &ctx.instrument.instances {
            writeln!(
                w,
                "{:>4} {:<24} {}",
                inst.index.get(),
                inst.name.as_str(),
                if inst.skip_transform { "skip" } else { "transform" }
            )?;
        }
        w.flush()?;
        Ok(())
    }
}

impl Visitor for SkipTransforms {
    fn start(&mut self, ctx: &mut Context) -> VisResult {
        let skip = !self.keep_all;
        for inst in ctx.instrument.instances.iter_mut() {
            inst.skip_transform = skip;
        }
        if self.keep_all {
            log::info!("Keeping the coordinate transform of every instance");
            return Ok(Action::Stop);
        }
        Ok(Action::Continue)
    }

    fn instance(
        &mut self,
        inst: &mut ComponentInstance,
        def: &ComponentDefinition,
    ) -> VisResult {
        if !def.trace.is_empty() || !inst.extend.is_empty() {
            inst.skip_transform = false;
        }
        if !inst.jumps.is_empty() {
            inst.skip_transform = false;
            self.targets
                .extend(inst.jumps.iter().filter_map(|j| j.target_index));
        }
        Ok(Action::Continue)
    }

    fn finish(&mut self, ctx: &mut Context) -> VisResult {
        for target in &self.targets {
            if target.get() <= ctx.instrument.len() {
                ctx.instrument.get_mut(*target).skip_transform = false;
            }
        }
        let skipped = ctx
            .instrument
            .instances
            .iter()
            .filter(|inst| inst.skip_transform)
            .count();
        log::info!(
            "{skipped} of {} instances skip their coordinate transform",
            ctx.instrument.len()
        );
        if let Some(out) = &self.report {
            Self::write_report(out, ctx)?;
        }
        Ok(Action::Continue)
    }
}
