use crate::traversal::{
    Action, DiagnosticContext, DiagnosticPass, Named, VisResult, Visitor,
};
use mccode_ir::{
    ComponentDefinition, ComponentInstance, Context, InstIdx, JumpTarget,
};
use mccode_utils::{Error, Id};
use std::collections::HashMap;

/// Resolve the target of every JUMP to an absolute instance index.
///
/// Relative targets (`PREVIOUS`, `NEXT`, `MYSELF`) were resolved when the
/// instance was built; named targets may refer to instances declared later
/// and are looked up here, once the whole list is known. Every target must
/// fall in `1..=N`.
#[derive(Default)]
pub struct ResolveJumps {
    /// Instance names. With duplicate names, the first instance.
    names: HashMap<Id, InstIdx>,
    /// Number of instances.
    count: usize,
    diag: DiagnosticContext,
}

impl Named for ResolveJumps {
    fn name() -> &'static str {
        "resolve-jumps"
    }

    fn description() -> &'static str {
        "Resolve JUMP targets to instance indices"
    }
}

impl DiagnosticPass for ResolveJumps {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl Visitor for ResolveJumps {
    fn precondition(ctx: &Context) -> Option<String> {
        ctx.instrument
            .instances
            .iter()
            .all(|inst| inst.jumps.is_empty())
            .then(|| "instrument has no JUMP".to_string())
    }

    fn start(&mut self, ctx: &mut Context) -> VisResult {
        self.count = ctx.instrument.len();
        for inst in &ctx.instrument.instances {
            self.names.entry(inst.name).or_insert(inst.index);
        }
        Ok(Action::Continue)
    }

    fn instance(
        &mut self,
        inst: &mut ComponentInstance,
        _def: &ComponentDefinition,
    ) -> VisResult {
        for jump in inst.jumps.iter_mut() {
            if let JumpTarget::Named(target) = &jump.target {
                match self.names.get(target) {
                    Some(idx) => jump.target_index = Some(*idx),
                    None => {
                        self.diag.err(
                            Error::undefined(*target, "JUMP target")
                                .with_pos(&*jump),
                        );
                        continue;
                    }
                }
            }
            let in_range = jump
                .target_index
                .is_some_and(|idx| (1..=self.count).contains(&idx.get()));
            if !in_range {
                self.diag.err(
                    Error::misc(format!(
                        "JUMP {} of component {} does not refer to a component instance",
                        jump.target.label(),
                        inst.name
                    ))
                    .with_pos(&*jump),
                );
                jump.target_index = None;
            } else if let Some(idx) = jump.target_index {
                log::debug!(
                    "JUMP {} of {} resolved to {idx}",
                    jump.target.label(),
                    inst.name
                );
            }
        }
        Ok(Action::Continue)
    }
}
