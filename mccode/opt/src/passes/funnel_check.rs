use crate::traversal::{
    Action, DiagnosticContext, DiagnosticPass, Named, VisResult, Visitor,
};
use mccode_ir::{ComponentDefinition, ComponentInstance, Context};
use mccode_utils::Error;

/// Warn about every instance carrying a JUMP. The funnel driver runs
/// batches of particles through runs of instances and ignores JUMPs.
#[derive(Default)]
pub struct FunnelCheck {
    diag: DiagnosticContext,
}

impl Named for FunnelCheck {
    fn name() -> &'static str {
        "funnel-check"
    }

    fn description() -> &'static str {
        "Warn about constructs the funnel driver ignores"
    }
}

impl DiagnosticPass for FunnelCheck {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl Visitor for FunnelCheck {
    fn precondition(ctx: &Context) -> Option<String> {
        ctx.instrument
            .instances
            .iter()
            .all(|inst| inst.jumps.is_empty())
            .then(|| "instrument has no JUMP".to_string())
    }

    fn instance(
        &mut self,
        inst: &mut ComponentInstance,
        _def: &ComponentDefinition,
    ) -> VisResult {
        if !inst.jumps.is_empty() {
            self.diag.warning(
                Error::misc(format!(
                    "JUMP found at COMPONENT {}, {}. JUMPS are not supported in FUNNEL mode and are ignored",
                    inst.index, inst.name
                ))
                .with_pos(inst),
            );
        }
        Ok(Action::Continue)
    }
}
