//! Implements a visitor for the instances of an instrument.
//! Passes implemented as a Visitor are directly invoked on a [`Context`] and
//! see every [`ComponentInstance`] in declaration order.
use super::action::{Action, VisResult};
use super::{ConstructVisitor, Named};
use mccode_ir::{ComponentDefinition, ComponentInstance, Context};
use mccode_utils::McResult;

/// The visiting interface for an instrument.
/// 1. [Visitor::start] is called once before any instance is seen.
/// 2. [Visitor::instance] is called for every instance, in declaration order.
/// 3. [Visitor::finish] is called once after the last instance.
///
/// A pass will usually override one or more of these and rely on the
/// default traversal to do the rest.
pub trait Visitor {
    /// Precondition for this pass to run on the program. If this function
    /// returns None, the pass triggers. Otherwise it aborts and logs the
    /// string as the reason.
    fn precondition(_ctx: &Context) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// Executed before the traversal begins.
    fn start(&mut self, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed for every instance. `def` is the definition of its type.
    fn instance(
        &mut self,
        _inst: &mut ComponentInstance,
        _def: &ComponentDefinition,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after the traversal ends.
    fn finish(&mut self, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    /// Define the traversal over an instrument.
    /// Calls [Visitor::start], visits each instance, and finally calls
    /// [Visitor::finish].
    fn traverse(&mut self, ctx: &mut Context) -> McResult<()>
    where
        Self: Sized,
    {
        self.start(ctx)?
            .and_then(|| {
                let Context {
                    instrument,
                    definitions,
                    ..
                } = &mut *ctx;
                for inst in instrument.instances.iter_mut() {
                    let def = &definitions[inst.def];
                    if let Action::Stop = self.instance(inst, def)? {
                        return Ok(Action::Stop);
                    }
                }
                Ok(Action::Continue)
            })?
            .and_then(|| self.finish(ctx))?;
        Ok(())
    }

    /// Run the visitor on a given [`Context`].
    fn do_pass(&mut self, context: &mut Context) -> McResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(msg) = Self::precondition(&*context) {
            log::info!("Skipping `{}': {msg}", Self::name());
            return Ok(());
        }
        self.traverse(context)
    }

    /// Build a [Default] implementation of this pass and call
    /// [Visitor::do_pass] using it.
    #[inline(always)]
    fn do_pass_default(context: &mut Context) -> McResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*context)?;
        visitor.do_pass(context)?;
        Ok(visitor)
    }
}
