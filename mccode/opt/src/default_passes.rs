//! Defines the default passes available to [PassManager].
use crate::passes::{FunnelCheck, ResolveJumps, SkipTransforms, WellFormed};
use crate::traversal::Named;
use crate::{
    pass_manager::{PassManager, PassResult},
    register_alias,
};

impl PassManager {
    pub fn default_passes() -> PassResult<Self> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Validation passes
        pm.register_diagnostic::<WellFormed>()?;
        pm.register_diagnostic::<ResolveJumps>()?;

        // Analysis passes
        pm.register_pass::<SkipTransforms>()?;
        pm.register_diagnostic::<FunnelCheck>()?;

        register_alias!(pm, "validate", [WellFormed, ResolveJumps]);
        register_alias!(pm, "all", ["validate", SkipTransforms, FunnelCheck]);

        Ok(pm)
    }
}
