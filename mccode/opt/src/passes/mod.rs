//! Passes run on a built instrument before code generation.
mod funnel_check;
mod resolve_jumps;
mod skip_transforms;
mod well_formed;

pub use funnel_check::FunnelCheck;
pub use resolve_jumps::ResolveJumps;
pub use skip_transforms::SkipTransforms;
pub use well_formed::WellFormed;
