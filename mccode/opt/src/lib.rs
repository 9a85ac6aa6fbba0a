//! Passes over a built instrument.
//!
//! Every pass implements [traversal::Visitor] and is registered with the
//! [pass_manager::PassManager], which runs them in the order given on the
//! command line or by an alias. The default pipeline checks the instrument
//! ([passes::WellFormed], [passes::ResolveJumps]), decides which coordinate
//! transforms can be dropped ([passes::SkipTransforms]) and reports the
//! constructs the funnel driver ignores ([passes::FunnelCheck]).
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod traversal;
