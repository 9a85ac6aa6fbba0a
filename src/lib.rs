//! # The McCode Compiler
//!
//! This crate plumbs together the McCode compiler crates and provides the
//! command-line interface of the compiler.
//! You SHOULD NOT depend on this crate. Depend on the crates it is made of
//! instead: [`mccode_frontend`], [`mccode_ir`], [`mccode_opt`] and
//! [`mccode_backend`].
pub mod cmdline;
pub mod driver;
