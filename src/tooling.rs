//! Tooling & Integration Layer
//!
//! Command-line access to a registry backed by plain directories.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
