//! Tooling & Integration Layer
//!
//! Command-line entry points over the table service.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
