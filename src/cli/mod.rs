//! Command-line interface for docdex.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::{Cli, Commands};
