//! CLI module
//!
//! Command-line interface for running extractions.
//!
//! # Commands
//!
//! - `check` - Test connection to the source database
//! - `streams` - List tables
//! - `discover` - Describe one table's columns
//! - `read` - Extract configured streams incrementally
//! - `validate` - Validate the source configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
