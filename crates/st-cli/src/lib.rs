//! Sticky auto-pause timer CLI library.
//!
//! This crate provides the CLI interface around the `st-core` engine: config
//! loading, a shell-command action sink and the `run` loop.

mod cli;
pub mod commands;
mod config;
pub mod sink;

pub use cli::{Cli, Commands};
pub use config::{ActionsConfig, Config};
