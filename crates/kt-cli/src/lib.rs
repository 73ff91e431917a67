//! Keystroke statistics CLI library.
//!
//! This crate provides the `kt` command-line interface over the aggregation
//! engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
