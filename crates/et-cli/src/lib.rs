//! Engagement tracker CLI library.
//!
//! This crate provides the CLI interface for the engagement tracker and the
//! tokio adapters that drive the session lifecycle.

mod cli;
pub mod commands;
mod config;
pub mod input;
pub mod runtime;

pub use cli::{Cli, Commands};
pub use config::{Config, settings_file_path};
