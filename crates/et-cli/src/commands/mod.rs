//! CLI subcommand implementations.

pub mod clear;
pub mod configure;
pub mod flush;
pub mod run;
pub mod sessions;
pub mod status;
