//! CLI module for catalog-harmonize
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod progress;

pub use main_impl::{main, Cli, CliOutputFormat, Command, LogFormat};
pub use progress::IndicatifProgressReporter;
