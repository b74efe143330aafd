//! CLI module for the imgly-text-behind binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod progress;

pub use main_impl::{main, Cli, Command, ComposeArgs, ModelArgs};

#[cfg(feature = "web")]
pub use main_impl::ServeArgs;
