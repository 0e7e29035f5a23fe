//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod plugins;
pub mod status;
pub mod watch;
