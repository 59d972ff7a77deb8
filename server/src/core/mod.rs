//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::CliConfig;
pub use config::{AppConfig, AuthConfig, AuthMode, IngestConfig, ServerConfig};
pub use shutdown::{Drain, ShutdownService};
