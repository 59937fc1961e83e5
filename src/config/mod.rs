pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod file;
pub mod types;

pub use cli::CliArgs;
pub use config::{Config, ConfigError, resolve_secret};
pub use types::{LogLevel, NegotiationPolicy};
