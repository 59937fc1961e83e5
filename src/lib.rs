pub mod backend;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod net;
pub mod session;
pub mod tls;
pub mod wire_protocol;

pub use config::{CliArgs, Config, ConfigError, NegotiationPolicy};
pub use errors::{ErrorKind, ProxyError, Side};
pub use session::{ProxyServer, ProxySession, SessionState};
