use std::path::PathBuf;

use clap::Parser;

use super::types::{LogLevel, NegotiationPolicy};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Read by the config layer, never by the proxy core.
pub const PASSWORD_ENV: &str = "PGSSL_PASSWORD";

// -----------------------------------------------------------------------------
// ----- CliArgs ---------------------------------------------------------------

#[derive(Parser, Debug, Default)]
#[command(
    name = "pgssl",
    version,
    about = "Postgres proxy that always speaks TLS to the backend"
)]
pub struct CliArgs {
    /// Listen address (default 127.0.0.1:15432).
    #[arg(long = "listen", short = 'l', env = "PGSSL_LISTEN")]
    pub listen: Option<String>,

    /// Postgres address, host:port.
    #[arg(long = "postgres", short = 'p', env = "PGSSL_BACKEND")]
    pub backend: Option<String>,

    /// Client certificate presented to the backend (PEM). Needs --client-key.
    #[arg(long = "client-cert", short = 'c', env = "PGSSL_CLIENT_CERT")]
    pub client_cert: Option<PathBuf>,

    /// Private key for --client-cert (PEM).
    #[arg(long = "client-key", short = 'k', env = "PGSSL_CLIENT_KEY")]
    pub client_key: Option<PathBuf>,

    /// Password used to authenticate to pgssl; can alternatively be
    /// specified via the PGSSL_PASSWORD environment variable.
    #[arg(long = "password", short = 's')]
    pub password: Option<String>,

    /// What to do when a client asks for SSL itself.
    #[arg(long = "ssl-policy", env = "PGSSL_SSL_POLICY", value_enum)]
    pub ssl_policy: Option<NegotiationPolicy>,

    /// CA bundle used to verify the backend certificate. Without it the
    /// backend certificate is not verified.
    #[arg(long = "backend-ca", env = "PGSSL_BACKEND_CA")]
    pub backend_ca: Option<PathBuf>,

    /// Give up dialing the backend after this long (e.g. 5s, 500ms).
    #[arg(long = "connect-timeout", env = "PGSSL_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<humantime::Duration>,

    /// Optional TOML file; flags and env vars override it.
    #[arg(long = "config", env = "PGSSL_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    #[arg(long = "log", default_value = "info", value_enum)]
    pub log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
