use secrecy::SecretString;
use std::{
    net::{AddrParseError, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tracing::warn;

use super::{
    cli::{CliArgs, PASSWORD_ENV},
    file::ConfigFile,
    types::{LogLevel, NegotiationPolicy},
};
use crate::backend::InvalidBackendAddress;
use crate::tls::{BackendTrust, ClientIdentity, TlsSetupError};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:15432";

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

/// Everything a proxy instance needs, resolved once at startup and then
/// shared read-only by every session.
#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend_addr: String,
    pub client_identity: Option<Arc<ClientIdentity>>,
    pub negotiation_policy: NegotiationPolicy,
    /// Carried for the embedding application; the session never reads it.
    pub backend_auth_secret: Option<SecretString>,
    pub backend_trust: BackendTrust,
    pub connect_timeout: Option<Duration>,
    pub log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    pub fn new(backend_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 15432)),
            backend_addr: backend_addr.into(),
            client_identity: None,
            negotiation_policy: NegotiationPolicy::default(),
            backend_auth_secret: None,
            backend_trust: BackendTrust::SkipVerify,
            connect_timeout: None,
            log_level: LogLevel::default(),
        }
    }

    /// Flags, then the environment, then the config file, then defaults.
    pub async fn load(args: CliArgs) -> Result<Self, ConfigError> {
        let env_password = std::env::var(PASSWORD_ENV).ok();
        Self::from_sources(args, env_password).await
    }

    pub async fn from_sources(
        args: CliArgs,
        env_password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match &args.config_file {
            Some(path) => ConfigFile::from_file_async(path).await?,
            None => ConfigFile::default(),
        };

        let backend_addr = args
            .backend
            .or(file.backend)
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(ConfigError::MissingBackend)?;

        let listen = args
            .listen
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidListenAddress {
                value: listen.clone(),
                source,
            })?;

        let client_cert = args.client_cert.or(file.client_cert);
        let client_key = args.client_key.or(file.client_key);
        let client_identity = load_identity(client_cert, client_key)?;

        let backend_trust = match args.backend_ca.or(file.backend_ca) {
            Some(path) => BackendTrust::from_ca_file(&path)?,
            None => BackendTrust::SkipVerify,
        };

        Ok(Self {
            listen_addr,
            backend_addr,
            client_identity,
            negotiation_policy: args.ssl_policy.or(file.ssl_policy).unwrap_or_default(),
            backend_auth_secret: resolve_secret(args.password, env_password),
            backend_trust,
            connect_timeout: args.connect_timeout.map(Duration::from).or(file.connect_timeout),
            log_level: args.log_level,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Public --------------------------------------------------------

impl Config {
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(Arc::new(identity));
        self
    }

    pub fn with_negotiation_policy(mut self, policy: NegotiationPolicy) -> Self {
        self.negotiation_policy = policy;
        self
    }

    pub fn with_backend_trust(mut self, trust: BackendTrust) -> Self {
        self.backend_trust = trust;
        self
    }

    pub fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = Some(limit);
        self
    }

    pub fn with_backend_auth_secret(mut self, secret: impl Into<String>) -> Self {
        self.backend_auth_secret = Some(SecretString::from(secret.into()));
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn load_identity(
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
) -> Result<Option<Arc<ClientIdentity>>, ConfigError> {
    match (cert, key) {
        (Some(cert), Some(key)) => {
            let identity = ClientIdentity::from_pem_files(&cert, &key)?;
            Ok(Some(Arc::new(identity)))
        }
        (None, None) => Ok(None),
        _ => Err(ConfigError::IncompleteClientCertificate),
    }
}

/// The flag wins over the environment. Both being set is allowed but noisy.
pub fn resolve_secret(flag: Option<String>, env: Option<String>) -> Option<SecretString> {
    let env = env.filter(|v| !v.is_empty());

    match (flag, env) {
        (Some(flag), Some(_)) => {
            warn!(
                "password given both with -s and in {PASSWORD_ENV}; using the command line value"
            );
            Some(SecretString::from(flag))
        }
        (Some(flag), None) => Some(SecretString::from(flag)),
        (None, Some(env)) => Some(SecretString::from(env)),
        (None, None) => None,
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("postgres address must be specified (-p, PGSSL_BACKEND or `backend` in the config file)")]
    MissingBackend,

    #[error("client certificate and client key must be specified together")]
    IncompleteClientCertificate,

    #[error("invalid listen address {value:?}: {source}")]
    InvalidListenAddress {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error(transparent)]
    InvalidBackendAddress(#[from] InvalidBackendAddress),

    #[error(transparent)]
    Tls(#[from] TlsSetupError),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("toml parse error in {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
