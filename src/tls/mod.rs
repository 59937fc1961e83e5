use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::crypto::{CryptoProvider, aws_lc_rs};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Never negotiate anything older than TLS 1.2 with a backend.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

static PROVIDER: Lazy<Arc<CryptoProvider>> = Lazy::new(|| Arc::new(aws_lc_rs::default_provider()));

// -----------------------------------------------------------------------------
// ----- ClientIdentity --------------------------------------------------------

/// Certificate chain and private key presented when a backend asks for a
/// client certificate. Loaded once, shared read-only by every session.
#[derive(Debug)]
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }

    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsSetupError> {
        let chain = load_certs(cert_path)?;
        let key = load_key(key_path)?;

        Ok(Self { chain, key })
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

// -----------------------------------------------------------------------------
// ----- BackendTrust ----------------------------------------------------------

/// How the backend's server certificate is judged.
#[derive(Debug, Clone)]
pub enum BackendTrust {
    /// Accept any server certificate. Handshake signatures are still checked.
    SkipVerify,

    /// Verify the chain and host name against these roots.
    Roots(Arc<RootCertStore>),
}

impl BackendTrust {
    pub fn from_ca_file(path: &Path) -> Result<Self, TlsSetupError> {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(path)? {
            roots.add(cert).map_err(|source| TlsSetupError::InvalidCa {
                path: path.to_path_buf(),
                source,
            })?;
        }

        Ok(BackendTrust::Roots(Arc::new(roots)))
    }

    pub fn verifies(&self) -> bool {
        matches!(self, BackendTrust::Roots(_))
    }
}

// -----------------------------------------------------------------------------
// ----- TLS: Exported ---------------------------------------------------------

pub fn connector(
    trust: &BackendTrust,
    identity: Option<&ClientIdentity>,
) -> Result<TlsConnector, TlsSetupError> {
    let builder = ClientConfig::builder_with_provider(PROVIDER.clone())
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .map_err(TlsSetupError::Rustls)?;

    let builder = match trust {
        BackendTrust::SkipVerify => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::SkipServerVerification::new(
                &PROVIDER,
            ))),
        BackendTrust::Roots(roots) => builder.with_root_certificates(roots.clone()),
    };

    let config = match identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())
            .map_err(TlsSetupError::InvalidIdentity)?,
        None => builder.with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid CA certificate in {}: {source}", path.display())]
    InvalidCa {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    #[error("invalid client certificate/key pair: {0}")]
    InvalidIdentity(#[source] rustls::Error),

    #[error("tls configuration rejected: {0}")]
    Rustls(#[source] rustls::Error),
}

// -----------------------------------------------------------------------------
// ----- TLS: Private helpers --------------------------------------------------

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsSetupError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.to_path_buf()));
    }

    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsSetupError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsSetupError::NoPrivateKey(path.to_path_buf()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsSetupError> {
    let file = File::open(path).map_err(|source| TlsSetupError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(BufReader::new(file))
}

// -----------------------------------------------------------------------------
// ----- Skip-verify certificate verifier --------------------------------------

mod danger {
    use tokio_rustls::rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use tokio_rustls::rustls::crypto::{
        CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
    };
    use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use tokio_rustls::rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Trusts whatever certificate the backend presents. The handshake
    /// signatures are still verified, so the peer must hold the key for the
    /// certificate it sent.
    #[derive(Debug)]
    pub(super) struct SkipServerVerification {
        algorithms: WebPkiSupportedAlgorithms,
    }

    impl SkipServerVerification {
        pub(super) fn new(provider: &CryptoProvider) -> Self {
            Self {
                algorithms: provider.signature_verification_algorithms,
            }
        }
    }

    impl ServerCertVerifier for SkipServerVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            verify_tls12_signature(message, cert, dss, &self.algorithms)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            verify_tls13_signature(message, cert, dss, &self.algorithms)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.algorithms.supported_schemes()
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
