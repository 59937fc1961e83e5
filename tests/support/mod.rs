#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use pgssl::backend::BackendTlsNegotiator;
use pgssl::config::NegotiationPolicy;
use pgssl::frontend::StartupNegotiator;
use pgssl::tls::{self, BackendTrust, ClientIdentity};
use pgssl::ProxySession;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, SanType,
};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::crypto::{CryptoProvider, aws_lc_rs};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::server::TlsStream;

// -----------------------------------------------------------------------------
// ----- Certificates ----------------------------------------------------------

fn provider() -> Arc<CryptoProvider> {
    Arc::new(aws_lc_rs::default_provider())
}

fn pkcs8(key: &KeyPair) -> PrivateKeyDer<'static> {
    PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()))
}

/// A throwaway certificate authority for one test.
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, name);

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.der()).unwrap();
        roots
    }

    pub fn trust(&self) -> BackendTrust {
        BackendTrust::Roots(Arc::new(self.roots()))
    }

    fn issue(
        &self,
        names: &[&str],
        usage: ExtendedKeyUsagePurpose,
    ) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, names[0]);
        for name in names {
            let san = match name.parse::<IpAddr>() {
                Ok(ip) => SanType::IpAddress(ip),
                Err(_) => SanType::DnsName(name.to_string().try_into().unwrap()),
            };
            params.subject_alt_names.push(san);
        }
        params.extended_key_usages = vec![usage];

        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        (cert.der().clone(), pkcs8(&key))
    }

    pub fn server_cert(&self) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
        self.issue(&["localhost", "127.0.0.1"], ExtendedKeyUsagePurpose::ServerAuth)
    }

    pub fn client_identity(&self) -> ClientIdentity {
        let (cert, key) = self.issue(&["pgssl-client"], ExtendedKeyUsagePurpose::ClientAuth);
        ClientIdentity::new(vec![cert], key)
    }
}

// -----------------------------------------------------------------------------
// ----- Fake TLS backend ------------------------------------------------------

/// Listens like a Postgres server that insists on TLS.
pub struct TlsBackend {
    pub addr: SocketAddr,
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsBackend {
    /// Self-signed server certificate, no client authentication.
    pub async fn start() -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();

        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![certified.cert.der().clone()], pkcs8(&certified.key_pair))
            .unwrap();

        Self::listen(config).await
    }

    /// Server certificate issued by `ca`, no client authentication.
    pub async fn start_signed_by(ca: &TestCa) -> Self {
        let (cert, key) = ca.server_cert();

        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();

        Self::listen(config).await
    }

    /// Refuses the handshake unless the client presents a certificate
    /// issued by `ca`.
    pub async fn start_requiring_client_cert(ca: &TestCa) -> Self {
        let (cert, key) = ca.server_cert();

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(ca.roots()), provider())
            .build()
            .unwrap();

        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![cert], key)
            .unwrap();

        Self::listen(config).await
    }

    async fn listen(mut config: ServerConfig) -> Self {
        // no unread tickets left in the proxy's socket when it hangs up
        config.send_tls13_tickets = 0;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        Self {
            addr,
            listener,
            acceptor: TlsAcceptor::from(Arc::new(config)),
        }
    }

    /// Accepts one connection and consumes its SSLRequest. The reply is up
    /// to the caller.
    pub async fn accept_raw(&self) -> TcpStream {
        let (mut stream, _) = self.listener.accept().await.unwrap();

        let mut request = [0u8; 8];
        stream.read_exact(&mut request).await.unwrap();
        assert_eq!(request, [0, 0, 0, 8, 0x04, 0xd2, 0x16, 0x2f]);

        stream
    }

    /// SSLRequest, 'S', handshake.
    pub async fn accept(&self) -> TlsStream<TcpStream> {
        self.try_accept().await.unwrap()
    }

    pub async fn try_accept(&self) -> std::io::Result<TlsStream<TcpStream>> {
        use tokio::io::AsyncWriteExt;

        let mut stream = self.accept_raw().await;
        stream.write_all(b"S").await?;
        self.acceptor.accept(stream).await
    }

    /// True if nobody dialed within `wait`.
    pub async fn never_contacted(&self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.listener.accept())
            .await
            .is_err()
    }
}

/// Reads one length-prefixed startup frame, length included.
pub async fn read_startup<S: tokio::io::AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.unwrap();

    let total = u32::from_be_bytes(len) as usize;
    let mut frame = len.to_vec();
    frame.resize(total, 0);
    stream.read_exact(&mut frame[4..]).await.unwrap();
    frame
}

// -----------------------------------------------------------------------------
// ----- Sessions --------------------------------------------------------------

pub fn proxy_session(
    backend: SocketAddr,
    trust: BackendTrust,
    identity: Option<&ClientIdentity>,
    policy: NegotiationPolicy,
) -> ProxySession {
    let connector = tls::connector(&trust, identity).unwrap();
    let negotiator = BackendTlsNegotiator::new(backend.to_string(), connector, None).unwrap();
    ProxySession::new(1, StartupNegotiator::new(policy), Arc::new(negotiator))
}

/// A protocol 3.0 startup frame of exactly `total` bytes (at least 38).
pub fn startup_frame(total: usize) -> Vec<u8> {
    let padding = total - 38;

    let mut body = Vec::with_capacity(total);
    body.extend_from_slice(&196608u32.to_be_bytes());
    body.extend_from_slice(b"user\0alice\0");
    body.extend_from_slice(b"application_name\0");
    body.extend(std::iter::repeat_n(b'x', padding));
    body.extend_from_slice(b"\0\0");

    let mut frame = ((body.len() + 4) as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(&body);
    assert_eq!(frame.len(), total);
    frame
}

// -----------------------------------------------------------------------------
// ----- Binary ----------------------------------------------------------------

pub fn reserve_port(host: &str) -> u16 {
    let addr = format!("{host}:0");
    let listener = std::net::TcpListener::bind(&addr).expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

/// Killed on drop so a failing assertion never leaks the process.
pub struct PgsslProcess(Child);

impl Drop for PgsslProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

pub fn spawn_pgssl(listen: &str, backend: SocketAddr, extra: &[&str]) -> PgsslProcess {
    let exe = env!("CARGO_BIN_EXE_pgssl");

    let child = Command::new(exe)
        .arg("-l")
        .arg(listen)
        .arg("-p")
        .arg(backend.to_string())
        .args(extra)
        .env_remove("PGSSL_PASSWORD")
        .env_remove("PGSSL_CONFIG_FILE")
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn pgssl");

    PgsslProcess(child)
}

pub async fn wait_for_listen(addr: &str) {
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("pgssl did not start listening on {addr}");
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
