use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tracing::debug;

use crate::errors::{ProxyError, Side};
use crate::wire_protocol::{SslRequestFrame, SslResponse};

use super::BackendConnection;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// One byte is the only legal answer. Room for two lets us notice anything
/// queued behind it.
const SSL_RESPONSE_PROBE: usize = 2;

// -----------------------------------------------------------------------------
// ----- BackendTlsNegotiator --------------------------------------------------

#[derive(Clone)]
pub struct BackendTlsNegotiator {
    address: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    connect_timeout: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- BackendTlsNegotiator: Static ------------------------------------------

impl BackendTlsNegotiator {
    pub fn new(
        address: impl Into<String>,
        connector: TlsConnector,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, InvalidBackendAddress> {
        let address = address.into();
        let server_name = server_name(&address)?;

        Ok(Self {
            address,
            server_name,
            connector,
            connect_timeout,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- BackendTlsNegotiator: Public ------------------------------------------

impl BackendTlsNegotiator {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn dial(&self) -> Result<TcpStream, ProxyError> {
        let connect = TcpStream::connect(self.address.as_str());
        let stream = connect_within(self.connect_timeout, connect).await?;
        let _ = stream.set_nodelay(true);

        debug!("connected to backend {}", self.address);
        Ok(stream)
    }

    /// SSLRequest, reply check, TLS handshake.
    pub async fn upgrade(&self, mut stream: TcpStream) -> Result<BackendConnection, ProxyError> {
        request_ssl(&mut stream).await?;
        debug!("backend accepted SSLRequest");

        let tls = self
            .connector
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|source| ProxyError::Tls { source })?;

        if let Some(version) = tls.get_ref().1.protocol_version() {
            debug!("backend TLS established ({version:?})");
        }

        Ok(BackendConnection::new(tls))
    }
}

// -----------------------------------------------------------------------------
// ----- Dial ------------------------------------------------------------------

async fn connect_within<F>(limit: Option<Duration>, connect: F) -> Result<TcpStream, ProxyError>
where
    F: Future<Output = io::Result<TcpStream>>,
{
    let result = match limit {
        Some(limit) => match timeout(limit, connect).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "no connection after {}",
                    humantime::format_duration(limit)
                ),
            )),
        },
        None => connect.await,
    };

    result.map_err(|e| ProxyError::network(Side::Backend, "connecting", e))
}

// -----------------------------------------------------------------------------
// ----- SSL negotiation -------------------------------------------------------

/// Ask the server for TLS and read its one-byte verdict.
///
/// If more than one byte is already waiting, someone may be trying to smuggle
/// plaintext in ahead of the handshake (CVE-2021-23222). We bail out instead
/// of discarding it. Bytes that arrive in a later segment are not caught here.
pub async fn request_ssl<S>(stream: &mut S) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&SslRequestFrame::encode())
        .await
        .map_err(|e| ProxyError::network(Side::Backend, "sending SSLRequest", e))?;
    stream
        .flush()
        .await
        .map_err(|e| ProxyError::network(Side::Backend, "sending SSLRequest", e))?;

    let mut reply = [0u8; SSL_RESPONSE_PROBE];
    let n = stream
        .read(&mut reply)
        .await
        .map_err(|e| ProxyError::network(Side::Backend, "reading SSL response", e))?;

    match n {
        0 => Err(ProxyError::network(
            Side::Backend,
            "reading SSL response",
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "backend closed the connection before answering SSLRequest",
            ),
        )),
        1 => match SslResponse::from_byte(reply[0]) {
            SslResponse::Accepted => Ok(()),
            SslResponse::Declined => Err(ProxyError::BackendDeclinedTls),
            SslResponse::Unexpected(byte) => Err(ProxyError::protocol(
                Side::Backend,
                format!("unexpected response to SSLRequest: {byte:#04x}"),
            )),
        },
        received => Err(ProxyError::BufferStuffing { received }),
    }
}

pub async fn forward_startup(
    backend: &mut BackendConnection,
    startup: &[u8],
) -> Result<(), ProxyError> {
    backend
        .send(startup)
        .await
        .map_err(|e| ProxyError::network(Side::Backend, "forwarding startup packet", e))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
#[error("invalid backend address {address:?}: {reason}")]
pub struct InvalidBackendAddress {
    address: String,
    reason: &'static str,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn server_name(address: &str) -> Result<ServerName<'static>, InvalidBackendAddress> {
    let invalid = |reason| InvalidBackendAddress {
        address: address.to_string(),
        reason,
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;

    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    ServerName::try_from(host.to_string()).map_err(|_| invalid("host is not a valid DNS name or IP"))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
