use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::trace;

use crate::wire_protocol::TerminateFrame;

// -----------------------------------------------------------------------------
// ----- BackendConnection -----------------------------------------------------

/// A backend connection that has completed its TLS handshake. Nothing is
/// ever written to the backend outside of this type.
#[derive(Debug)]
pub struct BackendConnection {
    stream: TlsStream<TcpStream>,
}

impl BackendConnection {
    pub(crate) fn new(stream: TlsStream<TcpStream>) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Courtesy Terminate, then close_notify. Failures are ignored: the peer
    /// may already be gone.
    pub async fn close(mut self) {
        if let Err(e) = self.send(&TerminateFrame::encode()).await {
            trace!("terminate not delivered: {e}");
        }
        let _ = self.stream.shutdown().await;
    }
}

// -----------------------------------------------------------------------------
// ----- BackendConnection: AsyncRead / AsyncWrite -----------------------------

impl AsyncRead for BackendConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for BackendConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
