use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, error, info, info_span, warn};

use crate::backend::BackendTlsNegotiator;
use crate::config::{Config, ConfigError};
use crate::frontend::StartupNegotiator;
use crate::tls;

use super::ProxySession;

// -----------------------------------------------------------------------------
// ----- ProxyServer -----------------------------------------------------------

/// Session factory. Holds only what every session reads and nobody writes.
pub struct ProxyServer {
    frontend: StartupNegotiator,
    backend: Arc<BackendTlsNegotiator>,
    next_session_id: AtomicU64,
}

// -----------------------------------------------------------------------------
// ----- ProxyServer: Static ---------------------------------------------------

impl ProxyServer {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let connector = tls::connector(&config.backend_trust, config.client_identity.as_deref())?;
        let backend =
            BackendTlsNegotiator::new(&config.backend_addr, connector, config.connect_timeout)?;

        Ok(Self {
            frontend: StartupNegotiator::new(config.negotiation_policy),
            backend: Arc::new(backend),
            next_session_id: AtomicU64::new(1),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ProxyServer: Public ---------------------------------------------------

impl ProxyServer {
    pub fn backend_addr(&self) -> &str {
        self.backend.address()
    }

    pub fn session(&self) -> ProxySession {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        ProxySession::new(id, self.frontend, self.backend.clone())
    }

    /// Accept forever. Each connection gets its own task; accept errors are
    /// logged and skipped.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            };

            let _ = stream.set_nodelay(true);
            self.spawn_session(stream, peer);
        }
    }

    pub fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let mut session = self.session();
        let span = info_span!("session", id = session.id(), %peer);

        tokio::spawn(
            async move {
                info!("accepted");

                match session.run(stream).await {
                    Ok(()) => {}
                    Err(e) if e.kind().is_policy() => {
                        warn!(side = %e.side(), kind = %e.kind(), state = %session.state(), "{e}")
                    }
                    Err(e) => {
                        error!(side = %e.side(), kind = %e.kind(), state = %session.state(), "{e}")
                    }
                }

                info!(state = %session.state(), "closed");
            }
            .instrument(span),
        );
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
