use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::backend::{BackendTlsNegotiator, forward_startup};
use crate::errors::{ProxyError, Side};
use crate::frontend::StartupNegotiator;
use crate::net::{PipeOutcome, relay};

use super::SessionState;

// -----------------------------------------------------------------------------
// ----- ProxySession ----------------------------------------------------------

/// One accepted client, driven from its first packet to the end of the relay.
/// Both connections are closed on every path out of `run`.
pub struct ProxySession {
    id: u64,
    state: SessionState,
    frontend: StartupNegotiator,
    backend: Arc<BackendTlsNegotiator>,
}

// -----------------------------------------------------------------------------
// ----- ProxySession: Static --------------------------------------------------

impl ProxySession {
    pub fn new(id: u64, frontend: StartupNegotiator, backend: Arc<BackendTlsNegotiator>) -> Self {
        Self {
            id,
            state: SessionState::Init,
            frontend,
            backend,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ProxySession: Public --------------------------------------------------

impl ProxySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A clean close from either side during relay is `Ok(())`. If both sides
    /// recorded an error, the backend's is reported.
    pub async fn run<C>(&mut self, mut client: C) -> Result<(), ProxyError>
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // -- Client startup --
        self.transition(SessionState::AwaitClientStartup);

        let startup = match self.frontend.negotiate(&mut client).await {
            Ok(frame) => frame,
            Err(e) => {
                self.transition(SessionState::Rejected);
                close_client(client).await;
                return Err(e);
            }
        };

        // -- Backend --
        self.transition(SessionState::DialBackend);

        let stream = match self.backend.dial().await {
            Ok(stream) => stream,
            Err(e) => return self.fail(client, e).await,
        };

        self.transition(SessionState::BackendTlsNegotiate);

        let mut backend = match self.backend.upgrade(stream).await {
            Ok(backend) => backend,
            Err(e) => return self.fail(client, e).await,
        };

        self.transition(SessionState::ForwardStartup);

        if let Err(e) = forward_startup(&mut backend, &startup).await {
            backend.close().await;
            return self.fail(client, e).await;
        }

        // -- Relay --
        self.transition(SessionState::Relay);

        let PipeOutcome {
            conn_a: client,
            conn_b: backend,
            err_a: client_err,
            err_b: backend_err,
        } = relay(client, backend).await;

        backend.close().await;
        close_client(client).await;
        self.transition(SessionState::Closed);

        match (backend_err, client_err) {
            (Some(e), _) => Err(ProxyError::network(Side::Backend, "relaying", e)),
            (None, Some(e)) => Err(ProxyError::network(Side::Client, "relaying", e)),
            (None, None) => Ok(()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ProxySession: Private -------------------------------------------------

impl ProxySession {
    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    async fn fail<C>(&mut self, client: C, err: ProxyError) -> Result<(), ProxyError>
    where
        C: AsyncWrite + Unpin,
    {
        self.transition(SessionState::Failed);
        close_client(client).await;
        Err(err)
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn close_client<C: AsyncWrite + Unpin>(mut client: C) {
    let _ = client.shutdown().await;
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
