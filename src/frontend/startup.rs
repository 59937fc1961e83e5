use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::NegotiationPolicy;
use crate::errors::{ProxyError, Side};
use crate::frontend::proxy_responses as responses;
use crate::wire_protocol::{StartupMessage, read_startup_frame};

// -----------------------------------------------------------------------------
// ----- StartupNegotiator -----------------------------------------------------

/// Reads the client's first packet and lets only a plain login through.
#[derive(Debug, Clone, Copy)]
pub struct StartupNegotiator {
    policy: NegotiationPolicy,
}

// -----------------------------------------------------------------------------
// ----- StartupNegotiator: Static ---------------------------------------------

impl StartupNegotiator {
    pub fn new(policy: NegotiationPolicy) -> Self {
        Self { policy }
    }
}

// -----------------------------------------------------------------------------
// ----- StartupNegotiator: Public ---------------------------------------------

impl StartupNegotiator {
    /// Returns the raw startup frame on success. Nothing is ever written to
    /// the client except the single decline byte under that policy.
    pub async fn negotiate<S>(&self, client: &mut S) -> Result<Bytes, ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = read_startup_frame(client)
            .await
            .map_err(ProxyError::client_startup)?;

        let message = StartupMessage::classify(frame).map_err(ProxyError::client_startup)?;
        debug!("client sent {}", message.describe());

        match message {
            StartupMessage::Startup(frame) => Ok(frame),

            StartupMessage::SslRequest => {
                if self.policy == NegotiationPolicy::RejectWithDeclineByte {
                    client
                        .write_all(&responses::ssl_no())
                        .await
                        .map_err(|e| ProxyError::network(Side::Client, "sending SSL decline", e))?;
                    client
                        .flush()
                        .await
                        .map_err(|e| ProxyError::network(Side::Client, "sending SSL decline", e))?;
                }

                Err(ProxyError::ClientUsedTls)
            }

            unexpected @ StartupMessage::Unrecognized { .. } => Err(ProxyError::protocol(
                Side::Client,
                format!("unexpected startup message: {}", unexpected.describe()),
            )),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
