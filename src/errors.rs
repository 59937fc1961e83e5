use std::{fmt, io};

use thiserror::Error;

use crate::wire_protocol::StartupFrameError;

// -----------------------------------------------------------------------------
// ----- Side ------------------------------------------------------------------

/// Which end of a session an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Backend,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Backend => f.write_str("backend"),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ErrorKind -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    Network,
    Tls,
    Security,
    ClientUsedTls,
    BackendDeclinedTls,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Protocol => "protocol",
            ErrorKind::Network => "network",
            ErrorKind::Tls => "tls",
            ErrorKind::Security => "security",
            ErrorKind::ClientUsedTls => "client_used_tls",
            ErrorKind::BackendDeclinedTls => "backend_declined_tls",
        }
    }

    /// Outcomes of the negotiation policy rather than something going wrong.
    pub fn is_policy(self) -> bool {
        matches!(self, ErrorKind::ClientUsedTls | ErrorKind::BackendDeclinedTls)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// ----- ProxyError ------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{side} protocol error: {detail}")]
    Protocol { side: Side, detail: String },

    #[error("{side} connection error while {op}: {source}")]
    Network {
        side: Side,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("tls handshake with backend failed: {source}")]
    Tls {
        #[source]
        source: io::Error,
    },

    #[error(
        "backend returned {received} bytes to SSLRequest instead of 1; possible buffer-stuffing attack (CVE-2021-23222)"
    )]
    BufferStuffing { received: usize },

    #[error("client must not use SSL")]
    ClientUsedTls,

    #[error("backend declined SSL communication")]
    BackendDeclinedTls,
}

// -----------------------------------------------------------------------------
// ----- ProxyError: Static ----------------------------------------------------

impl ProxyError {
    pub fn protocol(side: Side, detail: impl Into<String>) -> Self {
        ProxyError::Protocol {
            side,
            detail: detail.into(),
        }
    }

    pub fn network(side: Side, op: &'static str, source: io::Error) -> Self {
        ProxyError::Network { side, op, source }
    }

    pub(crate) fn client_startup(err: StartupFrameError) -> Self {
        match err {
            StartupFrameError::Io(source) => {
                ProxyError::network(Side::Client, "reading startup packet", source)
            }
            other => ProxyError::protocol(Side::Client, other.to_string()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ProxyError: Public ----------------------------------------------------

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Protocol { .. } => ErrorKind::Protocol,
            ProxyError::Network { .. } => ErrorKind::Network,
            ProxyError::Tls { .. } => ErrorKind::Tls,
            ProxyError::BufferStuffing { .. } => ErrorKind::Security,
            ProxyError::ClientUsedTls => ErrorKind::ClientUsedTls,
            ProxyError::BackendDeclinedTls => ErrorKind::BackendDeclinedTls,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            ProxyError::Protocol { side, .. } | ProxyError::Network { side, .. } => *side,
            ProxyError::ClientUsedTls => Side::Client,
            ProxyError::Tls { .. }
            | ProxyError::BufferStuffing { .. }
            | ProxyError::BackendDeclinedTls => Side::Backend,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
