use std::fmt;

/// Where a proxy session is in its life. `Rejected`, `Failed` and `Closed`
/// are terminal; a session never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, nothing exchanged yet.
    Init,

    /// Waiting for the client's first packet.
    AwaitClientStartup,

    /// The client asked for SSL or sent something other than a login.
    /// The backend was never contacted.
    Rejected,

    /// Opening the TCP connection to the backend.
    DialBackend,

    /// SSLRequest sent, reply checked, TLS handshake in progress.
    BackendTlsNegotiate,

    /// Sending the client's startup packet inside the encrypted channel.
    ForwardStartup,

    /// Backend negotiation or startup forwarding went wrong.
    Failed,

    /// Bytes flowing both ways.
    Relay,

    /// Relay finished and both connections are closed.
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::AwaitClientStartup => "await_client_startup",
            SessionState::Rejected => "rejected",
            SessionState::DialBackend => "dial_backend",
            SessionState::BackendTlsNegotiate => "backend_tls_negotiate",
            SessionState::ForwardStartup => "forward_startup",
            SessionState::Failed => "failed",
            SessionState::Relay => "relay",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Rejected | SessionState::Failed | SessionState::Closed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
