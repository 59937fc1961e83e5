// Proxy responses are protocol bytes the proxy writes to a client on its own
// behalf, rather than forwarded from the backend.

use bytes::Bytes;

use crate::wire_protocol::SslResponse;

// -----------------------------------------------------------------------------
// ----- Local Backend Responses -----------------------------------------------

pub(crate) fn ssl_no() -> Bytes {
    Bytes::copy_from_slice(&[SslResponse::Declined.as_byte()])
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
