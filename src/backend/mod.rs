pub mod backend_connection;
pub mod negotiator;

pub use backend_connection::BackendConnection;
pub use negotiator::{BackendTlsNegotiator, InvalidBackendAddress, forward_startup, request_ssl};
