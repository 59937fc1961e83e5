pub mod proxy_session;
pub mod server;
pub mod state;

pub use proxy_session::ProxySession;
pub use server::ProxyServer;
pub use state::SessionState;
