pub mod ssl_request;
pub mod startup;
pub mod terminate;

pub use ssl_request::{SslRequestFrame, SslResponse};
pub use startup::{StartupFrameError, StartupMessage, read_startup_frame};
pub use terminate::TerminateFrame;

#[inline]
pub(crate) fn be_u32(x: &[u8]) -> u32 {
    u32::from_be_bytes([x[0], x[1], x[2], x[3]])
}
