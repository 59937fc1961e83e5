use bytes::Bytes;

// -----------------------------------------------------------------------------
// ----- TerminateFrame --------------------------------------------------------

/// `Byte1('X') Int32(4)`. Sent to a backend before hanging up.
pub struct TerminateFrame;

impl TerminateFrame {
    pub const BYTES: &'static [u8] = b"X\0\0\0\x04";

    pub fn encode() -> Bytes {
        Bytes::from_static(Self::BYTES)
    }
}
