//! Module: wire_protocol::startup
//!
//! The first message a client sends on a new connection. It is untagged:
//! a 4-byte big-endian length (which counts itself), then a 4-byte code that
//! says what the rest of the packet is.
//!
//! - `read_startup_frame`: pulls exactly one such packet off a stream.
//! - `StartupMessage::classify`: decides what the packet is without ever
//!   rewriting it. A login packet is kept as the raw frame so it can be
//!   forwarded verbatim.

use std::{error::Error as StdError, fmt, io};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::be_u32;
use super::ssl_request::{SSL_REQUEST_CODE, SslRequestFrame};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Same ceiling the server applies to startup packets.
pub const MAX_STARTUP_PACKET_LEN: usize = 10_000;

pub const MIN_STARTUP_PACKET_LEN: usize = 8;

pub const CANCEL_REQUEST_CODE: u32 = 80877102;

pub const GSSENC_REQUEST_CODE: u32 = 80877104;

const PROTOCOL_MAJOR_VERSION: u32 = 3;

// -----------------------------------------------------------------------------
// ----- StartupMessage --------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupMessage {
    /// A protocol 3.x login packet. Holds the whole frame, length prefix included.
    Startup(Bytes),
    SslRequest,
    Unrecognized { code: u32 },
}

// -----------------------------------------------------------------------------
// ----- StartupMessage: Static ------------------------------------------------

impl StartupMessage {
    /// Classify one complete startup frame (length prefix included).
    pub fn classify(frame: Bytes) -> Result<Self, StartupFrameError> {
        if frame.len() < MIN_STARTUP_PACKET_LEN {
            return Err(StartupFrameError::InvalidLength(frame.len()));
        }

        let len = be_u32(&frame[0..]) as usize;
        if len != frame.len() {
            return Err(StartupFrameError::LengthMismatch {
                declared: len,
                actual: frame.len(),
            });
        }

        let code = be_u32(&frame[4..]);

        if code == SSL_REQUEST_CODE {
            SslRequestFrame::validate(&frame)
                .map_err(|e| StartupFrameError::MalformedSslRequest(e.to_string()))?;
            return Ok(StartupMessage::SslRequest);
        }

        if code >> 16 == PROTOCOL_MAJOR_VERSION {
            validate_parameters(&frame[8..])?;
            return Ok(StartupMessage::Startup(frame));
        }

        Ok(StartupMessage::Unrecognized { code })
    }
}

// -----------------------------------------------------------------------------
// ----- StartupMessage: Public ------------------------------------------------

impl StartupMessage {
    /// Human readable name of the packet, for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            StartupMessage::Startup(_) => "StartupMessage".to_string(),
            StartupMessage::SslRequest => "SSLRequest".to_string(),
            StartupMessage::Unrecognized { code } => describe_code(*code),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- read_startup_frame ----------------------------------------------------

/// Read exactly one length-prefixed startup packet and nothing past it.
pub async fn read_startup_frame<R>(reader: &mut R) -> Result<Bytes, StartupFrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    reader
        .read_exact(&mut header)
        .await
        .map_err(StartupFrameError::from_read)?;

    let len = u32::from_be_bytes(header) as usize;
    if !(MIN_STARTUP_PACKET_LEN..=MAX_STARTUP_PACKET_LEN).contains(&len) {
        return Err(StartupFrameError::InvalidLength(len));
    }

    let mut frame = BytesMut::zeroed(len);
    frame[..4].copy_from_slice(&header);
    reader
        .read_exact(&mut frame[4..])
        .await
        .map_err(StartupFrameError::from_read)?;

    Ok(frame.freeze())
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug)]
pub enum StartupFrameError {
    Closed,
    Io(io::Error),
    InvalidLength(usize),
    LengthMismatch { declared: usize, actual: usize },
    MalformedSslRequest(String),
    MalformedParameters,
}

impl StartupFrameError {
    fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            StartupFrameError::Closed
        } else {
            StartupFrameError::Io(err)
        }
    }
}

impl fmt::Display for StartupFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StartupFrameError::*;
        match self {
            Closed => write!(f, "connection closed before a full startup packet was read"),
            Io(e) => write!(f, "error reading startup packet: {e}"),
            InvalidLength(len) => write!(f, "invalid length of startup packet: {len}"),
            LengthMismatch { declared, actual } => {
                write!(f, "startup packet declares {declared} bytes but has {actual}")
            }
            MalformedSslRequest(e) => write!(f, "malformed SSLRequest: {e}"),
            MalformedParameters => write!(f, "malformed startup parameter list"),
        }
    }
}

impl StdError for StartupFrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StartupFrameError::Io(e) => Some(e),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// key\0value\0 ... \0, at least one pair.
fn validate_parameters(mut body: &[u8]) -> Result<(), StartupFrameError> {
    let mut pairs = 0usize;

    loop {
        let key_len = cstr_len(body)?;
        if key_len == 0 {
            body = &body[1..];
            break;
        }
        body = &body[key_len + 1..];

        let value_len = cstr_len(body)?;
        body = &body[value_len + 1..];
        pairs += 1;
    }

    if pairs == 0 || !body.is_empty() {
        return Err(StartupFrameError::MalformedParameters);
    }

    Ok(())
}

#[inline]
fn cstr_len(buf: &[u8]) -> Result<usize, StartupFrameError> {
    buf.iter()
        .position(|b| *b == 0)
        .ok_or(StartupFrameError::MalformedParameters)
}

fn describe_code(code: u32) -> String {
    match code {
        CANCEL_REQUEST_CODE => "CancelRequest".to_string(),
        GSSENC_REQUEST_CODE => "GSSENCRequest".to_string(),
        SSL_REQUEST_CODE => "SSLRequest".to_string(),
        other => format!(
            "startup packet with code {other} (protocol {}.{})",
            other >> 16,
            other & 0xFFFF
        ),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn frame_with_code(code: u32, body: &[u8]) -> Bytes {
        let mut frame = BytesMut::new();
        frame.put_u32((8 + body.len()) as u32);
        frame.put_u32(code);
        frame.extend_from_slice(body);
        frame.freeze()
    }

    fn login_frame() -> Bytes {
        frame_with_code(196608, b"user\0postgres\0database\0mydb\0\0")
    }

    #[test]
    fn classifies_login_and_keeps_frame_verbatim() {
        let frame = login_frame();
        let message = StartupMessage::classify(frame.clone()).unwrap();
        assert_eq!(message, StartupMessage::Startup(frame));
    }

    #[test]
    fn accepts_newer_minor_versions() {
        let frame = frame_with_code(196610, b"user\0postgres\0\0");
        let message = StartupMessage::classify(frame).unwrap();
        assert!(matches!(message, StartupMessage::Startup(_)));
    }

    #[test]
    fn classifies_ssl_request() {
        let frame = SslRequestFrame::encode();
        assert_eq!(
            StartupMessage::classify(frame).unwrap(),
            StartupMessage::SslRequest
        );
    }

    #[test]
    fn oversized_ssl_request_is_malformed() {
        let frame = frame_with_code(SSL_REQUEST_CODE, &[0, 0, 0, 0]);
        let err = StartupMessage::classify(frame).unwrap_err();
        assert!(matches!(err, StartupFrameError::MalformedSslRequest(_)));
    }

    #[test]
    fn cancel_and_gssenc_are_unrecognized() {
        let cancel = frame_with_code(CANCEL_REQUEST_CODE, &[0, 0, 0, 1, 0, 0, 0, 2]);
        let message = StartupMessage::classify(cancel).unwrap();
        assert_eq!(
            message,
            StartupMessage::Unrecognized {
                code: CANCEL_REQUEST_CODE
            }
        );
        assert_eq!(message.describe(), "CancelRequest");

        let gss = frame_with_code(GSSENC_REQUEST_CODE, &[]);
        let message = StartupMessage::classify(gss).unwrap();
        assert_eq!(message.describe(), "GSSENCRequest");
    }

    #[test]
    fn protocol_two_is_unrecognized() {
        let frame = frame_with_code(2 << 16, b"user\0postgres\0\0");
        let message = StartupMessage::classify(frame).unwrap();
        assert_eq!(message, StartupMessage::Unrecognized { code: 2 << 16 });
    }

    #[test]
    fn rejects_missing_terminator() {
        let frame = frame_with_code(196608, b"user\0postgres\0database\0mydb");
        let err = StartupMessage::classify(frame).unwrap_err();
        assert!(matches!(err, StartupFrameError::MalformedParameters));
    }

    #[test]
    fn rejects_empty_parameter_list() {
        let frame = frame_with_code(196608, b"\0");
        let err = StartupMessage::classify(frame).unwrap_err();
        assert!(matches!(err, StartupFrameError::MalformedParameters));
    }

    #[test]
    fn rejects_bytes_after_terminator() {
        let frame = frame_with_code(196608, b"user\0postgres\0\0junk");
        let err = StartupMessage::classify(frame).unwrap_err();
        assert!(matches!(err, StartupFrameError::MalformedParameters));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut raw = login_frame().to_vec();
        raw.push(0);
        let err = StartupMessage::classify(Bytes::from(raw)).unwrap_err();
        assert!(matches!(err, StartupFrameError::LengthMismatch { .. }));
    }

    #[tokio::test]
    async fn reads_exactly_one_frame() {
        let frame = login_frame();
        let mut stream = frame.to_vec();
        stream.extend_from_slice(b"Qtrailing");

        let mut reader = &stream[..];
        let read = read_startup_frame(&mut reader).await.unwrap();
        assert_eq!(read, frame);
        assert_eq!(reader, b"Qtrailing");
    }

    #[tokio::test]
    async fn read_rejects_out_of_range_lengths() {
        let mut reader: &[u8] = &[0, 0, 0, 4, 0, 0, 0, 0];
        let err = read_startup_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, StartupFrameError::InvalidLength(4)));

        let mut reader: &[u8] = &[0, 0, 0x27, 0x11];
        let err = read_startup_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, StartupFrameError::InvalidLength(10001)));
    }

    #[tokio::test]
    async fn read_reports_close_mid_packet() {
        let frame = login_frame();
        let mut reader = &frame[..frame.len() - 3];
        let err = read_startup_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, StartupFrameError::Closed));

        let mut empty: &[u8] = &[];
        let err = read_startup_frame(&mut empty).await.unwrap_err();
        assert!(matches!(err, StartupFrameError::Closed));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
