use std::{error::Error as StdError, fmt};

use bytes::{BufMut, Bytes, BytesMut};

use super::be_u32;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const SSL_REQUEST_CODE: u32 = 80877103;

pub const SSL_REQUEST_LEN: usize = 8;

// -----------------------------------------------------------------------------
// ----- SslRequestFrame -------------------------------------------------------

/// `Int32(8) Int32(80877103)`: asks the server for an encrypted channel.
pub struct SslRequestFrame;

impl SslRequestFrame {
    pub fn validate(frame: &[u8]) -> Result<(), SslRequestFrameError> {
        if frame.len() != SSL_REQUEST_LEN {
            return Err(SslRequestFrameError::UnexpectedLength(frame.len()));
        }

        match (be_u32(&frame[0..]) as usize, be_u32(&frame[4..])) {
            (SSL_REQUEST_LEN, SSL_REQUEST_CODE) => Ok(()),
            (SSL_REQUEST_LEN, code) => Err(SslRequestFrameError::UnexpectedCode(code)),
            (len, _) => Err(SslRequestFrameError::UnexpectedLength(len)),
        }
    }

    pub fn encode() -> Bytes {
        let mut frame = BytesMut::with_capacity(SSL_REQUEST_LEN);
        frame.put_u32(SSL_REQUEST_LEN as u32);
        frame.put_u32(SSL_REQUEST_CODE);
        frame.freeze()
    }
}

// -----------------------------------------------------------------------------
// ----- SslResponse -----------------------------------------------------------

/// The single byte a server answers an SSLRequest with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SslResponse {
    Accepted,
    Declined,
    Unexpected(u8),
}

impl SslResponse {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'S' => SslResponse::Accepted,
            b'N' => SslResponse::Declined,
            other => SslResponse::Unexpected(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            SslResponse::Accepted => b'S',
            SslResponse::Declined => b'N',
            SslResponse::Unexpected(other) => other,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug)]
pub enum SslRequestFrameError {
    UnexpectedLength(usize),
    UnexpectedCode(u32),
}

impl fmt::Display for SslRequestFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslRequestFrameError::UnexpectedLength(len) => {
                write!(f, "SSLRequest must be {SSL_REQUEST_LEN} bytes, got {len}")
            }
            SslRequestFrameError::UnexpectedCode(code) => {
                write!(f, "not an SSLRequest code: {code}")
            }
        }
    }
}

impl StdError for SslRequestFrameError {}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_bit_exact() {
        let frame = SslRequestFrame::encode();
        assert_eq!(&frame[..], &[0x00, 0x00, 0x00, 0x08, 0x04, 0xD2, 0x16, 0x2F]);
        assert!(SslRequestFrame::validate(&frame).is_ok());
    }

    #[test]
    fn trailing_byte_is_rejected() {
        let mut frame = SslRequestFrame::encode().to_vec();
        frame.push(0);
        let err = SslRequestFrame::validate(&frame).unwrap_err();
        assert!(matches!(err, SslRequestFrameError::UnexpectedLength(9)));
    }

    #[test]
    fn declared_length_must_be_eight() {
        let mut frame = BytesMut::new();
        frame.put_u32(12);
        frame.put_u32(SSL_REQUEST_CODE);
        let err = SslRequestFrame::validate(&frame).unwrap_err();
        assert!(matches!(err, SslRequestFrameError::UnexpectedLength(12)));
    }

    #[test]
    fn other_codes_are_rejected() {
        let mut frame = BytesMut::new();
        frame.put_u32(8);
        frame.put_u32(80877104);
        let err = SslRequestFrame::validate(&frame).unwrap_err();
        assert!(matches!(err, SslRequestFrameError::UnexpectedCode(80877104)));
    }

    #[test]
    fn response_bytes() {
        assert_eq!(SslResponse::from_byte(b'S'), SslResponse::Accepted);
        assert_eq!(SslResponse::from_byte(b'N'), SslResponse::Declined);
        assert_eq!(SslResponse::from_byte(b'E'), SslResponse::Unexpected(b'E'));
        assert_eq!(SslResponse::Declined.as_byte(), b'N');
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
