//! X11 protocol error codes and error handling

use super::types::*;
use crate::security::SidError;
use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;

/// X11 error codes as defined in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Request = 1,
    Value = 2,
    Window = 3,
    Pixmap = 4,
    Atom = 5,
    Cursor = 6,
    Font = 7,
    Match = 8,
    Drawable = 9,
    Access = 10,
    Alloc = 11,
    Colormap = 12,
    GContext = 13,
    IDChoice = 14,
    Name = 15,
    Length = 16,
    Implementation = 17,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Request => "Request: bad request code",
            ErrorCode::Value => "Value: integer parameter out of range",
            ErrorCode::Window => "Window: invalid Window parameter",
            ErrorCode::Pixmap => "Pixmap: invalid Pixmap parameter",
            ErrorCode::Atom => "Atom: invalid Atom parameter",
            ErrorCode::Cursor => "Cursor: invalid Cursor parameter",
            ErrorCode::Font => "Font: invalid Font parameter",
            ErrorCode::Match => "Match: parameter mismatch",
            ErrorCode::Drawable => "Drawable: invalid Drawable parameter",
            ErrorCode::Access => "Access: attempt to access private resource",
            ErrorCode::Alloc => "Alloc: insufficient resources",
            ErrorCode::Colormap => "Colormap: invalid Colormap parameter",
            ErrorCode::GContext => "GContext: invalid GC parameter",
            ErrorCode::IDChoice => "IDChoice: invalid resource ID for this connection",
            ErrorCode::Name => "Name: font or color name doesn't exist",
            ErrorCode::Length => "Length: request length incorrect",
            ErrorCode::Implementation => "Implementation: server implementation error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// X11 error packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Error {
    pub code: ErrorCode,
    pub sequence: u16,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl X11Error {
    pub fn new(
        code: ErrorCode,
        sequence: u16,
        bad_value: u32,
        minor_opcode: u16,
        major_opcode: u8,
    ) -> Self {
        X11Error {
            code,
            sequence,
            bad_value,
            minor_opcode,
            major_opcode,
        }
    }

    /// Encode error to wire format (32 bytes) in the client's byte order
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut buffer = vec![0u8; 32];

        buffer[0] = 0; // Error reply type
        buffer[1] = self.code as u8;
        byte_order.write_u16(&mut buffer[2..4], self.sequence);
        byte_order.write_u32(&mut buffer[4..8], self.bad_value);
        byte_order.write_u16(&mut buffer[8..10], self.minor_opcode);
        buffer[10] = self.major_opcode;

        buffer
    }
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X11 Error: {} (sequence: {}, value: 0x{:08x}, major: {}, minor: {})",
            self.code, self.sequence, self.bad_value, self.major_opcode, self.minor_opcode
        )
    }
}

impl std::error::Error for X11Error {}

/// Failure reported by the object registry when resolving an id.
///
/// The code is sent to the client untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{code} (resource 0x{value:08x})")]
pub struct LookupError {
    pub code: ErrorCode,
    pub value: u32,
}

impl LookupError {
    pub fn new(code: ErrorCode, value: u32) -> Self {
        LookupError { code, value }
    }

    pub fn access(value: u32) -> Self {
        LookupError::new(ErrorCode::Access, value)
    }
}

/// Why a single extension request was rejected
#[derive(Debug, Error)]
pub enum RequestError {
    /// Malformed request shape, or an empty label where one is required
    #[error("request length does not match its contents")]
    BadLength,

    #[error("unknown minor opcode {0}")]
    BadRequest(u8),

    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("security context rejected: {0}")]
    Label(#[from] SidError),

    #[error("insufficient resources")]
    Alloc,
}

impl From<TryReserveError> for RequestError {
    fn from(_: TryReserveError) -> Self {
        RequestError::Alloc
    }
}

impl RequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::BadLength => ErrorCode::Length,
            RequestError::BadRequest(_) => ErrorCode::Request,
            RequestError::Lookup(e) => e.code,
            RequestError::Label(_) => ErrorCode::Value,
            RequestError::Alloc => ErrorCode::Alloc,
        }
    }

    pub fn bad_value(&self) -> u32 {
        match self {
            RequestError::Lookup(e) => e.value,
            _ => 0,
        }
    }

    /// Build the error packet for the request that failed
    pub fn to_x11(&self, sequence: u16, major_opcode: u8, minor_opcode: u8) -> X11Error {
        X11Error::new(
            self.code(),
            sequence,
            self.bad_value(),
            minor_opcode as u16,
            major_opcode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_packet_byte_order() {
        let error = X11Error::new(ErrorCode::Window, 0x0102, 0xdead_beef, 7, 130);

        let msb = error.encode(ByteOrder::MSBFirst);
        assert_eq!(msb.len(), 32);
        assert_eq!(msb[0], 0);
        assert_eq!(msb[1], ErrorCode::Window as u8);
        assert_eq!(&msb[2..4], &[0x01, 0x02]);
        assert_eq!(&msb[4..8], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&msb[8..10], &[0, 7]);
        assert_eq!(msb[10], 130);

        let lsb = error.encode(ByteOrder::LSBFirst);
        assert_eq!(&lsb[2..4], &[0x02, 0x01]);
        assert_eq!(&lsb[4..8], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&lsb[8..10], &[7, 0]);
    }

    #[test]
    fn test_request_error_mapping() {
        let lookup = RequestError::from(LookupError::new(ErrorCode::Window, 0x400001));
        assert_eq!(lookup.code(), ErrorCode::Window);
        assert_eq!(lookup.bad_value(), 0x400001);

        let err = RequestError::BadLength.to_x11(9, 131, 3);
        assert_eq!(err.code, ErrorCode::Length);
        assert_eq!(err.minor_opcode, 3);
        assert_eq!(err.major_opcode, 131);
        assert_eq!(RequestError::Alloc.code(), ErrorCode::Alloc);
        assert_eq!(RequestError::BadRequest(99).code(), ErrorCode::Request);
    }
}
