//! SELinux extension request parser
//!
//! Requests from clients of the opposite byte order are first normalized in
//! place: the header length and every field named in the opcode's swap list
//! are byte-swapped, so decoding always reads native-endian integers. Label
//! bytes are never touched.

use super::*;
use byteorder::{ByteOrder as Endian, NativeEndian};

/// Generic extension request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub major_opcode: u8,
    pub minor_opcode: u8,
    /// Request length in 4-byte units, header included
    pub length: u16,
}

/// Request parser for one client connection
pub struct ProtocolParser {
    byte_order: ByteOrder,
}

impl ProtocolParser {
    pub fn new(byte_order: ByteOrder) -> Self {
        ProtocolParser { byte_order }
    }

    /// Swap the header and the opcode's integer fields into native order.
    ///
    /// Fails before touching any field if the request is too short for its
    /// opcode or its length field disagrees with the buffer.
    pub fn normalize(
        &self,
        buffer: &mut [u8],
    ) -> Result<(RequestHeader, &'static RequestSpec), RequestError> {
        if buffer.len() < REQUEST_HEADER_SIZE {
            return Err(RequestError::BadLength);
        }

        let swapped = self.byte_order.is_swapped();
        if swapped {
            SwapField::Card16(2).apply(buffer);
        }

        let header = RequestHeader {
            major_opcode: buffer[0],
            minor_opcode: buffer[1],
            length: NativeEndian::read_u16(&buffer[2..4]),
        };

        if header.length as usize * 4 != buffer.len() {
            return Err(RequestError::BadLength);
        }

        let spec = request_spec(header.minor_opcode)
            .ok_or(RequestError::BadRequest(header.minor_opcode))?;

        if buffer.len() < spec.size.minimum() {
            return Err(RequestError::BadLength);
        }

        if swapped {
            for field in spec.swap {
                field.apply(buffer);
            }
        }

        Ok((header, spec))
    }

    /// Normalize and decode a complete request
    pub fn parse_request<'a>(
        &self,
        buffer: &'a mut [u8],
    ) -> Result<(RequestHeader, SelinuxRequest<'a>), RequestError> {
        let (header, spec) = self.normalize(buffer)?;
        let buffer: &'a [u8] = buffer;

        log::debug!(
            "Parsing SELinux request: {} (minor={}, length={})",
            spec.name,
            header.minor_opcode,
            header.length
        );

        let context = check_size(spec.size, buffer)?;

        let request = match spec.operation {
            Operation::QueryVersion => SelinuxRequest::QueryVersion {
                client_major: read_u16(buffer, 4),
                client_minor: read_u16(buffer, 6),
            },
            Operation::SetCreateContext(field) => SelinuxRequest::SetCreateContext {
                field,
                context,
            },
            Operation::GetCreateContext(field) => SelinuxRequest::GetCreateContext { field },
            Operation::SetDeviceContext => SelinuxRequest::SetDeviceContext {
                device: read_u32(buffer, 4),
                context,
            },
            Operation::GetDeviceContext => SelinuxRequest::GetDeviceContext {
                device: read_u32(buffer, 4),
            },
            Operation::GetWindowContext => SelinuxRequest::GetWindowContext {
                window: Window::new(read_u32(buffer, 4)),
            },
            Operation::GetPropertyContext(kind) => SelinuxRequest::GetPropertyContext {
                window: Window::new(read_u32(buffer, 4)),
                property: Atom::new(read_u32(buffer, 8)),
                kind,
            },
            Operation::ListProperties => SelinuxRequest::ListProperties {
                window: Window::new(read_u32(buffer, 4)),
            },
            Operation::GetSelectionContext(kind) => SelinuxRequest::GetSelectionContext {
                selection: Atom::new(read_u32(buffer, 4)),
                kind,
            },
            Operation::ListSelections => SelinuxRequest::ListSelections,
            Operation::GetClientContext => SelinuxRequest::GetClientContext {
                resource: read_u32(buffer, 4),
            },
        };

        Ok((header, request))
    }
}

/// Check the request against its size rule and return the label bytes
/// (empty for fixed-size requests)
fn check_size(size: RequestSize, buffer: &[u8]) -> Result<&[u8], RequestError> {
    match size {
        RequestSize::Exact(expected) => {
            if buffer.len() != expected {
                return Err(RequestError::BadLength);
            }
            Ok(&[])
        }
        RequestSize::WithContext { fixed, len_offset } => {
            let context_len = read_u32(buffer, len_offset) as usize;
            let end = fixed
                .checked_add(context_len)
                .ok_or(RequestError::BadLength)?;
            if padded_len(end) != buffer.len() {
                return Err(RequestError::BadLength);
            }
            Ok(&buffer[fixed..end])
        }
    }
}

fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    NativeEndian::read_u16(&buffer[offset..offset + 2])
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    NativeEndian::read_u32(&buffer[offset..offset + 4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{ContextField, LabelKind};

    fn request(order: ByteOrder, minor: u8, fields: &[u32], tail: &[u8]) -> Vec<u8> {
        let len = padded_len(4 + fields.len() * 4 + tail.len());
        let mut buf = vec![0u8; len];
        buf[0] = 130;
        buf[1] = minor;
        order.write_u16(&mut buf[2..4], (len / 4) as u16);
        for (i, value) in fields.iter().enumerate() {
            order.write_u32(&mut buf[4 + i * 4..8 + i * 4], *value);
        }
        let start = 4 + fields.len() * 4;
        buf[start..start + tail.len()].copy_from_slice(tail);
        buf
    }

    fn foreign() -> ByteOrder {
        match ByteOrder::native() {
            ByteOrder::LSBFirst => ByteOrder::MSBFirst,
            ByteOrder::MSBFirst => ByteOrder::LSBFirst,
        }
    }

    #[test]
    fn test_parse_get_property_context_swapped() {
        let mut buf = request(foreign(), 13, &[0x0040_0001, 39], &[]);
        let parser = ProtocolParser::new(foreign());
        let (header, req) = parser.parse_request(&mut buf).unwrap();
        assert_eq!(header.length, 3);
        assert_eq!(
            req,
            SelinuxRequest::GetPropertyContext {
                window: Window::new(0x0040_0001),
                property: Atom::WM_NAME,
                kind: LabelKind::Data,
            }
        );
    }

    #[test]
    fn test_parse_set_create_context_leaves_label_bytes() {
        let label = b"user_u:object_r:foo_t:s0";
        let mut buf = request(foreign(), 5, &[label.len() as u32], label);
        let parser = ProtocolParser::new(foreign());
        let (_, req) = parser.parse_request(&mut buf).unwrap();
        assert_eq!(
            req,
            SelinuxRequest::SetCreateContext {
                field: ContextField::WindowCreate,
                context: &label[..],
            }
        );
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut buf = request(ByteOrder::native(), 7, &[1], &[]);
        buf.extend_from_slice(&[0; 4]);
        let parser = ProtocolParser::new(ByteOrder::native());
        assert!(matches!(
            parser.parse_request(&mut buf),
            Err(RequestError::BadLength)
        ));
    }

    #[test]
    fn test_fixed_size_mismatch_rejected() {
        // GetWindowContext with a trailing extra word
        let mut buf = request(ByteOrder::native(), 7, &[1, 2], &[]);
        let parser = ProtocolParser::new(ByteOrder::native());
        assert!(matches!(
            parser.parse_request(&mut buf),
            Err(RequestError::BadLength)
        ));
    }

    #[test]
    fn test_context_len_must_match_request_length() {
        // Claims 9 label bytes but only carries 4
        let mut buf = request(ByteOrder::native(), 8, &[9], b"abcd");
        let parser = ProtocolParser::new(ByteOrder::native());
        assert!(matches!(
            parser.parse_request(&mut buf),
            Err(RequestError::BadLength)
        ));
    }

    #[test]
    fn test_unknown_minor_opcode() {
        let mut buf = request(ByteOrder::native(), 42, &[], &[]);
        let parser = ProtocolParser::new(ByteOrder::native());
        assert!(matches!(
            parser.parse_request(&mut buf),
            Err(RequestError::BadRequest(42))
        ));
    }

    #[test]
    fn test_list_selections_has_no_fields() {
        let mut buf = request(foreign(), 21, &[], &[]);
        let parser = ProtocolParser::new(foreign());
        let (_, req) = parser.parse_request(&mut buf).unwrap();
        assert_eq!(req, SelinuxRequest::ListSelections);
    }
}
