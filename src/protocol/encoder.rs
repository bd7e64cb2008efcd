//! SELinux reply encoder
//!
//! This module encodes extension replies to the wire protocol. Only the
//! integer fields follow the client's byte order; label bytes are copied
//! verbatim, NUL-terminated and zero-padded to a 4-byte boundary.

use super::*;
use std::collections::TryReserveError;

/// Size of every reply header
pub const REPLY_HEADER_SIZE: usize = 32;

/// Length in 4-byte units of a NUL-terminated label
pub fn context_words(context: &str) -> usize {
    padded_len(context.len() + 1) / 4
}

/// One entry of a ListProperties or ListSelections reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Atom naming the property or selection
    pub id: u32,
    pub object_context: String,
    pub data_context: String,
}

impl ListItem {
    pub fn object_words(&self) -> usize {
        context_words(&self.object_context)
    }

    pub fn data_words(&self) -> usize {
        context_words(&self.data_context)
    }

    /// Size on the wire: id, two lengths, then both padded labels
    pub fn words(&self) -> usize {
        3 + self.object_words() + self.data_words()
    }
}

/// Reply encoder
pub struct ProtocolEncoder {
    byte_order: ByteOrder,
}

impl ProtocolEncoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        ProtocolEncoder { byte_order }
    }

    // Helper methods for writing with correct byte order
    fn write_u16(&self, value: u16) -> [u8; 2] {
        let mut bytes = [0u8; 2];
        self.byte_order.write_u16(&mut bytes, value);
        bytes
    }

    fn write_u32(&self, value: u32) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        self.byte_order.write_u32(&mut bytes, value);
        bytes
    }

    fn reply_header(&self, buffer: &mut [u8], sequence: u16, length: u32) {
        buffer[0] = 1; // Reply
        buffer[2..4].copy_from_slice(&self.write_u16(sequence));
        buffer[4..8].copy_from_slice(&self.write_u32(length));
    }

    /// Encode QueryVersion reply
    pub fn encode_query_version_reply(
        &self,
        sequence: u16,
        server_major: u16,
        server_minor: u16,
    ) -> Vec<u8> {
        let mut buffer = vec![0u8; REPLY_HEADER_SIZE];

        self.reply_header(&mut buffer, sequence, 0);
        buffer[8..10].copy_from_slice(&self.write_u16(server_major));
        buffer[10..12].copy_from_slice(&self.write_u16(server_minor));

        buffer
    }

    /// Encode a single-label reply. `None` encodes an empty label.
    pub fn encode_context_reply(&self, sequence: u16, context: Option<&str>) -> Vec<u8> {
        let context_len = context.map(|ctx| ctx.len() + 1).unwrap_or(0);
        let context_padded = padded_len(context_len);

        let mut buffer = vec![0u8; REPLY_HEADER_SIZE];
        self.reply_header(&mut buffer, sequence, (context_padded / 4) as u32);
        buffer[8..12].copy_from_slice(&self.write_u32(context_len as u32));

        if let Some(ctx) = context {
            buffer.extend_from_slice(ctx.as_bytes());
            buffer.push(0);
        }

        // Pad to 4-byte boundary
        buffer.resize(REPLY_HEADER_SIZE + context_padded, 0);

        buffer
    }

    /// Encode a ListProperties/ListSelections reply.
    ///
    /// `size` is the payload length in 4-byte units, the sum of
    /// [`ListItem::words`] over `items`.
    pub fn encode_list_items_reply(
        &self,
        sequence: u16,
        items: &[ListItem],
        size: usize,
    ) -> Result<Vec<u8>, TryReserveError> {
        let total = REPLY_HEADER_SIZE + size * 4;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(total)?;
        buffer.resize(REPLY_HEADER_SIZE, 0);

        self.reply_header(&mut buffer, sequence, size as u32);
        buffer[8..12].copy_from_slice(&self.write_u32(items.len() as u32));

        for item in items {
            buffer.extend_from_slice(&self.write_u32(item.id));
            buffer.extend_from_slice(&self.write_u32((item.object_words() * 4) as u32));
            buffer.extend_from_slice(&self.write_u32((item.data_words() * 4) as u32));
            self.push_context(&mut buffer, &item.object_context);
            self.push_context(&mut buffer, &item.data_context);
        }

        debug_assert_eq!(buffer.len(), total);
        Ok(buffer)
    }

    fn push_context(&self, buffer: &mut Vec<u8>, context: &str) {
        buffer.extend_from_slice(context.as_bytes());
        buffer.push(0);
        while !buffer.len().is_multiple_of(4) {
            buffer.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_version_reply() {
        let reply = ProtocolEncoder::new(ByteOrder::MSBFirst).encode_query_version_reply(5, 1, 0);
        assert_eq!(reply.len(), 32);
        assert_eq!(reply[0], 1);
        assert_eq!(&reply[2..4], &[0, 5]);
        assert_eq!(&reply[4..8], &[0, 0, 0, 0]);
        assert_eq!(&reply[8..12], &[0, 1, 0, 0]);
    }

    #[test]
    fn test_context_reply_layout() {
        let ctx = "system_u:object_r:x_t:s0"; // 24 bytes + NUL
        let reply = ProtocolEncoder::new(ByteOrder::LSBFirst).encode_context_reply(2, Some(ctx));
        assert_eq!(reply.len(), 32 + 28);
        assert_eq!(&reply[4..8], &7u32.to_le_bytes());
        assert_eq!(&reply[8..12], &25u32.to_le_bytes());
        assert_eq!(&reply[32..56], ctx.as_bytes());
        assert!(reply[56..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_context_reply() {
        let reply = ProtocolEncoder::new(ByteOrder::MSBFirst).encode_context_reply(1, None);
        assert_eq!(reply.len(), 32);
        assert_eq!(&reply[4..12], &[0u8; 8]);
    }

    #[test]
    fn test_list_items_layout() {
        let items = vec![
            ListItem {
                id: 39,
                object_context: "a:b:c".to_string(),      // 6 bytes -> 2 words
                data_context: "a:b:data_t".to_string(), // 11 bytes -> 3 words
            },
            ListItem {
                id: 40,
                object_context: "abc".to_string(), // 4 bytes -> 1 word
                data_context: "abc".to_string(),
            },
        ];
        let size: usize = items.iter().map(ListItem::words).sum();
        assert_eq!(size, (3 + 2 + 3) + (3 + 1 + 1));

        let reply = ProtocolEncoder::new(ByteOrder::MSBFirst)
            .encode_list_items_reply(3, &items, size)
            .unwrap();
        assert_eq!(reply.len(), 32 + size * 4);
        assert_eq!(&reply[4..8], &(size as u32).to_be_bytes());
        assert_eq!(&reply[8..12], &2u32.to_be_bytes());

        let body = &reply[32..];
        assert_eq!(&body[0..4], &39u32.to_be_bytes());
        assert_eq!(&body[4..8], &8u32.to_be_bytes());
        assert_eq!(&body[8..12], &12u32.to_be_bytes());
        assert_eq!(&body[12..18], b"a:b:c\0");
        assert_eq!(&body[18..20], &[0, 0]);
        assert_eq!(&body[20..31], b"a:b:data_t\0");
        assert_eq!(&body[32..36], &40u32.to_be_bytes());
        assert_eq!(&body[44..48], b"abc\0");
    }

    #[test]
    fn test_empty_list_reply() {
        let reply = ProtocolEncoder::new(ByteOrder::LSBFirst)
            .encode_list_items_reply(1, &[], 0)
            .unwrap();
        assert_eq!(reply.len(), 32);
        assert_eq!(&reply[4..12], &[0u8; 8]);
    }
}
