//! Client session state
//!
//! This module provides the ClientState struct which carries what the
//! extension needs to know about one connected client.

use crate::protocol::{ByteOrder, ClientId};

/// Request state of a connected X11 client
#[derive(Debug, Clone)]
pub struct ClientState {
    /// Client index assigned by the registry
    pub id: ClientId,

    /// Byte order for this client (from setup request)
    byte_order: ByteOrder,

    /// Sequence number of the last request
    sequence_number: u16,
}

impl ClientState {
    pub fn new(id: ClientId, byte_order: ByteOrder) -> Self {
        ClientState {
            id,
            byte_order,
            sequence_number: 0,
        }
    }

    /// Get the client's byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Get the current sequence number
    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// Advance to the next request and return its sequence number
    pub fn next_sequence(&mut self) -> u16 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.sequence_number
    }
}
