//! Core X11 protocol types
//!
//! These types represent the fundamental data types used by the SELinux
//! extension requests. They are kept minimal and close to the wire protocol.

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};
use std::fmt;

/// X11 resource ID - used for windows, devices and client-owned resources.
/// In X11, all objects are identified by 29-bit IDs.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XID(pub u32);

impl XID {
    pub fn new(id: u32) -> Self {
        XID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for XID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Window ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window(pub XID);

impl Window {
    pub fn new(id: u32) -> Self {
        Window(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Atom - interned string identifier, names properties and selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

impl Atom {
    pub const PRIMARY: Atom = Atom(1);
    pub const SECONDARY: Atom = Atom(2);
    pub const WM_NAME: Atom = Atom(39);

    pub fn new(id: u32) -> Self {
        Atom(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Number of bits of a resource ID below the client index.
pub const CLIENT_OFFSET: u32 = 21;

/// Mask selecting the client index bits of a resource ID.
pub const RESOURCE_CLIENT_MASK: u32 = 0x1fe0_0000;

/// Index of a connected client. Index 0 is the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl ClientId {
    pub const SERVER: ClientId = ClientId(0);

    /// Client that owns the given resource ID
    pub fn from_resource(id: u32) -> Self {
        ClientId((id & RESOURCE_CLIENT_MASK) >> CLIENT_OFFSET)
    }

    /// First resource ID allocated to this client
    pub fn resource_base(&self) -> u32 {
        self.0 << CLIENT_OFFSET
    }

    pub fn is_server(&self) -> bool {
        *self == ClientId::SERVER
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {}", self.0)
    }
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LSBFirst = 0,
    MSBFirst = 1,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LSBFirst
        } else {
            ByteOrder::MSBFirst
        }
    }

    /// Whether integers from a client in this order must be swapped
    pub fn is_swapped(&self) -> bool {
        *self != ByteOrder::native()
    }

    pub fn write_u16(&self, buf: &mut [u8], value: u16) {
        match self {
            ByteOrder::MSBFirst => BigEndian::write_u16(buf, value),
            ByteOrder::LSBFirst => LittleEndian::write_u16(buf, value),
        }
    }

    pub fn write_u32(&self, buf: &mut [u8], value: u32) {
        match self {
            ByteOrder::MSBFirst => BigEndian::write_u32(buf, value),
            ByteOrder::LSBFirst => LittleEndian::write_u32(buf, value),
        }
    }

    pub fn read_u16(&self, buf: &[u8]) -> u16 {
        match self {
            ByteOrder::MSBFirst => BigEndian::read_u16(buf),
            ByteOrder::LSBFirst => LittleEndian::read_u16(buf),
        }
    }

    pub fn read_u32(&self, buf: &[u8]) -> u32 {
        match self {
            ByteOrder::MSBFirst => BigEndian::read_u32(buf),
            ByteOrder::LSBFirst => LittleEndian::read_u32(buf),
        }
    }
}
