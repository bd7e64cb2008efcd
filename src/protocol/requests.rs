//! SELinux extension request definitions
//!
//! Every minor opcode has one entry in [`SELINUX_REQUESTS`]: its wire size,
//! the multi-byte fields that need swapping for clients of the opposite byte
//! order, and the operation it performs.

use super::types::*;
use crate::security::{ContextField, LabelKind};

/// Size of the generic extension request header (major, minor, length)
pub const REQUEST_HEADER_SIZE: usize = 4;

/// SELinux extension minor opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SelinuxOpcode {
    QueryVersion = 0,
    SetDeviceCreateContext = 1,
    GetDeviceCreateContext = 2,
    SetDeviceContext = 3,
    GetDeviceContext = 4,
    SetWindowCreateContext = 5,
    GetWindowCreateContext = 6,
    GetWindowContext = 7,
    SetPropertyCreateContext = 8,
    GetPropertyCreateContext = 9,
    SetPropertyUseContext = 10,
    GetPropertyUseContext = 11,
    GetPropertyContext = 12,
    GetPropertyDataContext = 13,
    ListProperties = 14,
    SetSelectionCreateContext = 15,
    GetSelectionCreateContext = 16,
    SetSelectionUseContext = 17,
    GetSelectionUseContext = 18,
    GetSelectionContext = 19,
    GetSelectionDataContext = 20,
    ListSelections = 21,
    GetClientContext = 22,
}

impl SelinuxOpcode {
    pub fn from_u8(opcode: u8) -> Option<Self> {
        SELINUX_REQUESTS
            .get(opcode as usize)
            .map(|spec| spec.opcode)
    }
}

/// A multi-byte integer field of a request, by byte offset from the start
/// of the request (header included)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapField {
    Card16(usize),
    Card32(usize),
}

impl SwapField {
    /// Reverse the field's bytes in place
    pub fn apply(&self, buffer: &mut [u8]) {
        match *self {
            SwapField::Card16(offset) => buffer[offset..offset + 2].reverse(),
            SwapField::Card32(offset) => buffer[offset..offset + 4].reverse(),
        }
    }

    pub fn end(&self) -> usize {
        match *self {
            SwapField::Card16(offset) => offset + 2,
            SwapField::Card32(offset) => offset + 4,
        }
    }
}

/// Expected size of a request on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSize {
    /// Fixed-size request, must match exactly
    Exact(usize),
    /// Fixed part followed by `context_len` label bytes, padded to 4 bytes.
    /// `len_offset` locates the CARD32 `context_len` field.
    WithContext { fixed: usize, len_offset: usize },
}

impl RequestSize {
    /// Smallest request that can be decoded at all
    pub fn minimum(&self) -> usize {
        match *self {
            RequestSize::Exact(size) => size,
            RequestSize::WithContext { fixed, .. } => fixed,
        }
    }
}

/// What a request does once decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QueryVersion,
    SetCreateContext(ContextField),
    GetCreateContext(ContextField),
    SetDeviceContext,
    GetDeviceContext,
    GetWindowContext,
    GetPropertyContext(LabelKind),
    ListProperties,
    GetSelectionContext(LabelKind),
    ListSelections,
    GetClientContext,
}

/// Static description of one minor opcode
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec {
    pub opcode: SelinuxOpcode,
    pub name: &'static str,
    pub size: RequestSize,
    /// Integer fields beyond the generic header, in field order
    pub swap: &'static [SwapField],
    pub operation: Operation,
}

const QUERY_VERSION_SIZE: usize = 8;
const SET_CREATE_CONTEXT_SIZE: usize = 8;
const GET_CREATE_CONTEXT_SIZE: usize = 4;
const SET_CONTEXT_SIZE: usize = 12;
const GET_CONTEXT_SIZE: usize = 8;
const GET_PROPERTY_CONTEXT_SIZE: usize = 12;

const NO_SWAP: &[SwapField] = &[];
const SWAP_VERSION: &[SwapField] = &[SwapField::Card16(4), SwapField::Card16(6)];
const SWAP_CONTEXT_LEN: &[SwapField] = &[SwapField::Card32(4)];
const SWAP_ID: &[SwapField] = &[SwapField::Card32(4)];
const SWAP_ID_CONTEXT_LEN: &[SwapField] = &[SwapField::Card32(4), SwapField::Card32(8)];
const SWAP_WINDOW_PROPERTY: &[SwapField] = &[SwapField::Card32(4), SwapField::Card32(8)];

const fn set_create(opcode: SelinuxOpcode, name: &'static str, field: ContextField) -> RequestSpec {
    RequestSpec {
        opcode,
        name,
        size: RequestSize::WithContext {
            fixed: SET_CREATE_CONTEXT_SIZE,
            len_offset: 4,
        },
        swap: SWAP_CONTEXT_LEN,
        operation: Operation::SetCreateContext(field),
    }
}

const fn get_create(opcode: SelinuxOpcode, name: &'static str, field: ContextField) -> RequestSpec {
    RequestSpec {
        opcode,
        name,
        size: RequestSize::Exact(GET_CREATE_CONTEXT_SIZE),
        swap: NO_SWAP,
        operation: Operation::GetCreateContext(field),
    }
}

const fn get_by_id(opcode: SelinuxOpcode, name: &'static str, operation: Operation) -> RequestSpec {
    RequestSpec {
        opcode,
        name,
        size: RequestSize::Exact(GET_CONTEXT_SIZE),
        swap: SWAP_ID,
        operation,
    }
}

const fn get_property(opcode: SelinuxOpcode, name: &'static str, kind: LabelKind) -> RequestSpec {
    RequestSpec {
        opcode,
        name,
        size: RequestSize::Exact(GET_PROPERTY_CONTEXT_SIZE),
        swap: SWAP_WINDOW_PROPERTY,
        operation: Operation::GetPropertyContext(kind),
    }
}

/// Dispatch table indexed by minor opcode
pub static SELINUX_REQUESTS: [RequestSpec; 23] = [
    RequestSpec {
        opcode: SelinuxOpcode::QueryVersion,
        name: "QueryVersion",
        size: RequestSize::Exact(QUERY_VERSION_SIZE),
        swap: SWAP_VERSION,
        operation: Operation::QueryVersion,
    },
    set_create(
        SelinuxOpcode::SetDeviceCreateContext,
        "SetDeviceCreateContext",
        ContextField::DeviceCreate,
    ),
    get_create(
        SelinuxOpcode::GetDeviceCreateContext,
        "GetDeviceCreateContext",
        ContextField::DeviceCreate,
    ),
    RequestSpec {
        opcode: SelinuxOpcode::SetDeviceContext,
        name: "SetDeviceContext",
        size: RequestSize::WithContext {
            fixed: SET_CONTEXT_SIZE,
            len_offset: 8,
        },
        swap: SWAP_ID_CONTEXT_LEN,
        operation: Operation::SetDeviceContext,
    },
    get_by_id(
        SelinuxOpcode::GetDeviceContext,
        "GetDeviceContext",
        Operation::GetDeviceContext,
    ),
    set_create(
        SelinuxOpcode::SetWindowCreateContext,
        "SetWindowCreateContext",
        ContextField::WindowCreate,
    ),
    get_create(
        SelinuxOpcode::GetWindowCreateContext,
        "GetWindowCreateContext",
        ContextField::WindowCreate,
    ),
    get_by_id(
        SelinuxOpcode::GetWindowContext,
        "GetWindowContext",
        Operation::GetWindowContext,
    ),
    set_create(
        SelinuxOpcode::SetPropertyCreateContext,
        "SetPropertyCreateContext",
        ContextField::PropertyCreate,
    ),
    get_create(
        SelinuxOpcode::GetPropertyCreateContext,
        "GetPropertyCreateContext",
        ContextField::PropertyCreate,
    ),
    set_create(
        SelinuxOpcode::SetPropertyUseContext,
        "SetPropertyUseContext",
        ContextField::PropertyUse,
    ),
    get_create(
        SelinuxOpcode::GetPropertyUseContext,
        "GetPropertyUseContext",
        ContextField::PropertyUse,
    ),
    get_property(
        SelinuxOpcode::GetPropertyContext,
        "GetPropertyContext",
        LabelKind::Object,
    ),
    get_property(
        SelinuxOpcode::GetPropertyDataContext,
        "GetPropertyDataContext",
        LabelKind::Data,
    ),
    get_by_id(
        SelinuxOpcode::ListProperties,
        "ListProperties",
        Operation::ListProperties,
    ),
    set_create(
        SelinuxOpcode::SetSelectionCreateContext,
        "SetSelectionCreateContext",
        ContextField::SelectionCreate,
    ),
    get_create(
        SelinuxOpcode::GetSelectionCreateContext,
        "GetSelectionCreateContext",
        ContextField::SelectionCreate,
    ),
    set_create(
        SelinuxOpcode::SetSelectionUseContext,
        "SetSelectionUseContext",
        ContextField::SelectionUse,
    ),
    get_create(
        SelinuxOpcode::GetSelectionUseContext,
        "GetSelectionUseContext",
        ContextField::SelectionUse,
    ),
    get_by_id(
        SelinuxOpcode::GetSelectionContext,
        "GetSelectionContext",
        Operation::GetSelectionContext(LabelKind::Object),
    ),
    get_by_id(
        SelinuxOpcode::GetSelectionDataContext,
        "GetSelectionDataContext",
        Operation::GetSelectionContext(LabelKind::Data),
    ),
    // Selections are global: the request carries nothing beyond the header.
    RequestSpec {
        opcode: SelinuxOpcode::ListSelections,
        name: "ListSelections",
        size: RequestSize::Exact(GET_CREATE_CONTEXT_SIZE),
        swap: NO_SWAP,
        operation: Operation::ListSelections,
    },
    get_by_id(
        SelinuxOpcode::GetClientContext,
        "GetClientContext",
        Operation::GetClientContext,
    ),
];

/// Look up the table entry for a minor opcode
pub fn request_spec(minor_opcode: u8) -> Option<&'static RequestSpec> {
    SELINUX_REQUESTS.get(minor_opcode as usize)
}

/// A decoded SELinux request. Label bytes borrow from the request buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelinuxRequest<'a> {
    QueryVersion {
        client_major: u16,
        client_minor: u16,
    },
    SetCreateContext {
        field: ContextField,
        context: &'a [u8],
    },
    GetCreateContext {
        field: ContextField,
    },
    SetDeviceContext {
        device: u32,
        context: &'a [u8],
    },
    GetDeviceContext {
        device: u32,
    },
    GetWindowContext {
        window: Window,
    },
    GetPropertyContext {
        window: Window,
        property: Atom,
        kind: LabelKind,
    },
    ListProperties {
        window: Window,
    },
    GetSelectionContext {
        selection: Atom,
        kind: LabelKind,
    },
    ListSelections,
    GetClientContext {
        resource: u32,
    },
}
