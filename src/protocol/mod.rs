/// SELinux extension wire protocol
///
/// This module implements the wire side of the extension: types, error
/// packets, the request table, the request parser and the reply encoder.

pub mod types;
pub mod errors;
pub mod requests;
pub mod parser;
pub mod encoder;

pub use types::*;
pub use errors::*;
pub use requests::*;
pub use parser::*;
pub use encoder::*;

/// Extension name advertised through QueryExtension
pub const SELINUX_EXTENSION_NAME: &str = "SELinux";

/// Name the extension was first published under
pub const SELINUX_EXTENSION_ALIAS: &str = "Flask";

/// Extension protocol version
pub const SELINUX_MAJOR_VERSION: u16 = 1;
pub const SELINUX_MINOR_VERSION: u16 = 0;

/// The extension defines no events and no errors of its own
pub const SELINUX_NUMBER_EVENTS: u8 = 0;
pub const SELINUX_NUMBER_ERRORS: u8 = 0;

/// Padding helper - X11 requires data to be padded to 4-byte boundaries
pub fn pad(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// Calculate padded length
pub fn padded_len(n: usize) -> usize {
    n + pad(n)
}
