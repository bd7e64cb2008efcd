/// XSELinux - SELinux labeling extension for an X11 server
///
/// This library implements the request/reply engine of the SELinux
/// extension: security context handles, labeled object records, the
/// byte-order aware wire codec and the request handlers.

pub mod protocol;
pub mod security;
pub mod resources;
pub mod server;

pub use protocol::{Atom, ByteOrder, ClientId, Window, X11Error};
pub use security::{SelinuxConfig, SelinuxMode, Sid, SidTable};
pub use server::{ClientState, Server};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
