//! Core server glue for the SELinux extension
//!
//! This module contains the extension table, the enablement checks run at
//! startup, client registration and the routing of extension requests to
//! the SELinux handlers.

mod client;
pub mod extensions;

pub use client::ClientState;
pub use extensions::{Reply, SelinuxExtension};

use crate::protocol::*;
use crate::resources::LabelRegistry;
use crate::security::*;
use std::collections::HashMap;

/// First major opcode available to extensions
const FIRST_EXTENSION_OPCODE: u8 = 128;

/// First event code available to extensions
const FIRST_EXTENSION_EVENT: u8 = 64;

/// First error code available to extensions
const FIRST_EXTENSION_ERROR: u8 = 128;

/// Extension information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub major_opcode: u8,
    pub first_event: u8,
    pub first_error: u8,
}

/// Registered extensions by name and alias
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    extensions: HashMap<String, ExtensionInfo>,
    next_opcode: Option<u8>,
    next_event: u8,
    next_error: u8,
}

impl Default for ExtensionTable {
    fn default() -> Self {
        ExtensionTable::new()
    }
}

impl ExtensionTable {
    pub fn new() -> Self {
        ExtensionTable {
            extensions: HashMap::new(),
            next_opcode: Some(FIRST_EXTENSION_OPCODE),
            next_event: FIRST_EXTENSION_EVENT,
            next_error: FIRST_EXTENSION_ERROR,
        }
    }

    /// Register an extension, allocating its major opcode and its event and
    /// error ranges. Returns None if the name is taken or the opcodes are
    /// exhausted.
    pub fn register(&mut self, name: &str, num_events: u8, num_errors: u8) -> Option<ExtensionInfo> {
        if self.extensions.contains_key(name) {
            return None;
        }

        let major_opcode = self.next_opcode?;
        let first_event = if num_events > 0 { self.next_event } else { 0 };
        let first_error = if num_errors > 0 { self.next_error } else { 0 };
        let next_event = self.next_event.checked_add(num_events)?;
        let next_error = self.next_error.checked_add(num_errors)?;

        let info = ExtensionInfo {
            major_opcode,
            first_event,
            first_error,
        };
        self.extensions.insert(name.to_string(), info);
        self.next_opcode = major_opcode.checked_add(1);
        self.next_event = next_event;
        self.next_error = next_error;

        Some(info)
    }

    /// Make an extension reachable under another name
    pub fn add_alias(&mut self, alias: &str, name: &str) -> bool {
        match self.extensions.get(name).copied() {
            Some(info) if !self.extensions.contains_key(alias) => {
                self.extensions.insert(alias.to_string(), info);
                true
            }
            _ => false,
        }
    }

    /// Query extension by name
    pub fn query(&self, name: &str) -> Option<ExtensionInfo> {
        self.extensions.get(name).copied()
    }

    /// List all registered names, aliases included
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extensions.keys().cloned().collect();
        names.sort();
        names
    }
}

/// The server side of the SELinux extension
pub struct Server {
    config: SelinuxConfig,

    extensions: ExtensionTable,

    /// Labels of every client and object
    objects: LabelRegistry,

    /// Present only when every enablement check passed
    selinux: Option<SelinuxExtension>,
}

impl Server {
    /// Create a server and run the extension's enablement checks
    pub fn new(config: SelinuxConfig, policy: Box<dyn PolicyEngine>) -> Self {
        let mut server = Server {
            config,
            extensions: ExtensionTable::new(),
            objects: LabelRegistry::new(),
            selinux: None,
        };

        server.init_selinux(policy);
        server
    }

    fn init_selinux(&mut self, policy: Box<dyn PolicyEngine>) {
        if !policy.is_enabled() {
            log::info!("SELinux: disabled on host, not enabling in X server");
            return;
        }
        if self.config.mode == SelinuxMode::Disabled {
            log::info!("SELinux: disabled in configuration, not enabling in X server");
            return;
        }
        if !policy.boolean_active(&self.config.object_manager_boolean) {
            log::info!(
                "SELinux: {} boolean not set, not enabling in X server",
                self.config.object_manager_boolean
            );
            return;
        }

        let Some(info) = self.extensions.register(
            SELINUX_EXTENSION_NAME,
            SELINUX_NUMBER_EVENTS,
            SELINUX_NUMBER_ERRORS,
        ) else {
            log::warn!("SELinux: failed to register extension");
            return;
        };
        self.extensions
            .add_alias(SELINUX_EXTENSION_ALIAS, SELINUX_EXTENSION_NAME);

        log::info!(
            "SELinux: enabled in {} mode (major opcode {})",
            self.config.mode,
            info.major_opcode
        );

        self.objects
            .set_permissive(self.config.mode == SelinuxMode::Permissive);
        self.selinux = Some(SelinuxExtension::new(
            info.major_opcode,
            SidTable::new(policy),
        ));
        self.label_server();
    }

    /// Label the server subject from the configured server context
    fn label_server(&mut self) {
        let sid = self.configured_sid(self.config.server_context.clone());
        self.objects.set_server_label(sid);
    }

    fn configured_sid(&mut self, context: Option<String>) -> Option<Sid> {
        let selinux = self.selinux.as_mut()?;
        let context = context?;
        match selinux.sids_mut().context_to_sid(context.as_bytes()) {
            Ok(sid) => Some(sid),
            Err(e) => {
                log::warn!("SELinux: configured context rejected: {}", e);
                None
            }
        }
    }

    pub fn is_selinux_enabled(&self) -> bool {
        self.selinux.is_some()
    }

    pub fn selinux(&self) -> Option<&SelinuxExtension> {
        self.selinux.as_ref()
    }

    pub fn selinux_mut(&mut self) -> Option<&mut SelinuxExtension> {
        self.selinux.as_mut()
    }

    /// Query extension by name
    pub fn query_extension(&self, name: &str) -> Option<ExtensionInfo> {
        self.extensions.query(name)
    }

    /// List all registered extensions
    pub fn list_extensions(&self) -> Vec<String> {
        self.extensions.names()
    }

    pub fn objects(&self) -> &LabelRegistry {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut LabelRegistry {
        &mut self.objects
    }

    /// Register a new client labelled with the configured client context
    pub fn register_client(&mut self, byte_order: ByteOrder) -> ClientState {
        let sid = self.configured_sid(self.config.client_context.clone());
        let id = self.objects.register_client(sid);
        log::debug!("Registered {} ({:?})", id, byte_order);
        ClientState::new(id, byte_order)
    }

    /// Unregister a client, releasing its labels and destroying its windows
    pub fn unregister_client(&mut self, client: &ClientState) -> Vec<Window> {
        self.objects.unregister_client(client.id)
    }

    /// Handle one extension request from a client.
    ///
    /// Requests for unknown major opcodes fail with BadRequest.
    pub fn handle_extension_request(
        &mut self,
        client: &mut ClientState,
        request: &mut [u8],
    ) -> Result<Reply, X11Error> {
        let sequence = client.next_sequence();
        let major_opcode = request.first().copied().unwrap_or(0);
        let minor_opcode = request.get(1).copied().unwrap_or(0);

        match self.selinux.as_mut() {
            Some(selinux) if selinux.major_opcode() == major_opcode => selinux.dispatch(
                &mut self.objects,
                client.id,
                client.byte_order(),
                sequence,
                request,
            ),
            _ => {
                log::debug!("Unknown extension major opcode: {}", major_opcode);
                Err(X11Error::new(
                    ErrorCode::Request,
                    sequence,
                    0,
                    minor_opcode as u16,
                    major_opcode,
                ))
            }
        }
    }

    /// Reset the labeling subsystem at server regeneration.
    ///
    /// Every outstanding SID is invalidated and every label dropped; the
    /// server subject is relabelled from configuration.
    pub fn reset(&mut self) {
        let Some(selinux) = self.selinux.as_mut() else {
            return;
        };

        log::info!("SELinux: resetting labels");
        self.objects.reset_labels();
        selinux.sids_mut().reset();
        self.label_server();
    }
}
