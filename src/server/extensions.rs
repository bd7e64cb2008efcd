//! SELinux extension request handlers
//!
//! This module handles requests for the SELinux extension. Each request is
//! decoded by the protocol parser, resolved against the labeled object
//! registry and answered through the reply encoder. A rejected request never
//! changes state except where noted on the handler.

use crate::protocol::*;
use crate::resources::{Access, LabeledObjects};
use crate::security::*;

/// Outcome of one request: an encoded reply, or none for set requests
pub type Reply = Option<Vec<u8>>;

/// The SELinux extension once it has been registered
pub struct SelinuxExtension {
    major_opcode: u8,
    sids: SidTable,
}

impl SelinuxExtension {
    pub fn new(major_opcode: u8, sids: SidTable) -> Self {
        SelinuxExtension { major_opcode, sids }
    }

    pub fn major_opcode(&self) -> u8 {
        self.major_opcode
    }

    pub fn sids(&self) -> &SidTable {
        &self.sids
    }

    pub fn sids_mut(&mut self) -> &mut SidTable {
        &mut self.sids
    }

    /// Handle one complete request from a client.
    ///
    /// The buffer is byte-swapped in place for clients of the opposite byte
    /// order. Failures come back as the error packet to send.
    pub fn dispatch<O: LabeledObjects>(
        &mut self,
        objects: &mut O,
        client: ClientId,
        byte_order: ByteOrder,
        sequence: u16,
        request: &mut [u8],
    ) -> Result<Reply, X11Error> {
        let minor_opcode = request.get(1).copied().unwrap_or(0);
        let parser = ProtocolParser::new(byte_order);
        let encoder = ProtocolEncoder::new(byte_order);

        let result = match parser.parse_request(request) {
            Ok((_, request)) => self.handle(objects, client, &encoder, sequence, request),
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            log::warn!(
                "SELinux: {} request {} failed: {}",
                client,
                request_name(minor_opcode),
                e
            );
            e.to_x11(sequence, self.major_opcode, minor_opcode)
        })
    }

    fn handle<O: LabeledObjects>(
        &mut self,
        objects: &mut O,
        client: ClientId,
        encoder: &ProtocolEncoder,
        sequence: u16,
        request: SelinuxRequest<'_>,
    ) -> Result<Reply, RequestError> {
        match request {
            SelinuxRequest::QueryVersion { .. } => Ok(Some(encoder.encode_query_version_reply(
                sequence,
                SELINUX_MAJOR_VERSION,
                SELINUX_MINOR_VERSION,
            ))),
            SelinuxRequest::SetCreateContext { field, context } => {
                self.set_create_context(objects, client, field, context)?;
                Ok(None)
            }
            SelinuxRequest::GetCreateContext { field } => {
                let subject = if field == ContextField::DeviceCreate {
                    objects.subject(ClientId::SERVER)
                } else {
                    objects.subject(client)
                };
                let sid = subject.and_then(|subject| subject.context(field));
                self.context_reply(encoder, sequence, sid).map(Some)
            }
            SelinuxRequest::SetDeviceContext { device, context } => {
                self.set_device_context(objects, client, device, context)?;
                Ok(None)
            }
            SelinuxRequest::GetDeviceContext { device } => {
                let labels = objects.lookup_device(client, device, Access::GetAttr)?;
                self.context_reply(encoder, sequence, labels.subject.sid.as_ref())
                    .map(Some)
            }
            SelinuxRequest::GetWindowContext { window } => {
                let labels = objects.lookup_window(client, window, Access::GetAttr)?;
                self.context_reply(encoder, sequence, labels.sid.as_ref())
                    .map(Some)
            }
            SelinuxRequest::GetPropertyContext {
                window,
                property,
                kind,
            } => {
                objects.lookup_window(client, window, Access::GetProperty)?;
                let labels = objects.lookup_property(client, window, property, Access::GetAttr)?;
                self.context_reply(encoder, sequence, labels.label(kind))
                    .map(Some)
            }
            SelinuxRequest::ListProperties { window } => {
                objects.lookup_window(client, window, Access::ListProperty)?;
                let (items, size) = self.list_items(objects.window_properties(window))?;
                Ok(Some(encoder.encode_list_items_reply(sequence, &items, size)?))
            }
            SelinuxRequest::GetSelectionContext { selection, kind } => {
                let labels = objects.lookup_selection(client, selection, Access::GetAttr)?;
                self.context_reply(encoder, sequence, labels.label(kind))
                    .map(Some)
            }
            SelinuxRequest::ListSelections => {
                let (items, size) = self.list_items(objects.selections())?;
                Ok(Some(encoder.encode_list_items_reply(sequence, &items, size)?))
            }
            SelinuxRequest::GetClientContext { resource } => {
                let subject = objects.lookup_client(client, resource, Access::GetAttr)?;
                self.context_reply(encoder, sequence, subject.sid.as_ref())
                    .map(Some)
            }
        }
    }

    /// Install a default create or use context.
    ///
    /// The old value is released once the new one has been attempted, so an
    /// invalid label leaves the field empty. The device create context lives
    /// on the server and needs manage access to it.
    fn set_create_context<O: LabeledObjects>(
        &mut self,
        objects: &mut O,
        client: ClientId,
        field: ContextField,
        context: &[u8],
    ) -> Result<(), RequestError> {
        let copied = copy_context(context)?;

        let owner = if field == ContextField::DeviceCreate {
            objects.check_server_access(client, Access::Manage)?;
            ClientId::SERVER
        } else {
            client
        };

        let sid = if context.is_empty() {
            None
        } else {
            Some(self.sids.context_to_sid(&copied))
        };

        let subject = objects.subject_mut(owner);
        match sid {
            None => {
                subject.replace_context(field, None);
                log::debug!("SELinux: {} cleared {} context", owner, field.name());
                Ok(())
            }
            Some(Ok(sid)) => {
                subject.replace_context(field, Some(sid));
                Ok(())
            }
            Some(Err(e)) => {
                subject.replace_context(field, None);
                Err(e.into())
            }
        }
    }

    /// Relabel a device. The subject and object labels end up sharing the
    /// new handle.
    fn set_device_context<O: LabeledObjects>(
        &mut self,
        objects: &mut O,
        client: ClientId,
        device: u32,
        context: &[u8],
    ) -> Result<(), RequestError> {
        if context.is_empty() {
            return Err(RequestError::BadLength);
        }

        let copied = copy_context(context)?;
        let labels = objects.lookup_device(client, device, Access::Manage)?;
        let sid = self.sids.context_to_sid(&copied)?;
        labels.relabel(sid);
        Ok(())
    }

    fn context_reply(
        &self,
        encoder: &ProtocolEncoder,
        sequence: u16,
        sid: Option<&Sid>,
    ) -> Result<Vec<u8>, RequestError> {
        let context = sid.map(|sid| self.sids.sid_to_context(sid)).transpose()?;
        Ok(encoder.encode_context_reply(sequence, context.as_deref()))
    }

    /// Copy out the labels of every listed object. Any object whose labels
    /// cannot be translated fails the whole list.
    fn list_items(
        &self,
        entries: Vec<(Atom, &ObjectLabels)>,
    ) -> Result<(Vec<ListItem>, usize), RequestError> {
        let mut items = Vec::new();
        items.try_reserve_exact(entries.len())?;

        let mut size = 0;
        for (atom, labels) in entries {
            let item = ListItem {
                id: atom.get(),
                object_context: self.required_context(labels.label(LabelKind::Object))?,
                data_context: self.required_context(labels.label(LabelKind::Data))?,
            };
            size += item.words();
            items.push(item);
        }

        Ok((items, size))
    }

    fn required_context(&self, sid: Option<&Sid>) -> Result<String, SidError> {
        let sid = sid.ok_or(SidError::Unlabeled)?;
        self.sids.sid_to_context(sid)
    }
}

/// Copy a request label up to its length or its first NUL
fn copy_context(bytes: &[u8]) -> Result<Vec<u8>, RequestError> {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let mut context = Vec::new();
    context.try_reserve_exact(len)?;
    context.extend_from_slice(&bytes[..len]);
    Ok(context)
}

fn request_name(minor_opcode: u8) -> &'static str {
    request_spec(minor_opcode)
        .map(|spec| spec.name)
        .unwrap_or("<unknown>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{LabelRegistry, Target};
    use rstest::rstest;

    const MAJOR: u8 = 128;

    fn extension() -> SelinuxExtension {
        let sids = SidTable::new(Box::new(StaticPolicy::new()));
        SelinuxExtension::new(MAJOR, sids)
    }

    fn request(minor: u8, fields: &[u32], tail: &[u8]) -> Vec<u8> {
        let order = ByteOrder::native();
        let len = padded_len(4 + fields.len() * 4 + tail.len());
        let mut buf = vec![0u8; len];
        buf[0] = MAJOR;
        buf[1] = minor;
        order.write_u16(&mut buf[2..4], (len / 4) as u16);
        for (i, value) in fields.iter().enumerate() {
            order.write_u32(&mut buf[4 + i * 4..8 + i * 4], *value);
        }
        let start = 4 + fields.len() * 4;
        buf[start..start + tail.len()].copy_from_slice(tail);
        buf
    }

    fn run(
        ext: &mut SelinuxExtension,
        objects: &mut LabelRegistry,
        client: ClientId,
        mut buf: Vec<u8>,
    ) -> Result<Reply, X11Error> {
        ext.dispatch(objects, client, ByteOrder::native(), 1, &mut buf)
    }

    #[test]
    fn test_copy_context_stops_at_nul() {
        assert_eq!(copy_context(b"u:r:t\0junk").unwrap(), b"u:r:t");
        assert_eq!(copy_context(b"u:r:t").unwrap(), b"u:r:t");
        assert!(copy_context(b"").unwrap().is_empty());
    }

    #[rstest]
    #[case(1, 2, ContextField::DeviceCreate)]
    #[case(5, 6, ContextField::WindowCreate)]
    #[case(8, 9, ContextField::PropertyCreate)]
    #[case(10, 11, ContextField::PropertyUse)]
    #[case(15, 16, ContextField::SelectionCreate)]
    #[case(17, 18, ContextField::SelectionUse)]
    fn test_set_then_get_create_context(
        #[case] set: u8,
        #[case] get: u8,
        #[case] field: ContextField,
    ) {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let client = objects.register_client(None);
        let label = b"u:object_r:thing_t";

        let reply = run(&mut ext, &mut objects, client, request(set, &[label.len() as u32], label));
        assert_eq!(reply, Ok(None));

        let owner = if field == ContextField::DeviceCreate {
            ClientId::SERVER
        } else {
            client
        };
        let sid = objects.subject(owner).and_then(|s| s.context(field)).cloned();
        assert_eq!(
            sid.map(|sid| ext.sids().sid_to_context(&sid).unwrap()).as_deref(),
            Some("u:object_r:thing_t")
        );

        let reply = run(&mut ext, &mut objects, client, request(get, &[], &[]))
            .unwrap()
            .unwrap();
        let order = ByteOrder::native();
        assert_eq!(order.read_u32(&reply[8..12]) as usize, label.len() + 1);
        assert_eq!(&reply[32..32 + label.len()], label);
    }

    #[test]
    fn test_invalid_create_context_clears_field() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let client = objects.register_client(None);
        let old = ext.sids_mut().context_to_sid(b"u:object_r:old_t").unwrap();
        objects
            .subject_mut(client)
            .replace_context(ContextField::WindowCreate, Some(old.clone()));
        assert_eq!(old.ref_count(), 2);

        let label = b"garbage";
        let err = run(&mut ext, &mut objects, client, request(5, &[label.len() as u32], label))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        assert_eq!(err.major_opcode, MAJOR);
        assert_eq!(err.minor_opcode, 5);
        assert_eq!(old.ref_count(), 1);
        assert!(objects
            .subject(client)
            .unwrap()
            .context(ContextField::WindowCreate)
            .is_none());
    }

    #[test]
    fn test_device_create_context_needs_manage_on_server() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let client = objects.register_client(None);
        objects.set_access_policy(Box::new(|_: ClientId, target: Target, _: Access| {
            target != Target::Server
        }));

        let label = b"u:object_r:dev_t";
        let err = run(&mut ext, &mut objects, client, request(1, &[label.len() as u32], label))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Access);
        assert!(objects
            .subject(ClientId::SERVER)
            .unwrap()
            .context(ContextField::DeviceCreate)
            .is_none());
    }

    #[test]
    fn test_set_device_context_on_missing_device() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let client = objects.register_client(None);

        let label = b"u:object_r:dev_t";
        let err = run(&mut ext, &mut objects, client, request(3, &[9, label.len() as u32], label))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        assert_eq!(err.bad_value, 9);
    }

    #[test]
    fn test_property_context_variants() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let own = ext.sids_mut().context_to_sid(b"u:r:client_t").unwrap();
        let data = ext.sids_mut().context_to_sid(b"u:object_r:data_t").unwrap();
        let client = objects.register_client(Some(own));
        objects
            .subject_mut(client)
            .replace_context(ContextField::PropertyUse, Some(data));

        let window = Window::new(client.resource_base() | 1);
        objects.create_window(client, window).unwrap();
        objects.change_property(client, window, Atom::WM_NAME).unwrap();

        let ids = [window.id().get(), Atom::WM_NAME.get()];
        let object = run(&mut ext, &mut objects, client, request(12, &ids, &[]))
            .unwrap()
            .unwrap();
        let data = run(&mut ext, &mut objects, client, request(13, &ids, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(&object[32..44], b"u:r:client_t");
        assert_eq!(&data[32..49], b"u:object_r:data_t");

        let missing = [window.id().get(), Atom::PRIMARY.get()];
        let err = run(&mut ext, &mut objects, client, request(12, &missing, &[])).unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_list_fails_on_unlabeled_item() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let own = ext.sids_mut().context_to_sid(b"u:r:client_t").unwrap();
        let labeled = objects.register_client(Some(own.clone()));
        let unlabeled = objects.register_client(None);

        let w1 = Window::new(labeled.resource_base() | 1);
        let w2 = Window::new(unlabeled.resource_base() | 1);
        objects.create_window(labeled, w1).unwrap();
        objects.create_window(unlabeled, w2).unwrap();
        objects.set_selection_owner(labeled, Atom::PRIMARY, w1);
        objects.set_selection_owner(unlabeled, Atom::SECONDARY, w2);

        // subject, window, selection object and data labels
        assert_eq!(own.ref_count(), 5);

        let err = run(&mut ext, &mut objects, labeled, request(21, &[], &[])).unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        assert_eq!(own.ref_count(), 5);

        objects.unregister_client(unlabeled);
        let reply = run(&mut ext, &mut objects, labeled, request(21, &[], &[]))
            .unwrap()
            .unwrap();
        assert_eq!(ByteOrder::native().read_u32(&reply[8..12]), 1);
        assert_eq!(own.ref_count(), 5);
    }

    #[test]
    fn test_stale_label_rejected_after_reset() {
        let mut ext = extension();
        let mut objects = LabelRegistry::new();
        let own = ext.sids_mut().context_to_sid(b"u:r:client_t").unwrap();
        let client = objects.register_client(Some(own));
        ext.sids_mut().reset();

        let err = run(&mut ext, &mut objects, client, request(22, &[client.resource_base()], &[]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
    }
}
