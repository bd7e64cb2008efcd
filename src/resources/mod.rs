//! Labeled object registry
//!
//! The request handlers reach labels only through the [`LabeledObjects`]
//! trait: resolve an id with an access mode, get back the record or the
//! error to send. [`LabelRegistry`] is the in-memory implementation used by
//! the server. It tracks the label records of clients, input devices,
//! windows, properties and selections, seeds new records from their
//! creator's default contexts, and drops them with their owner.

use crate::protocol::*;
use crate::security::*;
use std::collections::{BTreeMap, HashMap};

/// Access mode requested when resolving an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Change the object's security attributes
    Manage,
    /// Read the object's attributes
    GetAttr,
    /// Read properties of a window
    GetProperty,
    /// Enumerate properties of a window
    ListProperty,
}

/// Object an access check is made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Server,
    Device(u32),
    Window(Window),
    Property(Window, Atom),
    Selection(Atom),
    Client(ClientId),
}

/// Decides whether a client may access an object
pub trait AccessPolicy: Send {
    fn allows(&self, client: ClientId, target: Target, access: Access) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(ClientId, Target, Access) -> bool + Send,
{
    fn allows(&self, client: ClientId, target: Target, access: Access) -> bool {
        self(client, target, access)
    }
}

/// Access policy that permits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _client: ClientId, _target: Target, _access: Access) -> bool {
        true
    }
}

/// Object lookups consumed by the request handlers
pub trait LabeledObjects {
    /// Subject record of a client, created on first use
    fn subject_mut(&mut self, client: ClientId) -> &mut SubjectLabels;

    /// Subject record of a client if it has one
    fn subject(&self, client: ClientId) -> Option<&SubjectLabels>;

    /// Check an access mode against the server itself
    fn check_server_access(&self, client: ClientId, access: Access) -> Result<(), LookupError>;

    fn lookup_device(
        &mut self,
        client: ClientId,
        device: u32,
        access: Access,
    ) -> Result<&mut DeviceLabels, LookupError>;

    fn lookup_window(
        &self,
        client: ClientId,
        window: Window,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError>;

    /// Resolve a property of a window the caller has already resolved
    fn lookup_property(
        &self,
        client: ClientId,
        window: Window,
        property: Atom,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError>;

    fn lookup_selection(
        &self,
        client: ClientId,
        selection: Atom,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError>;

    /// Resolve the client owning a resource id
    fn lookup_client(
        &self,
        client: ClientId,
        resource: u32,
        access: Access,
    ) -> Result<&SubjectLabels, LookupError>;

    /// Properties of a window in enumeration order
    fn window_properties(&self, window: Window) -> Vec<(Atom, &ObjectLabels)>;

    /// All selections in enumeration order
    fn selections(&self) -> Vec<(Atom, &ObjectLabels)>;
}

/// Input device record
#[derive(Debug, Clone)]
struct DeviceRecord {
    name: String,
    labels: DeviceLabels,
}

/// Window record with its properties
#[derive(Debug, Clone)]
struct WindowRecord {
    owner: ClientId,
    labels: ObjectLabels,
    properties: Vec<(Atom, ObjectLabels)>,
}

/// Selection record
#[derive(Debug, Clone)]
struct SelectionRecord {
    owner: ClientId,
    window: Window,
    labels: ObjectLabels,
}

/// In-memory labeled object registry
pub struct LabelRegistry {
    access: Box<dyn AccessPolicy>,

    /// Log denials instead of enforcing them
    permissive: bool,

    /// Subject records by client, the server included
    clients: HashMap<ClientId, SubjectLabels>,

    /// Input devices by device id
    devices: BTreeMap<u32, DeviceRecord>,

    windows: HashMap<Window, WindowRecord>,

    /// Selections in creation order
    selections: Vec<(Atom, SelectionRecord)>,

    /// Next client ID to assign
    next_client_id: u32,
}

impl Default for LabelRegistry {
    fn default() -> Self {
        LabelRegistry::new()
    }
}

impl LabelRegistry {
    /// Create a registry holding only the server's subject record
    pub fn new() -> Self {
        let mut clients = HashMap::new();
        clients.insert(ClientId::SERVER, SubjectLabels::default());

        LabelRegistry {
            access: Box::new(AllowAll),
            permissive: false,
            clients,
            devices: BTreeMap::new(),
            windows: HashMap::new(),
            selections: Vec::new(),
            next_client_id: 1,
        }
    }

    pub fn set_access_policy(&mut self, access: Box<dyn AccessPolicy>) {
        self.access = access;
    }

    fn check(&self, client: ClientId, target: Target, access: Access, id: u32) -> Result<(), LookupError> {
        if self.access.allows(client, target, access) {
            return Ok(());
        }

        if self.permissive {
            log::warn!("{} denied {:?} access to {:?} (permissive)", client, access, target);
            Ok(())
        } else {
            log::warn!("{} denied {:?} access to {:?}", client, access, target);
            Err(LookupError::access(id))
        }
    }

    pub fn set_permissive(&mut self, permissive: bool) {
        self.permissive = permissive;
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    /// Label the server's own subject record
    pub fn set_server_label(&mut self, sid: Option<Sid>) {
        self.subject_mut(ClientId::SERVER).sid = sid;
    }

    /// Register a new client and return its ID
    pub fn register_client(&mut self, sid: Option<Sid>) -> ClientId {
        let client = ClientId(self.next_client_id);
        self.next_client_id += 1;
        self.clients.insert(client, SubjectLabels::new(sid));
        client
    }

    /// Unregister a client, dropping its subject record and everything it
    /// owns. Returns the windows that were destroyed.
    pub fn unregister_client(&mut self, client: ClientId) -> Vec<Window> {
        self.clients.remove(&client);

        let owned: Vec<Window> = self
            .windows
            .iter()
            .filter(|(_, record)| record.owner == client)
            .map(|(window, _)| *window)
            .collect();
        for window in &owned {
            self.destroy_window(*window);
        }

        self.selections.retain(|(_, record)| record.owner != client);
        owned
    }

    /// Whether a client is registered
    pub fn has_client(&self, client: ClientId) -> bool {
        !client.is_server() && self.clients.contains_key(&client)
    }

    /// Add an input device labelled from the server's device create context
    pub fn add_device(&mut self, device: u32, name: &str) {
        let sid = self
            .subject(ClientId::SERVER)
            .and_then(|server| server.create_sid(ContextField::DeviceCreate));
        self.devices.insert(
            device,
            DeviceRecord {
                name: name.to_string(),
                labels: DeviceLabels::new(sid),
            },
        );
    }

    pub fn remove_device(&mut self, device: u32) -> bool {
        self.devices.remove(&device).is_some()
    }

    pub fn device_name(&self, device: u32) -> Option<&str> {
        self.devices.get(&device).map(|record| record.name.as_str())
    }

    /// Create a window labelled from its creator's window create context
    pub fn create_window(&mut self, client: ClientId, window: Window) -> Result<(), LookupError> {
        if self.windows.contains_key(&window) {
            return Err(LookupError::new(ErrorCode::IDChoice, window.id().get()));
        }

        let sid = self.subject_mut(client).create_sid(ContextField::WindowCreate);
        self.windows.insert(
            window,
            WindowRecord {
                owner: client,
                labels: ObjectLabels::new(sid, None),
                properties: Vec::new(),
            },
        );
        Ok(())
    }

    /// Destroy a window and its properties
    pub fn destroy_window(&mut self, window: Window) -> bool {
        self.windows.remove(&window).is_some()
    }

    /// Create a property if the window does not have it yet. Existing
    /// properties keep their labels.
    pub fn change_property(
        &mut self,
        client: ClientId,
        window: Window,
        property: Atom,
    ) -> Result<(), LookupError> {
        if !self.windows.contains_key(&window) {
            return Err(LookupError::new(ErrorCode::Window, window.id().get()));
        }

        let subject = self.subject_mut(client);
        let labels = ObjectLabels::new(
            subject.create_sid(ContextField::PropertyCreate),
            subject.create_sid(ContextField::PropertyUse),
        );

        let Some(record) = self.windows.get_mut(&window) else {
            return Err(LookupError::new(ErrorCode::Window, window.id().get()));
        };
        if !record.properties.iter().any(|(atom, _)| *atom == property) {
            record.properties.push((property, labels));
        }
        Ok(())
    }

    pub fn delete_property(&mut self, window: Window, property: Atom) -> bool {
        match self.windows.get_mut(&window) {
            Some(record) => {
                let before = record.properties.len();
                record.properties.retain(|(atom, _)| *atom != property);
                record.properties.len() != before
            }
            None => false,
        }
    }

    /// Take ownership of a selection. The selection is relabelled from the
    /// new owner's selection create and use contexts.
    pub fn set_selection_owner(&mut self, client: ClientId, selection: Atom, window: Window) {
        let subject = self.subject_mut(client);
        let labels = ObjectLabels::new(
            subject.create_sid(ContextField::SelectionCreate),
            subject.create_sid(ContextField::SelectionUse),
        );
        let record = SelectionRecord {
            owner: client,
            window,
            labels,
        };

        match self.selections.iter_mut().find(|(atom, _)| *atom == selection) {
            Some((_, existing)) => *existing = record,
            None => self.selections.push((selection, record)),
        }
    }

    /// Owner window of a selection
    pub fn selection_window(&self, selection: Atom) -> Option<Window> {
        self.selections
            .iter()
            .find(|(atom, _)| *atom == selection)
            .map(|(_, record)| record.window)
    }

    /// Drop every label held by every record. Records themselves survive.
    pub fn reset_labels(&mut self) {
        for subject in self.clients.values_mut() {
            subject.clear();
        }
        for device in self.devices.values_mut() {
            device.labels.clear();
        }
        for window in self.windows.values_mut() {
            window.labels.clear();
            for (_, labels) in window.properties.iter_mut() {
                labels.clear();
            }
        }
        for (_, selection) in self.selections.iter_mut() {
            selection.labels.clear();
        }
    }
}

impl LabeledObjects for LabelRegistry {
    fn subject_mut(&mut self, client: ClientId) -> &mut SubjectLabels {
        self.clients.entry(client).or_default()
    }

    fn subject(&self, client: ClientId) -> Option<&SubjectLabels> {
        self.clients.get(&client)
    }

    fn check_server_access(&self, client: ClientId, access: Access) -> Result<(), LookupError> {
        self.check(client, Target::Server, access, 0)
    }

    fn lookup_device(
        &mut self,
        client: ClientId,
        device: u32,
        access: Access,
    ) -> Result<&mut DeviceLabels, LookupError> {
        if !self.devices.contains_key(&device) {
            return Err(LookupError::new(ErrorCode::Value, device));
        }
        self.check(client, Target::Device(device), access, device)?;
        self.devices
            .get_mut(&device)
            .map(|record| &mut record.labels)
            .ok_or(LookupError::new(ErrorCode::Value, device))
    }

    fn lookup_window(
        &self,
        client: ClientId,
        window: Window,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError> {
        let id = window.id().get();
        let record = self
            .windows
            .get(&window)
            .ok_or(LookupError::new(ErrorCode::Window, id))?;
        self.check(client, Target::Window(window), access, id)?;
        Ok(&record.labels)
    }

    fn lookup_property(
        &self,
        client: ClientId,
        window: Window,
        property: Atom,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError> {
        let record = self
            .windows
            .get(&window)
            .ok_or(LookupError::new(ErrorCode::Window, window.id().get()))?;
        let (_, labels) = record
            .properties
            .iter()
            .find(|(atom, _)| *atom == property)
            .ok_or(LookupError::new(ErrorCode::Match, property.get()))?;
        self.check(client, Target::Property(window, property), access, property.get())?;
        Ok(labels)
    }

    fn lookup_selection(
        &self,
        client: ClientId,
        selection: Atom,
        access: Access,
    ) -> Result<&ObjectLabels, LookupError> {
        let (_, record) = self
            .selections
            .iter()
            .find(|(atom, _)| *atom == selection)
            .ok_or(LookupError::new(ErrorCode::Match, selection.get()))?;
        self.check(client, Target::Selection(selection), access, selection.get())?;
        Ok(&record.labels)
    }

    fn lookup_client(
        &self,
        client: ClientId,
        resource: u32,
        access: Access,
    ) -> Result<&SubjectLabels, LookupError> {
        let target = ClientId::from_resource(resource);
        if !self.has_client(target) {
            return Err(LookupError::new(ErrorCode::Value, resource));
        }
        self.check(client, Target::Client(target), access, resource)?;
        self.clients
            .get(&target)
            .ok_or(LookupError::new(ErrorCode::Value, resource))
    }

    fn window_properties(&self, window: Window) -> Vec<(Atom, &ObjectLabels)> {
        self.windows
            .get(&window)
            .map(|record| {
                record
                    .properties
                    .iter()
                    .map(|(atom, labels)| (*atom, labels))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn selections(&self) -> Vec<(Atom, &ObjectLabels)> {
        self.selections
            .iter()
            .map(|(atom, record)| (*atom, &record.labels))
            .collect()
    }
}
