//! Label records attached to subjects and objects
//!
//! Every slot holds an optional [`Sid`]. Overwriting a slot drops the handle
//! it held, so each record releases exactly what it retained.

use super::sid::Sid;
use std::mem;

/// Selects one of the six per-subject default contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    /// Label given to new input devices
    DeviceCreate,
    /// Label given to new windows
    WindowCreate,
    /// Label given to new properties
    PropertyCreate,
    /// Data label given to new properties
    PropertyUse,
    /// Label given to new selections
    SelectionCreate,
    /// Data label given to new selections
    SelectionUse,
}

impl ContextField {
    pub const ALL: [ContextField; 6] = [
        ContextField::DeviceCreate,
        ContextField::WindowCreate,
        ContextField::PropertyCreate,
        ContextField::PropertyUse,
        ContextField::SelectionCreate,
        ContextField::SelectionUse,
    ];

    fn index(self) -> usize {
        match self {
            ContextField::DeviceCreate => 0,
            ContextField::WindowCreate => 1,
            ContextField::PropertyCreate => 2,
            ContextField::PropertyUse => 3,
            ContextField::SelectionCreate => 4,
            ContextField::SelectionUse => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContextField::DeviceCreate => "device create",
            ContextField::WindowCreate => "window create",
            ContextField::PropertyCreate => "property create",
            ContextField::PropertyUse => "property use",
            ContextField::SelectionCreate => "selection create",
            ContextField::SelectionUse => "selection use",
        }
    }
}

/// Which label of a property or selection to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Label of the item itself
    Object,
    /// Label of the item's contents
    Data,
}

/// Labels of an active principal: a client or an input device
#[derive(Debug, Clone, Default)]
pub struct SubjectLabels {
    /// Label enforced for this subject's actions
    pub sid: Option<Sid>,
    defaults: [Option<Sid>; 6],
}

impl SubjectLabels {
    pub fn new(sid: Option<Sid>) -> Self {
        SubjectLabels {
            sid,
            defaults: Default::default(),
        }
    }

    /// Current value of a default context
    pub fn context(&self, field: ContextField) -> Option<&Sid> {
        self.defaults[field.index()].as_ref()
    }

    /// Install a default context and hand back the previous one
    pub fn replace_context(&mut self, field: ContextField, sid: Option<Sid>) -> Option<Sid> {
        mem::replace(&mut self.defaults[field.index()], sid)
    }

    /// Label for an object this subject creates: the default context if set,
    /// the subject's own label otherwise
    pub fn create_sid(&self, field: ContextField) -> Option<Sid> {
        self.context(field).or(self.sid.as_ref()).cloned()
    }

    /// Drop every held handle
    pub fn clear(&mut self) {
        self.sid = None;
        self.defaults = Default::default();
    }
}

/// Labels of a passive resource
#[derive(Debug, Clone, Default)]
pub struct ObjectLabels {
    /// Label of the object
    pub sid: Option<Sid>,
    /// Label of the object's contents
    pub data_sid: Option<Sid>,
}

impl ObjectLabels {
    pub fn new(sid: Option<Sid>, data_sid: Option<Sid>) -> Self {
        ObjectLabels { sid, data_sid }
    }

    pub fn label(&self, kind: LabelKind) -> Option<&Sid> {
        match kind {
            LabelKind::Object => self.sid.as_ref(),
            LabelKind::Data => self.data_sid.as_ref(),
        }
    }

    pub fn clear(&mut self) {
        self.sid = None;
        self.data_sid = None;
    }
}

/// An input device is both a subject and an object
#[derive(Debug, Clone, Default)]
pub struct DeviceLabels {
    pub subject: SubjectLabels,
    pub object: ObjectLabels,
}

impl DeviceLabels {
    /// Labels for a new device; the object side retains the same handle
    pub fn new(sid: Option<Sid>) -> Self {
        DeviceLabels {
            subject: SubjectLabels::new(sid.clone()),
            object: ObjectLabels::new(sid.clone(), sid),
        }
    }

    /// Point both the subject and the object label at one handle.
    ///
    /// Both fields are written together; the handles they held before are
    /// released afterwards.
    pub fn relabel(&mut self, sid: Sid) {
        let old_subject = self.subject.sid.replace(sid.clone());
        let old_object = self.object.sid.replace(sid);
        drop(old_subject);
        drop(old_object);
    }

    pub fn clear(&mut self) {
        self.subject.clear();
        self.object.clear();
    }
}
