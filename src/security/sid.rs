//! Security identifiers
//!
//! A [`Sid`] is a shared handle to an interned security context. Cloning a
//! handle retains it and dropping it releases it; the context string is freed
//! with the last handle. The [`SidTable`] validates contexts against the
//! policy and interns them so equal contexts share one handle.

use super::policy::PolicyEngine;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Entries kept before dead ones are swept from the table
const MIN_PRUNE_THRESHOLD: usize = 64;

/// Errors translating between contexts and handles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidError {
    #[error("invalid security context {0:?}")]
    InvalidContext(String),

    #[error("security context is not valid UTF-8")]
    NotUtf8,

    #[error("security identifier was issued before the last reset")]
    Stale,

    #[error("object carries no security label")]
    Unlabeled,
}

struct SidEntry {
    context: Box<str>,
    generation: u64,
}

/// Reference-counted handle to an interned security context
#[derive(Clone)]
pub struct Sid(Arc<SidEntry>);

impl Sid {
    /// Number of live handles, this one included
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether both handles name the same interned context
    pub fn same_as(&self, other: &Sid) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Sid {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Sid {}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sid").field(&self.0.context).finish()
    }
}

/// Interning table mapping contexts to handles
pub struct SidTable {
    policy: Box<dyn PolicyEngine>,
    entries: HashMap<Box<str>, Weak<SidEntry>>,
    generation: u64,
    prune_at: usize,
}

impl SidTable {
    pub fn new(policy: Box<dyn PolicyEngine>) -> Self {
        SidTable {
            policy,
            entries: HashMap::new(),
            generation: 0,
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    pub fn policy(&self) -> &dyn PolicyEngine {
        self.policy.as_ref()
    }

    /// Validate a context and return its handle, interning it if needed.
    ///
    /// Raw request bytes are accepted as-is; callers strip the terminator.
    pub fn context_to_sid(&mut self, context: &[u8]) -> Result<Sid, SidError> {
        let context = std::str::from_utf8(context).map_err(|_| SidError::NotUtf8)?;

        if !self.policy.check_context(context) {
            return Err(SidError::InvalidContext(context.to_string()));
        }

        if let Some(entry) = self.entries.get(context).and_then(Weak::upgrade) {
            return Ok(Sid(entry));
        }

        if self.entries.len() >= self.prune_at {
            self.prune();
        }

        let entry = Arc::new(SidEntry {
            context: context.into(),
            generation: self.generation,
        });
        self.entries.insert(context.into(), Arc::downgrade(&entry));
        log::trace!("Interned security context {}", context);

        Ok(Sid(entry))
    }

    /// Copy out the context a handle stands for
    pub fn sid_to_context(&self, sid: &Sid) -> Result<String, SidError> {
        if sid.0.generation != self.generation {
            return Err(SidError::Stale);
        }
        Ok(sid.0.context.to_string())
    }

    /// Number of contexts with at least one live handle
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every interned context. Handles issued earlier stay alive for
    /// their holders but can no longer be translated back.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.generation += 1;
        self.prune_at = MIN_PRUNE_THRESHOLD;
    }

    fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
    }
}
