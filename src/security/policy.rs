//! Policy decision engine interface
//!
//! The extension never decides what a label means. It only asks the policy
//! whether SELinux is active, whether a policy boolean is set, and whether a
//! string is a valid context.

use std::collections::{HashMap, HashSet};

/// Boolean that must be active for the X object manager to run
pub const OBJECT_MANAGER_BOOLEAN: &str = "xserver_object_manager";

/// Queries answered by the security server
pub trait PolicyEngine: Send {
    /// SELinux is enabled on the host system
    fn is_enabled(&self) -> bool;

    /// Current value of a policy boolean; unknown booleans are inactive
    fn boolean_active(&self, name: &str) -> bool;

    /// Whether the string denotes a context the policy accepts
    fn check_context(&self, context: &str) -> bool;
}

/// Whether a string has the `user:role:type[:range]` shape of a context
pub fn is_well_formed_context(context: &str) -> bool {
    if context.is_empty() || context.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }

    let mut parts = context.splitn(4, ':');
    let identity = [parts.next(), parts.next(), parts.next()];
    if identity.iter().any(|part| part.is_none_or(str::is_empty)) {
        return false;
    }

    match parts.next() {
        Some(range) => !range.is_empty(),
        None => true,
    }
}

/// Policy held entirely in memory.
///
/// Accepts any well-formed context unless restricted to a known set.
#[derive(Debug, Clone)]
pub struct StaticPolicy {
    enabled: bool,
    booleans: HashMap<String, bool>,
    contexts: Option<HashSet<String>>,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        StaticPolicy::new()
    }
}

impl StaticPolicy {
    /// Enabled policy with the object manager boolean set
    pub fn new() -> Self {
        let mut booleans = HashMap::new();
        booleans.insert(OBJECT_MANAGER_BOOLEAN.to_string(), true);
        StaticPolicy {
            enabled: true,
            booleans,
            contexts: None,
        }
    }

    /// Policy for a host without SELinux
    pub fn disabled() -> Self {
        StaticPolicy {
            enabled: false,
            booleans: HashMap::new(),
            contexts: None,
        }
    }

    pub fn with_boolean(mut self, name: &str, value: bool) -> Self {
        self.booleans.insert(name.to_string(), value);
        self
    }

    /// Only accept the listed contexts
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = Some(contexts.into_iter().map(Into::into).collect());
        self
    }
}

impl PolicyEngine for StaticPolicy {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn boolean_active(&self, name: &str) -> bool {
        self.booleans.get(name).copied().unwrap_or(false)
    }

    fn check_context(&self, context: &str) -> bool {
        if !is_well_formed_context(context) {
            return false;
        }
        match &self.contexts {
            Some(known) => known.contains(context),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_shape() {
        assert!(is_well_formed_context("system_u:object_r:xserver_t"));
        assert!(is_well_formed_context("system_u:object_r:xserver_t:s0:c1,c2"));
        assert!(!is_well_formed_context("system_u:object_r"));
        assert!(!is_well_formed_context("system_u::xserver_t"));
        assert!(!is_well_formed_context("u:r:t:"));
        assert!(!is_well_formed_context("u:r:t with space"));
        assert!(!is_well_formed_context(""));
    }

    #[test]
    fn test_restricted_contexts() {
        let policy = StaticPolicy::new().with_contexts(["u:r:a_t", "u:r:b_t"]);
        assert!(policy.check_context("u:r:a_t"));
        assert!(!policy.check_context("u:r:c_t"));
    }

    #[test]
    fn test_booleans() {
        let policy = StaticPolicy::new().with_boolean(OBJECT_MANAGER_BOOLEAN, false);
        assert!(!policy.boolean_active(OBJECT_MANAGER_BOOLEAN));
        assert!(!policy.boolean_active("unknown_boolean"));
        assert!(!StaticPolicy::disabled().is_enabled());
    }
}
