//! Method existence checks.

use crate::registry::ServiceRegistry;

/// Decides whether a method is part of a service's callable surface.
///
/// Only the names a service advertises through
/// [`Service::methods`](crate::service::Service::methods) are callable;
/// anything else a service happens to implement internally is not.
#[derive(Debug, Clone, Copy)]
pub struct MethodValidator<'a> {
    registry: &'a ServiceRegistry,
}

impl<'a> MethodValidator<'a> {
    /// Creates a validator over `registry`.
    #[must_use]
    pub const fn new(registry: &'a ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Returns `true` when `namespace` exposes `method`, ignoring case.
    ///
    /// Unknown namespaces expose nothing.
    #[must_use]
    pub fn is_valid_method(&self, namespace: &str, method: &str) -> bool {
        self.registry
            .method_names(namespace)
            .is_some_and(|methods| methods.contains(&method.to_ascii_lowercase()))
    }
}
