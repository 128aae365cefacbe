//! Namespace to service lookup.
//!
//! Namespaces are matched case-insensitively. The registry is built once at
//! start-up and is read-only afterwards, so it can be shared freely between
//! connections.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::ServiceError;
use crate::service::Service;

/// Errors raised by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No service is registered under the namespace.
    #[error("no service registered under \"{namespace}\"")]
    NotFound {
        /// Namespace that was looked up.
        namespace: String,
    },
}

impl From<RegistryError> for ServiceError {
    fn from(error: RegistryError) -> Self {
        Self::from_error(error)
    }
}

struct Entry {
    service: Arc<dyn Service>,
    methods: HashSet<String>,
}

/// Read-only mapping from API namespace to [`Service`].
#[derive(Default)]
pub struct ServiceRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ServiceRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Returns `true` when a service is registered under `namespace`.
    #[must_use]
    pub fn has_service(&self, namespace: &str) -> bool {
        self.entries.contains_key(&namespace.to_ascii_lowercase())
    }

    /// Returns the service registered under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown namespaces.
    pub fn get_service(&self, namespace: &str) -> Result<Arc<dyn Service>, RegistryError> {
        self.entries
            .get(&namespace.to_ascii_lowercase())
            .map(|entry| Arc::clone(&entry.service))
            .ok_or_else(|| RegistryError::NotFound {
                namespace: namespace.to_owned(),
            })
    }

    /// Lower-cased method names exposed under `namespace`.
    #[must_use]
    pub fn method_names(&self, namespace: &str) -> Option<&HashSet<String>> {
        self.entries
            .get(&namespace.to_ascii_lowercase())
            .map(|entry| &entry.methods)
    }

    /// Registered namespaces in sorted order.
    #[must_use]
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceRegistry")
            .field("namespaces", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects services before freezing them into a [`ServiceRegistry`].
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    entries: BTreeMap<String, Entry>,
}

impl ServiceRegistryBuilder {
    /// Registers `service` under `namespace`, replacing any earlier entry.
    #[must_use]
    pub fn register(self, namespace: &str, service: impl Service + 'static) -> Self {
        self.register_shared(namespace, Arc::new(service))
    }

    /// Registers an already shared service.
    #[must_use]
    pub fn register_shared(mut self, namespace: &str, service: Arc<dyn Service>) -> Self {
        let methods = service
            .methods()
            .iter()
            .map(|method| method.to_ascii_lowercase())
            .collect();
        self.entries
            .insert(namespace.to_ascii_lowercase(), Entry { service, methods });
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::service::{CallContext, Params};

    struct Fixed(&'static [&'static str]);

    impl Service for Fixed {
        fn methods(&self) -> &[&'static str] {
            self.0
        }

        fn call(&self, _: &CallContext<'_>, _: &str, _: Params) -> Result<Value, ServiceError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::builder()
            .register("Host", Fixed(&["get", "Create"]))
            .register("user", Fixed(&["login"]))
            .build()
    }

    #[test]
    fn lookups_ignore_case() {
        let registry = registry();
        assert!(registry.has_service("HOST"));
        assert!(registry.has_service("host"));
        assert!(registry.get_service("User").is_ok());
    }

    #[test]
    fn method_names_are_lower_cased() {
        let registry = registry();
        let methods = registry.method_names("host").expect("registered");
        assert!(methods.contains("create"));
        assert!(!methods.contains("Create"));
    }

    #[test]
    fn unknown_namespaces_are_reported() {
        let registry = registry();
        assert!(!registry.has_service("template"));
        let error = registry.get_service("template").err().expect("missing");
        assert_eq!(
            error,
            RegistryError::NotFound {
                namespace: "template".to_owned()
            }
        );
    }

    #[test]
    fn namespaces_are_sorted() {
        let registry = registry();
        assert_eq!(registry.namespaces().collect::<Vec<_>>(), ["host", "user"]);
    }
}
