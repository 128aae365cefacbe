//! The `apiinfo` namespace.

use apigate_core::{CallContext, Params, Service, ServiceError};
use serde_json::Value;

/// Reports the API version.
#[derive(Debug, Clone)]
pub struct ApiInfoService {
    version: String,
}

impl ApiInfoService {
    /// Creates the service reporting `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Service for ApiInfoService {
    fn methods(&self) -> &[&'static str] {
        &["version"]
    }

    fn call(&self, _: &CallContext<'_>, _: &str, _: Params) -> Result<Value, ServiceError> {
        Ok(Value::String(self.version.clone()))
    }
}
