//! Service namespaces served by the apigate gateway.
//!
//! Every service keeps its data in a shared [`MemoryStore`]. Calls reach the
//! store through the request's [`StoreSession`], so the dispatcher's
//! transaction covers every write a call makes, nested calls included.

pub mod apiinfo;
pub mod clock;
pub mod host;
pub mod seed;
pub mod store;
pub mod user;

use std::sync::Arc;

use apigate_core::{ApiError, ServiceError, ServiceRegistry};

pub use apiinfo::ApiInfoService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use host::HostService;
pub use seed::{SeedError, UserSeed, load_users};
pub use store::{MemoryStore, StoreSession, StoreState};
pub use user::{LoginPolicy, UserService};

/// Message for references to objects that do not exist.
pub const NO_OBJECT_MESSAGE: &str = "No permissions to referred object or it does not exist!";

/// Builds the registry of every namespace the gateway serves.
#[must_use]
pub fn service_registry(
    api_version: &str,
    policy: LoginPolicy,
    clock: Arc<dyn Clock>,
) -> ServiceRegistry {
    ServiceRegistry::builder()
        .register("apiinfo", ApiInfoService::new(api_version))
        .register("user", UserService::new(policy, clock))
        .register("host", HostService)
        .build()
}

/// Parses string object ids.
///
/// Ids that are not numbers cannot name a stored object, so they are
/// reported the same way as missing ones.
pub(crate) fn parse_ids(ids: &[String]) -> Result<Vec<u64>, ServiceError> {
    ids.iter()
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| ServiceError::from(ApiError::permissions(NO_OBJECT_MESSAGE)))
        })
        .collect()
}

#[cfg(test)]
mod tests;
