//! The `host` namespace: monitored host inventory.

use apigate_core::{
    AccessRule, ApiError, CallContext, Params, Service, ServiceError, UserType, parse_params,
    to_data,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::store::{HostRecord, StoreSession, StoreState};
use crate::{NO_OBJECT_MESSAGE, parse_ids};

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

const MONITORED: u8 = 0;
const NOT_MONITORED: u8 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetRequest {
    #[serde(default)]
    hostids: Option<Vec<String>>,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateRequest {
    host: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateRequest {
    hostid: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteRequest {
    hostids: Vec<String>,
}

fn invalid(message: impl Into<String>) -> ServiceError {
    ApiError::invalid_parameters(message).into()
}

fn check_host_name(host: &str) -> Result<(), ServiceError> {
    if host.is_empty() {
        return Err(invalid("Invalid parameter \"/host\": cannot be empty."));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | ' ' | '_' | '-');
    if !host.chars().all(allowed) {
        return Err(invalid(format!(
            "Incorrect characters used for host name \"{host}\"."
        )));
    }
    Ok(())
}

fn check_status(status: u8) -> Result<(), ServiceError> {
    match status {
        MONITORED | NOT_MONITORED => Ok(()),
        _ => Err(invalid(
            "Invalid parameter \"/status\": value must be one of 0, 1.",
        )),
    }
}

/// Rejects names already used by a host other than `hostid`.
fn check_unique(
    state: &StoreState,
    hostid: Option<u64>,
    host: &str,
    name: &str,
) -> Result<(), ServiceError> {
    let others = || {
        state
            .hosts
            .values()
            .filter(move |record| Some(record.hostid) != hostid)
    };
    if others().any(|record| record.host == host) {
        return Err(invalid(format!(
            "Host with the same name \"{host}\" already exists."
        )));
    }
    if others().any(|record| record.name == name) {
        return Err(invalid(format!(
            "Host with the same visible name \"{name}\" already exists."
        )));
    }
    Ok(())
}

/// Resolves the visible name for a write.
///
/// A blank or absent name follows the technical name when one is given.
/// `Ok(None)` keeps the stored name.
fn visible_name(
    name: Option<String>,
    host: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    match (name, host) {
        (Some(name), _) if !name.trim().is_empty() => Ok(Some(name)),
        (Some(_), None) => Err(invalid(
            "Visible name cannot be empty if host name is missing.",
        )),
        (_, Some(host)) => Ok(Some(host.to_owned())),
        (None, None) => Ok(None),
    }
}

fn no_object() -> ServiceError {
    ApiError::permissions(NO_OBJECT_MESSAGE).into()
}

/// Monitored host inventory.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostService;

impl HostService {
    fn get(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: GetRequest = parse_params(params)?;
        let wanted = request.hostids.as_deref().map(parse_ids).transpose()?;
        let store = ctx.backend::<StoreSession>()?;

        let hosts: Vec<HostRecord> = store.with_state(|state| {
            state
                .hosts
                .values()
                .filter(|record| wanted.as_ref().is_none_or(|ids| ids.contains(&record.hostid)))
                .filter(|record| request.host.as_ref().is_none_or(|host| *host == record.host))
                .cloned()
                .collect()
        });
        to_data(&hosts)
    }

    fn create(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: CreateRequest = parse_params(params)?;
        check_host_name(&request.host)?;
        let status = request.status.unwrap_or(MONITORED);
        check_status(status)?;
        let name = visible_name(request.name, Some(&request.host))?
            .unwrap_or_else(|| request.host.clone());
        let store = ctx.backend::<StoreSession>()?;

        let hostid = store.with_state(|state| -> Result<u64, ServiceError> {
            check_unique(state, None, &request.host, &name)?;
            let hostid = state.allocate_hostid();
            state.hosts.insert(
                hostid,
                HostRecord {
                    hostid,
                    host: request.host.clone(),
                    name,
                    status,
                },
            );
            Ok(hostid)
        })?;
        info!(target: HOST_TARGET, hostid, host = %request.host, "host created");
        Ok(json!({ "hostids": [hostid.to_string()] }))
    }

    fn update(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: UpdateRequest = parse_params(params)?;
        let hostid = request.hostid.parse::<u64>().map_err(|_| no_object())?;
        if let Some(host) = &request.host {
            check_host_name(host)?;
        }
        if let Some(status) = request.status {
            check_status(status)?;
        }
        let name = visible_name(request.name, request.host.as_deref())?;
        let store = ctx.backend::<StoreSession>()?;

        store.with_state(|state| -> Result<(), ServiceError> {
            let current = state.hosts.get(&hostid).ok_or_else(no_object)?;
            let host = request.host.clone().unwrap_or_else(|| current.host.clone());
            let name = name.unwrap_or_else(|| current.name.clone());
            let status = request.status.unwrap_or(current.status);
            check_unique(state, Some(hostid), &host, &name)?;
            state.hosts.insert(
                hostid,
                HostRecord {
                    hostid,
                    host,
                    name,
                    status,
                },
            );
            Ok(())
        })?;
        info!(target: HOST_TARGET, hostid, "host updated");
        Ok(json!({ "hostids": [request.hostid] }))
    }

    fn delete(ctx: &CallContext<'_>, params: Params) -> Result<Value, ServiceError> {
        let request: DeleteRequest = parse_params(params)?;
        if request.hostids.is_empty() {
            return Err(invalid("Invalid parameter \"/hostids\": cannot be empty."));
        }
        let ids = parse_ids(&request.hostids)?;
        let store = ctx.backend::<StoreSession>()?;

        store.with_state(|state| -> Result<(), ServiceError> {
            if !ids.iter().all(|id| state.hosts.contains_key(id)) {
                return Err(no_object());
            }
            for id in &ids {
                state.hosts.remove(id);
            }
            Ok(())
        })?;
        info!(target: HOST_TARGET, count = ids.len(), "hosts deleted");
        Ok(json!({ "hostids": request.hostids }))
    }
}

impl Service for HostService {
    fn methods(&self) -> &[&'static str] {
        &["get", "create", "update", "delete"]
    }

    fn access_rule(&self, method: &str) -> AccessRule {
        match method {
            "create" | "update" | "delete" => AccessRule::at_least(UserType::Admin),
            _ => AccessRule::ANY_USER,
        }
    }

    fn call(
        &self,
        ctx: &CallContext<'_>,
        method: &str,
        params: Params,
    ) -> Result<Value, ServiceError> {
        match method {
            "get" => Self::get(ctx, params),
            "create" => Self::create(ctx, params),
            "update" => Self::update(ctx, params),
            "delete" => Self::delete(ctx, params),
            other => Err(ApiError::no_method(format!("Incorrect method \"host.{other}\".")).into()),
        }
    }
}
