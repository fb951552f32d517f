/*!
Pure decisions about the store and leader settings.

Nothing in here talks to the runtime: handlers read the current state, ask these functions what
it should become, and apply the answer.
*/

use hookenv::contrail::{API_IP, API_PORT, API_VIP, AUTH_INFO};
use hookenv::RelationData;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

pub(crate) const AUTH_MODE: &str = "auth_mode";
pub(crate) const DPDK: &str = "dpdk";
pub(crate) const VERSION: &str = "version";
pub(crate) const ENABLE_METADATA_SERVER: &str = "enable-metadata-server";
pub(crate) const METADATA_SECRET: &str = "metadata-shared-secret";

/// Store keys that mirror the controller relation, and the relation keys they come from.
const CONTROLLER_KEYS: &[(&str, &str)] = &[
    (AUTH_INFO, "auth-info"),
    (API_VIP, "api-vip"),
    (API_IP, "private-address"),
    (API_PORT, "port"),
    (AUTH_MODE, "auth-mode"),
];

/// Edits to apply to the configuration store.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StoreChanges {
    pub(crate) set: BTreeMap<String, Value>,
    pub(crate) remove: Vec<String>,
}

impl StoreChanges {
    pub(crate) fn apply<C>(&self, config: &mut C)
    where
        C: hookenv::ConfigStore + ?Sized,
    {
        for key in &self.remove {
            config.remove(key);
        }
        for (key, value) in &self.set {
            config.set(key, value.clone());
        }
    }
}

/// Works out the store edits for the data a controller published.  Keys the controller didn't
/// publish are left alone.
pub(crate) fn controller_changes(data: &RelationData, private_address: &str) -> StoreChanges {
    let mut changes = StoreChanges::default();
    for (local, remote) in CONTROLLER_KEYS {
        if let Some(value) = data.get(*remote) {
            changes
                .set
                .insert(local.to_string(), Value::String(value.clone()));
        }
    }

    let dpdk = dpdk_enabled(data.get("agents-info").map(String::as_str), private_address);
    changes.set.insert(DPDK.to_string(), Value::Bool(dpdk));
    changes
}

/// Store edits for when the last controller unit has gone.
pub(crate) fn departure_changes() -> StoreChanges {
    StoreChanges {
        set: BTreeMap::new(),
        remove: CONTROLLER_KEYS
            .iter()
            .map(|(local, _)| local.to_string())
            .chain(std::iter::once(DPDK.to_string()))
            .collect(),
    }
}

/// Whether DPDK is enabled for the host at `address`, according to the controller's
/// `agents-info`, a JSON map from agent address to flag.
pub(crate) fn dpdk_enabled(agents_info: Option<&str>, address: &str) -> bool {
    let agents_info = match agents_info {
        Some(info) if !info.trim().is_empty() => info,
        _ => {
            debug!("DPDK is off for {}: no agents info", address);
            return false;
        }
    };

    let agents: serde_json::Map<String, Value> = match serde_json::from_str(agents_info) {
        Ok(agents) => agents,
        Err(e) => {
            warn!("Ignoring agents info that is not a JSON object: {}", e);
            return false;
        }
    };

    let enabled = match agents.get(address) {
        None => false,
        Some(value) => parse_flag(value).unwrap_or_else(|| {
            warn!(
                "DPDK flag for {} is not a boolean ({}), treating it as false",
                address, value
            );
            false
        }),
    };
    debug!("DPDK for {} is {}", address, enabled);
    enabled
}

/// Reads a flag that producers publish in several shapes: a JSON boolean, the strings "true" or
/// "false" in any case, or 0/1 as a number or string.
pub(crate) fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// What to do with the metadata shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecretAction {
    Generate,
    Clear,
    Keep,
}

pub(crate) fn secret_action(metadata_enabled: bool, secret: Option<&str>) -> SecretAction {
    let has_secret = secret.map_or(false, |s| !s.is_empty());
    match (metadata_enabled, has_secret) {
        (true, false) => SecretAction::Generate,
        (false, true) => SecretAction::Clear,
        _ => SecretAction::Keep,
    }
}

/// Packs a package version like "4.1.2-0ubuntu1" into one comparable number,
/// `major * 10^4 + minor * 10^2 + patch`.
pub(crate) fn version_number(version: &str) -> Option<u64> {
    let upstream = version.split('-').next()?;
    let mut parts = upstream.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    let patch: u64 = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    Some(major * 10_000 + minor * 100 + patch)
}
