//! Facts about the Contrail controller that both agents derive from the configuration store.
//!
//! The controller relation handlers copy the controller's address, API port, virtual IP and
//! identity service description into the store; these helpers read them back.

use crate::config::ConfigStore;
use log::warn;
use serde_json::{Map, Value};

/// Store key holding the controller's private address.
pub const API_IP: &str = "api_ip";
/// Store key holding the controller's API port.
pub const API_PORT: &str = "api_port";
/// Store key holding the controller cluster's virtual IP.
pub const API_VIP: &str = "api_vip";
/// Store key holding the identity service description, as JSON text.
pub const AUTH_INFO: &str = "auth_info";

/// Returns a store value as text; numbers are formatted, other non-strings are ignored.
pub fn config_text<C>(config: &C, key: &str) -> Option<String>
where
    C: ConfigStore + ?Sized,
{
    value_text(config.get(key)?)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Address and port of the controller API.  The virtual IP wins over a single controller's
/// address, and nothing is returned unless both an address and a port are known.
pub fn controller_address<C>(config: &C) -> Option<(String, String)>
where
    C: ConfigStore + ?Sized,
{
    let ip = config_text(config, API_VIP).or_else(|| config_text(config, API_IP))?;
    let port = config_text(config, API_PORT)?;
    Some((ip, port))
}

/// Identity service API versions the controller may describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoneVersion {
    V2,
    V3,
}

/// The identity service description the controller publishes as `auth-info`.
///
/// Every field is optional; an absent or unreadable description behaves like an empty one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthInfo {
    fields: Map<String, Value>,
}

impl AuthInfo {
    /// Parses the JSON text of an `auth-info` setting.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(Value::Object(fields)) => Some(Self { fields }),
            Ok(_) => {
                warn!("Ignoring auth info that is not a JSON object");
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable auth info: {}", e);
                None
            }
        }
    }

    /// Reads the description stored under `auth_info`.
    pub fn from_config<C>(config: &C) -> Option<Self>
    where
        C: ConfigStore + ?Sized,
    {
        config.get_str(AUTH_INFO).and_then(Self::parse)
    }

    /// Like `from_config`, but gives an empty description when there is none.
    pub fn from_config_or_empty<C>(config: &C) -> Self
    where
        C: ConfigStore + ?Sized,
    {
        Self::from_config(config).unwrap_or_default()
    }

    /// Returns a field as text.
    pub fn get(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(value_text)
    }

    pub fn admin_user(&self) -> Option<String> {
        self.get("keystone_admin_user")
    }

    pub fn admin_password(&self) -> Option<String> {
        self.get("keystone_admin_password")
    }

    pub fn admin_tenant(&self) -> Option<String> {
        self.get("keystone_admin_tenant")
    }

    pub fn keystone_ip(&self) -> Option<String> {
        self.get("keystone_ip")
    }

    pub fn protocol(&self) -> String {
        self.get("keystone_protocol")
            .unwrap_or_else(|| "http".to_string())
    }

    pub fn public_port(&self) -> String {
        self.get("keystone_public_port")
            .unwrap_or_else(|| "5000".to_string())
    }

    pub fn user_domain(&self) -> String {
        self.get("keystone_user_domain_name")
            .unwrap_or_else(|| "Default".to_string())
    }

    pub fn project_domain(&self) -> String {
        self.get("keystone_project_domain_name")
            .unwrap_or_else(|| "Default".to_string())
    }

    pub fn version(&self) -> KeystoneVersion {
        match self.get("keystone_api_version").as_deref() {
            Some("3") | Some("v3") => KeystoneVersion::V3,
            _ => KeystoneVersion::V2,
        }
    }

    /// Path of the token endpoint for the API version.
    pub fn token_path(&self) -> &'static str {
        match self.version() {
            KeystoneVersion::V2 => "/v2.0/tokens",
            KeystoneVersion::V3 => "/v3/auth/tokens",
        }
    }

    /// Base URL of the identity service, e.g. `http://10.0.0.3:5000`.
    pub fn base_url(&self) -> Option<String> {
        Some(format!(
            "{}://{}:{}",
            self.protocol(),
            self.keystone_ip()?,
            self.public_port()
        ))
    }

    /// Versioned URL of the identity service, e.g. `http://10.0.0.3:5000/v3`.
    pub fn auth_url(&self) -> Option<String> {
        let suffix = match self.version() {
            KeystoneVersion::V2 => "/v2.0",
            KeystoneVersion::V3 => "/v3",
        };
        Some(format!("{}{}", self.base_url()?, suffix))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::MemoryConfig;
    use serde_json::json;

    #[test]
    fn vip_wins() {
        let mut config = MemoryConfig::from_value(json!({"api_ip": "10.0.0.5", "api_port": "8082"}));
        assert_eq!(
            controller_address(&config),
            Some(("10.0.0.5".to_string(), "8082".to_string()))
        );
        config.set(API_VIP, json!("10.0.0.100"));
        assert_eq!(
            controller_address(&config),
            Some(("10.0.0.100".to_string(), "8082".to_string()))
        );
        config.remove(API_PORT);
        assert_eq!(controller_address(&config), None);
    }

    #[test]
    fn auth_urls() {
        let auth = AuthInfo::parse(
            r#"{"keystone_ip": "10.0.0.3", "keystone_api_version": "3",
                "keystone_public_port": 5000, "keystone_protocol": "https"}"#,
        )
        .unwrap();
        assert_eq!(auth.version(), KeystoneVersion::V3);
        assert_eq!(auth.auth_url().unwrap(), "https://10.0.0.3:5000/v3");
        assert_eq!(auth.token_path(), "/v3/auth/tokens");

        let auth = AuthInfo::parse(r#"{"keystone_ip": "10.0.0.3"}"#).unwrap();
        assert_eq!(auth.auth_url().unwrap(), "http://10.0.0.3:5000/v2.0");
        assert_eq!(auth.token_path(), "/v2.0/tokens");
    }

    #[test]
    fn missing_or_bad_auth_info() {
        assert_eq!(AuthInfo::parse("not json"), None);
        assert_eq!(AuthInfo::parse("[1, 2]"), None);
        let config = MemoryConfig::new();
        let auth = AuthInfo::from_config_or_empty(&config);
        assert_eq!(auth.admin_user(), None);
        assert_eq!(auth.base_url(), None);
    }
}
