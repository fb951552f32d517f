/*!
Discovery of the OpenStack service addresses the controller needs.

The leader asks the identity service for its catalog, takes the internal endpoint of the compute,
image and network services, and resolves each endpoint's host to an address.  The addresses are
kept in leader settings as `<type>_service_ip`, and only the ones that changed are written.
*/

use crate::error::{self, Result};
use hookenv::contrail::{AuthInfo, KeystoneVersion};
use hookenv::leadership::LeaderSettings;
use log::{debug, trace};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use url::{Host, Url};

const DEFAULT_TIMEOUT_SECONDS: u64 = 20;

/// Service types whose addresses the controller is told about.
pub(crate) const SERVICE_TYPES: &[&str] = &["compute", "image", "network"];

/// Leader setting holding the address of a service type.
pub(crate) fn setting_name(service_type: &str) -> String {
    format!("{}_service_ip", service_type)
}

/// Source of the identity service's catalog.
pub(crate) trait ServiceCatalog {
    /// Returns the internal endpoint URL of each service type in the catalog.
    fn internal_endpoints(&self, auth: &AuthInfo) -> Result<BTreeMap<String, String>>;
}

/// Reads the catalog from Keystone by requesting a token.
#[derive(Debug, Clone)]
pub(crate) struct KeystoneCatalog {
    timeout: Duration,
}

impl Default for KeystoneCatalog {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl ServiceCatalog for KeystoneCatalog {
    fn internal_endpoints(&self, auth: &AuthInfo) -> Result<BTreeMap<String, String>> {
        let base = auth.base_url().context(error::MissingKeystoneSnafu)?;
        let url_text = format!("{}{}", base, auth.token_path());
        let url = Url::parse(&url_text).context(error::UrlParseSnafu { url: url_text })?;

        debug!("Requesting service catalog from {}", url.as_str());
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context(error::HttpClientSnafu)?;
        let response = client
            .post(url.clone())
            .json(&token_request(auth))
            .send()
            .context(error::HttpSendSnafu { url: url.clone() })?;
        let body: Value = response
            .error_for_status()
            .context(error::HttpResponseSnafu { url: url.clone() })?
            .json()
            .context(error::HttpResponseSnafu { url })?;
        Ok(parse_catalog(auth.version(), &body))
    }
}

fn token_request(auth: &AuthInfo) -> Value {
    let user = auth.admin_user().unwrap_or_default();
    let password = auth.admin_password().unwrap_or_default();
    let tenant = auth.admin_tenant().unwrap_or_default();
    match auth.version() {
        KeystoneVersion::V2 => json!({
            "auth": {
                "passwordCredentials": {"username": user, "password": password},
                "tenantName": tenant,
            }
        }),
        KeystoneVersion::V3 => json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": user,
                            "domain": {"name": auth.user_domain()},
                            "password": password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": tenant,
                        "domain": {"name": auth.project_domain()},
                    }
                }
            }
        }),
    }
}

/// Picks the internal endpoint of each service out of a token response.
pub(crate) fn parse_catalog(version: KeystoneVersion, body: &Value) -> BTreeMap<String, String> {
    let services = match version {
        KeystoneVersion::V2 => &body["access"]["serviceCatalog"],
        KeystoneVersion::V3 => &body["token"]["catalog"],
    };

    let mut endpoints = BTreeMap::new();
    for service in services.as_array().into_iter().flatten() {
        let service_type = match service["type"].as_str() {
            Some(t) => t,
            None => continue,
        };
        let internal = service["endpoints"]
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|endpoint| match version {
                KeystoneVersion::V2 => endpoint["internalURL"].as_str(),
                KeystoneVersion::V3 if endpoint["interface"] == "internal" => {
                    endpoint["url"].as_str()
                }
                KeystoneVersion::V3 => None,
            });
        if let Some(url) = internal {
            trace!("Internal {} endpoint: {}", service_type, url);
            endpoints.insert(service_type.to_string(), url.to_string());
        }
    }
    endpoints
}

/// Resolves the host of an endpoint URL, preferring IPv4 addresses.
pub(crate) fn endpoint_address(endpoint: &str) -> Result<IpAddr> {
    let url = Url::parse(endpoint).context(error::UrlParseSnafu { url: endpoint })?;
    match url.host() {
        Some(Host::Ipv4(ip)) => Ok(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => Ok(IpAddr::V6(ip)),
        Some(Host::Domain(host)) => {
            let addresses =
                dns_lookup::lookup_host(host).context(error::ResolveSnafu { host })?;
            addresses
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addresses.first())
                .copied()
                .context(error::NoAddressSnafu { host })
        }
        None => error::UrlHostSnafu { url: url.clone() }.fail(),
    }
}

/// Finds the address of each service type in the catalog, keyed by leader setting name.
pub(crate) fn discover<S>(catalog: &S, auth: &AuthInfo) -> Result<BTreeMap<String, String>>
where
    S: ServiceCatalog + ?Sized,
{
    let endpoints = catalog.internal_endpoints(auth)?;
    let mut addresses = BTreeMap::new();
    for service_type in SERVICE_TYPES {
        if let Some(endpoint) = endpoints.get(*service_type) {
            let address = endpoint_address(endpoint)?;
            addresses.insert(setting_name(service_type), address.to_string());
        }
    }
    Ok(addresses)
}

/// Returns the leader settings that differ from what was discovered.
pub(crate) fn changed_settings<F>(discovered: &BTreeMap<String, String>, current: F) -> LeaderSettings
where
    F: Fn(&str) -> Option<String>,
{
    discovered
        .iter()
        .filter(|(key, value)| current(key).as_ref() != Some(*value))
        .map(|(key, value)| (key.clone(), Some(value.clone())))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::btreemap;

    struct FixedCatalog(BTreeMap<String, String>);

    impl ServiceCatalog for FixedCatalog {
        fn internal_endpoints(&self, _auth: &AuthInfo) -> Result<BTreeMap<String, String>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn v3_catalog() {
        let body = json!({"token": {"catalog": [
            {"type": "compute", "endpoints": [
                {"interface": "public", "url": "http://1.1.1.1:8774/v2.1"},
                {"interface": "internal", "url": "http://10.0.0.20:8774/v2.1"},
            ]},
            {"type": "identity", "endpoints": [
                {"interface": "internal", "url": "http://10.0.0.3:5000/v3"},
            ]},
            {"endpoints": []},
        ]}});
        assert_eq!(
            parse_catalog(KeystoneVersion::V3, &body),
            btreemap! {
                "compute".to_string() => "http://10.0.0.20:8774/v2.1".to_string(),
                "identity".to_string() => "http://10.0.0.3:5000/v3".to_string(),
            }
        );
    }

    #[test]
    fn v2_catalog() {
        let body = json!({"access": {"serviceCatalog": [
            {"type": "image", "endpoints": [
                {"publicURL": "http://1.1.1.1:9292", "internalURL": "http://10.0.0.21:9292"},
            ]},
        ]}});
        assert_eq!(
            parse_catalog(KeystoneVersion::V2, &body),
            btreemap! {"image".to_string() => "http://10.0.0.21:9292".to_string()}
        );
        assert!(parse_catalog(KeystoneVersion::V3, &body).is_empty());
    }

    #[test]
    fn literal_addresses() {
        assert_eq!(
            endpoint_address("http://10.0.0.20:8774/v2.1").unwrap().to_string(),
            "10.0.0.20"
        );
        assert_eq!(
            endpoint_address("http://[fd00::1]:9696").unwrap().to_string(),
            "fd00::1"
        );
        assert!(endpoint_address("not a url").is_err());
    }

    #[test]
    fn discovery_and_diff() {
        let catalog = FixedCatalog(btreemap! {
            "compute".to_string() => "http://10.0.0.20:8774/v2.1".to_string(),
            "network".to_string() => "http://10.0.0.22:9696".to_string(),
            "identity".to_string() => "http://10.0.0.3:5000/v3".to_string(),
        });
        let discovered = discover(&catalog, &AuthInfo::default()).unwrap();
        assert_eq!(
            discovered,
            btreemap! {
                "compute_service_ip".to_string() => "10.0.0.20".to_string(),
                "network_service_ip".to_string() => "10.0.0.22".to_string(),
            }
        );

        let current = btreemap! {"compute_service_ip" => "10.0.0.20".to_string()};
        let changed = changed_settings(&discovered, |key| current.get(key).cloned());
        assert_eq!(
            changed,
            btreemap! {"network_service_ip".to_string() => Some("10.0.0.22".to_string())}
        );

        let all = btreemap! {
            "compute_service_ip" => "10.0.0.20".to_string(),
            "network_service_ip" => "10.0.0.22".to_string(),
        };
        assert!(changed_settings(&discovered, |key| all.get(key).cloned()).is_empty());
    }
}
