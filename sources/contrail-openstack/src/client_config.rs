//! The Contrail client configuration files on this unit.
//!
//! Both files belong entirely to this agent and are rendered from the store as a whole, so a
//! rewrite after the controller goes away leaves no stale controller data behind.

use crate::reconcile::AUTH_MODE;
use hookenv::contrail::{self, AuthInfo};
use hookenv::ini::ConfigPatch;
use hookenv::ConfigStore;
use std::path::Path;

/// Neutron's Contrail plugin configuration.
pub(crate) fn contrail_plugin_patch<C>(config: &C, path: &Path) -> ConfigPatch
where
    C: ConfigStore + ?Sized,
{
    let address = contrail::controller_address(config);
    let mut patch = ConfigPatch::replace(path)
        .set_some("APISERVER", "api_server_ip", address.as_ref().map(|(ip, _)| ip.clone()))
        .set_some("APISERVER", "api_server_port", address.map(|(_, port)| port))
        .set("APISERVER", "multi_tenancy", "True")
        .set("APISERVER", "contrail_extensions", contrail_extensions())
        .set_some("APISERVER", "aaa_mode", contrail::config_text(config, AUTH_MODE));

    if let Some(auth) = AuthInfo::from_config(config) {
        patch = patch
            .set_some("KEYSTONE", "auth_url", auth.auth_url())
            .set_some("KEYSTONE", "admin_user", auth.admin_user())
            .set_some("KEYSTONE", "admin_password", auth.admin_password())
            .set_some("KEYSTONE", "admin_tenant_name", auth.admin_tenant());
    }
    patch
}

fn contrail_extensions() -> String {
    [
        "ipam:neutron_plugin_contrail.plugins.opencontrail.contrail_plugin_ipam.NeutronPluginContrailIpam",
        "policy:neutron_plugin_contrail.plugins.opencontrail.contrail_plugin_policy.NeutronPluginContrailPolicy",
        "route-table:neutron_plugin_contrail.plugins.opencontrail.contrail_plugin_vpc.NeutronPluginContrailVpc",
        "contrail:None",
        "service-interface:None",
        "vf-binding:None",
    ]
    .join(",")
}

/// The VNC API client library configuration.
pub(crate) fn vnc_api_lib_patch<C>(config: &C, path: &Path) -> ConfigPatch
where
    C: ConfigStore + ?Sized,
{
    let address = contrail::controller_address(config);
    let mut patch = ConfigPatch::replace(path)
        .set_some("global", "WEB_SERVER", address.as_ref().map(|(ip, _)| ip.clone()))
        .set_some("global", "WEB_PORT", address.map(|(_, port)| port));

    if let Some(auth) = AuthInfo::from_config(config) {
        patch = patch
            .set("auth", "AUTHN_TYPE", "keystone")
            .set("auth", "AUTHN_PROTOCOL", auth.protocol())
            .set_some("auth", "AUTHN_SERVER", auth.keystone_ip())
            .set("auth", "AUTHN_PORT", auth.public_port())
            .set("auth", "AUTHN_URL", auth.token_path());
    }
    patch
}
