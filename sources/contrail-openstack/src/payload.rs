/*!
Settings published to related services.

Downstream services (nova-compute, neutron-api, heat) take their Contrail configuration as a
"subordinate configuration": a JSON description of the sections and keys to add to their own
configuration files, shaped like

```json
{"nova-compute": {"/etc/nova/nova.conf": {"sections": {"DEFAULT": [["key", "value"]]}}}}
```

The controller gets an "orchestrator info" blob describing this cloud.
*/

use crate::error::{self, Result};
use hookenv::contrail::AuthInfo;
use hookenv::RelationSettings;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::BTreeMap;

const NOVA_CONF: &str = "/etc/nova/nova.conf";
const NEUTRON_CONF: &str = "/etc/neutron/neutron.conf";
const HEAT_CONF: &str = "/etc/heat/heat.conf";
pub(crate) const CONTRAIL_PLUGIN_INI: &str = "/etc/neutron/plugins/opencontrail/ContrailPlugin.ini";

const PLUGIN_BASE: &str = "neutron_plugin_contrail.plugins.opencontrail";
const NEUTRON_EXTENSIONS: &[&str] = &[
    "/usr/lib/python2.7/dist-packages/neutron_plugin_contrail/extensions",
    "/usr/lib/python2.7/dist-packages/neutron_lbaas/extensions",
];

/// Sections of one downstream configuration file, each a list of key/value pairs.  A `None`
/// value means the input for it is unknown.
type Sections = BTreeMap<String, Vec<(String, Option<String>)>>;

#[derive(Debug, Serialize)]
struct FileFragment {
    sections: Sections,
}

/// Builds the JSON text of a subordinate configuration for one file of one service.
fn subordinate_configuration(service: &str, path: &str, sections: Sections) -> Result<String> {
    let mut files = BTreeMap::new();
    files.insert(path.to_string(), FileFragment { sections });
    let mut services = BTreeMap::new();
    services.insert(service.to_string(), files);
    serde_json::to_string(&services).context(error::SerializeSnafu {
        what: "subordinate_configuration",
    })
}

fn pairs(entries: &[(&str, Option<String>)]) -> Vec<(String, Option<String>)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn fixed(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// Settings for nova-compute: the metadata secret and the nova.conf fragment.
pub(crate) fn nova_settings(dpdk: bool, metadata_secret: Option<String>) -> Result<RelationSettings> {
    let mut sections = Sections::new();
    sections.insert(
        "DEFAULT".to_string(),
        pairs(&[(
            "firewall_driver",
            fixed("nova.virt.firewall.NoopFirewallDriver"),
        )]),
    );
    if dpdk {
        sections.insert(
            "CONTRAIL".to_string(),
            pairs(&[("use_userspace_vhost", fixed("True"))]),
        );
        sections.insert(
            "libvirt".to_string(),
            pairs(&[("use_huge_pages", fixed("True"))]),
        );
    }

    let mut settings = RelationSettings::new();
    settings.insert("metadata-shared-secret".to_string(), metadata_secret);
    settings.insert(
        "subordinate_configuration".to_string(),
        Some(subordinate_configuration("nova-compute", NOVA_CONF, sections)?),
    );
    Ok(settings)
}

#[derive(Debug, Serialize)]
struct Middleware {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    config: BTreeMap<&'static str, String>,
}

/// Settings for neutron-api: plugin classes, extension paths, and the extra auth middleware in
/// RBAC mode.  Outside RBAC mode the middleware key is explicitly unset.
pub(crate) fn neutron_settings(auth_mode: Option<&str>) -> Result<RelationSettings> {
    let mut sections = Sections::new();
    sections.insert(
        "DEFAULT".to_string(),
        pairs(&[("api_extensions_path", Some(NEUTRON_EXTENSIONS.join(":")))]),
    );

    let mut settings = RelationSettings::new();
    settings.insert("neutron-plugin".to_string(), fixed("contrail"));
    settings.insert(
        "core-plugin".to_string(),
        Some(format!(
            "{}.contrail_plugin.NeutronPluginContrailCoreV2",
            PLUGIN_BASE
        )),
    );
    settings.insert(
        "neutron-plugin-config".to_string(),
        fixed(CONTRAIL_PLUGIN_INI),
    );
    settings.insert(
        "service-plugins".to_string(),
        Some(format!(
            "{}.loadbalancer.v2.plugin.LoadBalancerPluginV2",
            PLUGIN_BASE
        )),
    );
    settings.insert(
        "quota-driver".to_string(),
        Some(format!("{}.quota.driver.QuotaDriver", PLUGIN_BASE)),
    );
    settings.insert(
        "subordinate_configuration".to_string(),
        Some(subordinate_configuration(
            "neutron-api",
            NEUTRON_CONF,
            sections,
        )?),
    );

    let middleware = if auth_mode == Some("rbac") {
        let mut config = BTreeMap::new();
        config.insert(
            "paste.filter_factory",
            format!("{}.neutron_middleware:token_factory", PLUGIN_BASE),
        );
        let middleware = vec![Middleware {
            name: "user_token",
            kind: "filter",
            config,
        }];
        Some(
            serde_json::to_string(&middleware).context(error::SerializeSnafu {
                what: "extra_middleware",
            })?,
        )
    } else {
        None
    };
    settings.insert("extra_middleware".to_string(), middleware);
    Ok(settings)
}

/// Settings for the heat charm: where the Contrail resources live, and the credentials heat uses
/// to reach the controller.
pub(crate) fn heat_settings(
    plugin_dirs: Option<String>,
    auth: &AuthInfo,
    api_server: Option<String>,
) -> Result<RelationSettings> {
    let mut sections = Sections::new();
    sections.insert(
        "clients_contrail".to_string(),
        pairs(&[
            ("user", auth.admin_user()),
            ("password", auth.admin_password()),
            ("tenant", auth.admin_tenant()),
            ("api_server", api_server),
            ("auth_host_ip", auth.keystone_ip()),
        ]),
    );

    let mut settings = RelationSettings::new();
    settings.insert("plugin-dirs".to_string(), plugin_dirs);
    settings.insert(
        "subordinate_configuration".to_string(),
        Some(subordinate_configuration("heat", HEAT_CONF, sections)?),
    );
    Ok(settings)
}

/// What the controller learns about this cloud.
#[derive(Debug, Default, Serialize)]
pub(crate) struct OrchestratorInfo {
    cloud_orchestrator: &'static str,
    #[serde(rename = "unit-type")]
    unit_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) metadata_shared_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) compute_service_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) image_service_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) network_service_ip: Option<String>,
}

impl OrchestratorInfo {
    pub(crate) fn new() -> Self {
        Self {
            cloud_orchestrator: "openstack",
            unit_type: "openstack",
            ..Default::default()
        }
    }

    /// Settings for the controller relation.
    pub(crate) fn settings(&self) -> Result<RelationSettings> {
        let info = serde_json::to_string(self).context(error::SerializeSnafu {
            what: "orchestrator-info",
        })?;
        let mut settings = RelationSettings::new();
        settings.insert("orchestrator-info".to_string(), Some(info));
        Ok(settings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::{json, Value};

    fn json_setting(settings: &RelationSettings, key: &str) -> Value {
        let text = settings[key].as_deref().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn nova_fragment() {
        let settings = nova_settings(false, Some("secret".to_string())).unwrap();
        assert_eq!(
            settings["metadata-shared-secret"].as_deref(),
            Some("secret")
        );
        assert_eq!(
            json_setting(&settings, "subordinate_configuration"),
            json!({"nova-compute": {"/etc/nova/nova.conf": {"sections": {
                "DEFAULT": [["firewall_driver", "nova.virt.firewall.NoopFirewallDriver"]]
            }}}})
        );
    }

    #[test]
    fn nova_dpdk_sections() {
        let settings = nova_settings(true, None).unwrap();
        let conf = json_setting(&settings, "subordinate_configuration");
        let sections = &conf["nova-compute"]["/etc/nova/nova.conf"]["sections"];
        assert_eq!(sections["CONTRAIL"], json!([["use_userspace_vhost", "True"]]));
        assert_eq!(sections["libvirt"], json!([["use_huge_pages", "True"]]));
        assert_eq!(settings["metadata-shared-secret"], None);
    }

    #[test]
    fn rbac_middleware() {
        let rbac = neutron_settings(Some("rbac")).unwrap();
        assert_eq!(
            json_setting(&rbac, "extra_middleware"),
            json!([{
                "name": "user_token",
                "type": "filter",
                "config": {
                    "paste.filter_factory":
                        "neutron_plugin_contrail.plugins.opencontrail.neutron_middleware:token_factory"
                }
            }])
        );

        for mode in [None, Some("cloud-admin"), Some("no-auth")] {
            let settings = neutron_settings(mode).unwrap();
            assert_eq!(settings["extra_middleware"], None);
        }
    }

    #[test]
    fn neutron_plugin_classes() {
        let settings = neutron_settings(None).unwrap();
        assert_eq!(settings["neutron-plugin"].as_deref(), Some("contrail"));
        assert_eq!(
            settings["core-plugin"].as_deref(),
            Some("neutron_plugin_contrail.plugins.opencontrail.contrail_plugin.NeutronPluginContrailCoreV2")
        );
        assert_eq!(
            settings["neutron-plugin-config"].as_deref(),
            Some("/etc/neutron/plugins/opencontrail/ContrailPlugin.ini")
        );
        let conf = json_setting(&settings, "subordinate_configuration");
        assert_eq!(
            conf["neutron-api"]["/etc/neutron/neutron.conf"]["sections"]["DEFAULT"][0][1],
            json!("/usr/lib/python2.7/dist-packages/neutron_plugin_contrail/extensions:/usr/lib/python2.7/dist-packages/neutron_lbaas/extensions")
        );
    }

    #[test]
    fn heat_fragment_without_controller() {
        let settings = heat_settings(Some("/plugins".to_string()), &AuthInfo::default(), None)
            .unwrap();
        assert_eq!(settings["plugin-dirs"].as_deref(), Some("/plugins"));
        assert_eq!(
            json_setting(&settings, "subordinate_configuration"),
            json!({"heat": {"/etc/heat/heat.conf": {"sections": {"clients_contrail": [
                ["user", null], ["password", null], ["tenant", null],
                ["api_server", null], ["auth_host_ip", null]
            ]}}}})
        );
    }

    #[test]
    fn orchestrator_info_omits_unknowns() {
        let mut info = OrchestratorInfo::new();
        assert_eq!(
            info.settings().unwrap()["orchestrator-info"].as_deref(),
            Some(r#"{"cloud_orchestrator":"openstack","unit-type":"openstack"}"#)
        );
        info.metadata_shared_secret = Some("s".to_string());
        info.image_service_ip = Some("10.0.0.9".to_string());
        assert_eq!(
            json_setting(&info.settings().unwrap(), "orchestrator-info"),
            json!({
                "cloud_orchestrator": "openstack",
                "unit-type": "openstack",
                "metadata_shared_secret": "s",
                "image_service_ip": "10.0.0.9",
            })
        );
    }
}
