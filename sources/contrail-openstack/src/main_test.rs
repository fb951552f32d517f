use crate::context::{HookContext, Paths};
use crate::error::{self, Result};
use crate::hooks::Hook;
use crate::main_inner;
use crate::service_ips::ServiceCatalog;
use hookenv::contrail::AuthInfo;
use hookenv::memory::{MemoryConfig, MemoryEnvironment, MemoryPackages, MemoryServices};
use hookenv::{ConfigStore, RelationData, WorkloadState};
use maplit::btreemap;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CONTROLLER: &str = "contrail-controller:1";
const NOVA: &str = "nova-compute:2";
const NEUTRON: &str = "neutron-api:3";
const HEAT: &str = "heat-plugin:4";

const AUTH_INFO: &str = r#"{"keystone_protocol": "http", "keystone_ip": "10.0.0.3",
    "keystone_public_port": "5000", "keystone_api_version": "3",
    "keystone_admin_user": "admin", "keystone_admin_password": "pw",
    "keystone_admin_tenant": "admin"}"#;

/// Catalog that serves fixed endpoints, or fails if it has none.
struct TestCatalog {
    endpoints: Option<BTreeMap<String, String>>,
}

impl ServiceCatalog for TestCatalog {
    fn internal_endpoints(&self, _auth: &AuthInfo) -> Result<BTreeMap<String, String>> {
        match &self.endpoints {
            Some(endpoints) => Ok(endpoints.clone()),
            None => error::MissingKeystoneSnafu.fail(),
        }
    }
}

struct Fixture {
    dir: TempDir,
    config: MemoryConfig,
    env: MemoryEnvironment,
    packages: MemoryPackages,
    services: MemoryServices,
    catalog: TestCatalog,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("charm/files")).unwrap();
        fs::write(dir.path().join("charm/files/40contrail"), "Package: *\n").unwrap();
        fs::create_dir_all(dir.path().join("apt")).unwrap();

        let mut packages = MemoryPackages::new();
        packages
            .versions
            .insert("neutron-plugin-contrail".to_string(), "4.1.0-1".to_string());
        packages
            .versions
            .insert("contrail-heat".to_string(), "4.1.0-1".to_string());

        Self {
            dir,
            config: MemoryConfig::from_value(json!({
                "install-sources": "",
                "install-keys": "",
                "enable-metadata-server": true,
                "heat-plugin-dirs": "/usr/lib/python2.7/dist-packages/vnc_api/gen/heat/resources",
            })),
            env: MemoryEnvironment::new(),
            packages,
            services: MemoryServices::new(),
            catalog: TestCatalog { endpoints: None },
        }
    }

    /// A fixture with the controller and all three downstream services related.
    fn related() -> Self {
        let mut fixture = Self::new();
        fixture
            .env
            .add_relation("contrail-controller", CONTROLLER, &["contrail-controller/0"]);
        fixture.env.add_relation("nova-compute", NOVA, &["nova-compute/0"]);
        fixture.env.add_relation("neutron-api", NEUTRON, &["neutron-api/0"]);
        fixture.env.add_relation("heat-plugin", HEAT, &["heat/0"]);
        fixture
    }

    fn paths(&self) -> Paths {
        let root = self.dir.path();
        Paths {
            charm_dir: root.join("charm"),
            contrail_plugin_ini: root.join("etc/neutron/plugins/opencontrail/ContrailPlugin.ini"),
            vnc_api_lib_ini: root.join("etc/contrail/vnc_api_lib.ini"),
            apt_preferences_dir: root.join("apt"),
        }
    }

    fn run(&mut self, hook: &str) -> Result<()> {
        let paths = self.paths();
        let mut ctx = HookContext {
            config: &mut self.config,
            env: &mut self.env,
            packages: &self.packages,
            services: &self.services,
            catalog: &self.catalog,
            paths,
        };
        main_inner(&Hook::from_name(hook), &mut ctx)
    }

    /// Delivers controller data and runs the controller-changed hook.
    fn controller_changed(&mut self, data: &[(&str, &str)]) -> Result<()> {
        let data: RelationData = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.env.set_remote_data(CONTROLLER, data);
        self.env.current_relation = Some(CONTROLLER.to_string());
        self.run("contrail-controller-relation-changed")
    }

    fn read(&self, path: PathBuf) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    fn plugin_ini(&self) -> String {
        self.read(self.paths().contrail_plugin_ini)
    }

    fn vnc_api_lib_ini(&self) -> String {
        self.read(self.paths().vnc_api_lib_ini)
    }

    fn sets_on(&self, relation_id: &str) -> usize {
        self.env
            .relation_sets
            .iter()
            .filter(|(id, _)| id == relation_id)
            .count()
    }

    fn json_setting(&self, relation_id: &str, key: &str) -> Option<Value> {
        self.env
            .local_data(relation_id)
            .get(key)
            .map(|text| serde_json::from_str(text).unwrap())
    }
}

const CONTROLLER_DATA: &[(&str, &str)] = &[
    ("private-address", "10.0.0.2"),
    ("port", "8082"),
    ("auth-info", AUTH_INFO),
    ("auth-mode", "cloud-admin"),
];

#[test]
fn install() {
    let mut fixture = Fixture::new();
    fixture.run("install").unwrap();
    assert_eq!(
        fixture.packages.calls(),
        vec![
            "add-sources [] []".to_string(),
            "update".to_string(),
            "upgrade".to_string()
        ]
    );
    let states: Vec<_> = fixture.env.statuses.iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![WorkloadState::Maintenance, WorkloadState::Blocked]
    );
    assert_eq!(
        fixture.env.last_status().unwrap().message,
        "Missing relation to contrail-controller"
    );
}

#[test]
fn unknown_hook_is_skipped() {
    let mut fixture = Fixture::new();
    fixture.run("stop").unwrap();
    assert!(fixture.env.statuses.is_empty());
    assert!(fixture.packages.calls().is_empty());
    assert_eq!(fixture.config.saves, 1);
}

#[test]
fn controller_changed_writes_and_notifies() {
    let mut fixture = Fixture::related();
    fixture.controller_changed(CONTROLLER_DATA).unwrap();

    assert_eq!(fixture.config.get_str("api_ip"), Some("10.0.0.2"));
    assert_eq!(fixture.config.get_str("api_port"), Some("8082"));
    assert_eq!(fixture.config.get_bool("dpdk"), Some(false));
    assert_eq!(
        fixture.env.last_status().unwrap().state,
        WorkloadState::Active
    );

    let plugin_ini = fixture.plugin_ini();
    assert!(plugin_ini.contains("api_server_ip = 10.0.0.2\n"));
    assert!(plugin_ini.contains("aaa_mode = cloud-admin\n"));
    assert!(plugin_ini.contains("auth_url = http://10.0.0.3:5000/v3\n"));
    assert!(fixture
        .vnc_api_lib_ini()
        .contains("AUTHN_URL = /v3/auth/tokens\n"));

    assert_eq!(fixture.sets_on(NOVA), 1);
    assert_eq!(fixture.sets_on(NEUTRON), 1);
    assert_eq!(fixture.sets_on(HEAT), 1);
    // Only the leader talks to the controller.
    assert_eq!(fixture.sets_on(CONTROLLER), 0);

    let heat = fixture
        .json_setting(HEAT, "subordinate_configuration")
        .unwrap();
    assert_eq!(
        heat["heat"]["/etc/heat/heat.conf"]["sections"]["clients_contrail"],
        json!([
            ["user", "admin"], ["password", "pw"], ["tenant", "admin"],
            ["api_server", "10.0.0.2"], ["auth_host_ip", "10.0.0.3"]
        ])
    );
    assert_eq!(fixture.config.get("version"), Some(&json!(40100)));
    assert_eq!(fixture.env.application_version.as_deref(), Some("4.1.0-1"));
}

#[test]
fn missing_fields_keep_stored_values() {
    let mut fixture = Fixture::related();
    fixture.config.set("api_vip", json!("10.0.0.100"));
    fixture.config.set("auth_mode", json!("rbac"));
    fixture
        .controller_changed(&[("private-address", "10.0.0.2"), ("port", "8082")])
        .unwrap();

    assert_eq!(fixture.config.get_str("api_vip"), Some("10.0.0.100"));
    assert_eq!(fixture.config.get_str("auth_mode"), Some("rbac"));
    assert!(fixture.plugin_ini().contains("api_server_ip = 10.0.0.100\n"));
}

#[test]
fn controller_changed_is_idempotent() {
    let mut fixture = Fixture::related();
    fixture.controller_changed(CONTROLLER_DATA).unwrap();
    let first_sets = fixture.env.relation_sets.clone();
    let first_files = (fixture.plugin_ini(), fixture.vnc_api_lib_ini());

    fixture.controller_changed(CONTROLLER_DATA).unwrap();
    let second_sets = fixture.env.relation_sets[first_sets.len()..].to_vec();
    assert_eq!(second_sets, first_sets);
    assert_eq!((fixture.plugin_ini(), fixture.vnc_api_lib_ini()), first_files);
}

#[test]
fn departure_removes_controller_settings() {
    let mut fixture = Fixture::related();
    fixture.controller_changed(CONTROLLER_DATA).unwrap();
    fixture.config.set("api_vip", json!("10.0.0.100"));
    let sets_before = fixture.sets_on(NOVA);

    fixture.env.depart_all(CONTROLLER);
    fixture.run("contrail-controller-relation-departed").unwrap();

    for key in ["auth_info", "api_vip", "api_ip", "api_port", "auth_mode", "dpdk"] {
        assert_eq!(fixture.config.get(key), None, "{} left behind", key);
    }
    assert_eq!(
        fixture.env.last_status().unwrap().state,
        WorkloadState::Blocked
    );
    let plugin_ini = fixture.plugin_ini();
    assert!(!plugin_ini.contains("api_server_ip"));
    assert!(!plugin_ini.contains("KEYSTONE"));
    assert!(!fixture.vnc_api_lib_ini().contains("WEB_SERVER"));
    assert_eq!(fixture.sets_on(NOVA), sets_before + 1);
}

#[test]
fn departure_with_remaining_units() {
    let mut fixture = Fixture::related();
    fixture.controller_changed(CONTROLLER_DATA).unwrap();
    let statuses = fixture.env.statuses.len();
    fixture.run("contrail-controller-relation-departed").unwrap();
    assert_eq!(fixture.config.get_str("api_ip"), Some("10.0.0.2"));
    assert_eq!(fixture.env.statuses.len(), statuses);
}

#[test]
fn dpdk_host() {
    let mut fixture = Fixture::related();
    fixture.env.private_address = "10.0.0.5".to_string();
    let mut data = CONTROLLER_DATA.to_vec();
    data.push(("agents-info", r#"{"10.0.0.5": true, "10.0.0.6": false}"#));
    fixture.controller_changed(&data).unwrap();

    assert_eq!(fixture.config.get_bool("dpdk"), Some(true));
    assert!(fixture.packages.calls().contains(
        &r#"install nova-compute libvirt-bin contrail-nova-vif ["--reinstall", "--force-yes", "-fy", "-o", "Dpkg::Options::=--force-confnew"]"#
            .to_string()
    ));
    assert_eq!(fixture.services.restarted(), vec!["nova-api-metadata".to_string()]);
    assert!(fixture.dir.path().join("apt/40contrail").exists());

    let nova = fixture
        .json_setting(NOVA, "subordinate_configuration")
        .unwrap();
    let sections = &nova["nova-compute"]["/etc/nova/nova.conf"]["sections"];
    assert_eq!(sections["CONTRAIL"], json!([["use_userspace_vhost", "True"]]));
}

#[test]
fn dpdk_other_host() {
    let mut fixture = Fixture::related();
    fixture.env.private_address = "10.0.0.7".to_string();
    let mut data = CONTROLLER_DATA.to_vec();
    data.push(("agents-info", r#"{"10.0.0.5": true}"#));
    fixture.controller_changed(&data).unwrap();

    assert_eq!(fixture.config.get_bool("dpdk"), Some(false));
    assert!(fixture.services.restarted().is_empty());
}

#[test]
fn rbac_middleware_follows_auth_mode() {
    let mut fixture = Fixture::related();
    let mut data = CONTROLLER_DATA.to_vec();
    data.retain(|(k, _)| *k != "auth-mode");
    data.push(("auth-mode", "rbac"));
    fixture.controller_changed(&data).unwrap();
    let middleware = fixture.json_setting(NEUTRON, "extra_middleware").unwrap();
    assert_eq!(middleware[0]["name"], json!("user_token"));
    assert!(fixture.plugin_ini().contains("aaa_mode = rbac\n"));

    fixture.controller_changed(CONTROLLER_DATA).unwrap();
    assert_eq!(fixture.json_setting(NEUTRON, "extra_middleware"), None);
}

#[test]
fn metadata_secret_lifecycle() {
    let mut fixture = Fixture::related();
    fixture.env.leader = true;

    fixture.run("leader-elected").unwrap();
    let secret = fixture
        .env
        .leader_setting("metadata-shared-secret")
        .unwrap()
        .to_string();
    assert_eq!(fixture.sets_on(CONTROLLER), 1);
    let info = fixture.json_setting(CONTROLLER, "orchestrator-info").unwrap();
    assert_eq!(info["metadata_shared_secret"], json!(secret));
    assert_eq!(info["cloud_orchestrator"], json!("openstack"));
    assert_eq!(
        fixture.env.local_data(NOVA).get("metadata-shared-secret"),
        Some(&secret)
    );

    // Already present: nothing new for the controller.
    fixture.run("leader-elected").unwrap();
    assert_eq!(
        fixture.env.leader_setting("metadata-shared-secret"),
        Some(secret.as_str())
    );
    assert_eq!(fixture.sets_on(CONTROLLER), 1);

    // Disabling the metadata server clears the secret.
    fixture.config.set("enable-metadata-server", json!(false));
    fixture.run("config-changed").unwrap();
    assert_eq!(fixture.env.leader_setting("metadata-shared-secret"), None);
    assert_eq!(fixture.sets_on(CONTROLLER), 2);
    let info = fixture.json_setting(CONTROLLER, "orchestrator-info").unwrap();
    assert_eq!(info.get("metadata_shared_secret"), None);
    assert_eq!(fixture.env.local_data(NOVA).get("metadata-shared-secret"), None);
}

#[test]
fn non_leader_leaves_secret_alone() {
    let mut fixture = Fixture::related();
    fixture.run("config-changed").unwrap();
    assert_eq!(fixture.env.leader_setting("metadata-shared-secret"), None);
    fixture.run("contrail-controller-relation-joined").unwrap();
    assert_eq!(fixture.sets_on(CONTROLLER), 0);
}

#[test]
fn config_changed_only_reinstalls_on_source_change() {
    let mut fixture = Fixture::related();
    fixture.run("config-changed").unwrap();
    assert!(fixture.packages.calls().contains(&"upgrade".to_string()));
    assert_eq!(fixture.sets_on(NEUTRON), 1);

    let calls = fixture.packages.calls().len();
    fixture.run("config-changed").unwrap();
    assert_eq!(fixture.packages.calls().len(), calls);
    assert_eq!(fixture.sets_on(NEUTRON), 1);

    fixture.config.set("install-sources", json!("ppa:opencontrail/ppa"));
    fixture.run("config-changed").unwrap();
    assert!(fixture
        .packages
        .calls()
        .contains(&r#"add-sources ["ppa:opencontrail/ppa"] []"#.to_string()));
    assert_eq!(fixture.sets_on(NEUTRON), 2);
}

#[test]
fn downstream_join_targets_the_event_relation() {
    let mut fixture = Fixture::related();
    fixture.env.current_relation = Some(HEAT.to_string());
    fixture.run("heat-plugin-relation-joined").unwrap();
    assert_eq!(fixture.sets_on(HEAT), 1);
    assert_eq!(
        fixture.env.local_data(HEAT).get("plugin-dirs").map(String::as_str),
        Some("/usr/lib/python2.7/dist-packages/vnc_api/gen/heat/resources")
    );
    assert!(fixture.packages.calls().contains(&"dist-upgrade".to_string()));
    assert!(fixture
        .packages
        .calls()
        .contains(&"install contrail-heat".to_string()));
}

#[test]
fn version_query_failure_is_not_fatal() {
    let mut fixture = Fixture::related();
    fixture.packages.versions.clear();
    fixture.env.current_relation = Some(NEUTRON.to_string());
    fixture.run("neutron-api-relation-joined").unwrap();
    assert_eq!(fixture.sets_on(NEUTRON), 1);
    assert_eq!(fixture.config.get("version"), None);
    assert_eq!(fixture.env.application_version, None);
}

#[test]
fn failed_install_stops_neutron_api_join() {
    let mut fixture = Fixture::related();
    fixture.packages.fail_install = true;
    fixture.env.current_relation = Some(NEUTRON.to_string());
    assert!(matches!(
        fixture.run("neutron-api-relation-joined"),
        Err(error::Error::PackageInstall { .. })
    ));
    assert_eq!(fixture.sets_on(NEUTRON), 0);
    assert!(fixture.env.statuses.is_empty());
    assert_eq!(fixture.env.application_version, None);
    assert_eq!(fixture.config.get("version"), None);
    assert_eq!(fixture.config.saves, 0);
}

#[test]
fn failed_upgrade_stops_install() {
    let mut fixture = Fixture::new();
    fixture.packages.fail_upgrade = true;
    assert!(matches!(
        fixture.run("install"),
        Err(error::Error::PackageUpgrade { .. })
    ));
    let states: Vec<_> = fixture.env.statuses.iter().map(|s| s.state).collect();
    assert_eq!(states, vec![WorkloadState::Maintenance]);
    assert_eq!(fixture.config.saves, 0);
}

#[test]
fn update_status_refreshes_service_ips() {
    let mut fixture = Fixture::related();
    fixture.env.leader = true;
    fixture.config.set("auth_info", json!(AUTH_INFO));
    fixture.catalog.endpoints = Some(btreemap! {
        "compute".to_string() => "http://10.0.0.20:8774/v2.1".to_string(),
        "image".to_string() => "http://10.0.0.21:9292".to_string(),
        "network".to_string() => "http://10.0.0.22:9696".to_string(),
    });

    fixture.run("update-status").unwrap();
    assert_eq!(
        fixture.env.leader_setting("compute_service_ip"),
        Some("10.0.0.20")
    );
    assert_eq!(fixture.sets_on(CONTROLLER), 1);
    let info = fixture.json_setting(CONTROLLER, "orchestrator-info").unwrap();
    assert_eq!(info["network_service_ip"], json!("10.0.0.22"));

    // Unchanged addresses don't touch the controller relation.
    fixture.run("update-status").unwrap();
    assert_eq!(fixture.sets_on(CONTROLLER), 1);

    // Neither does failing to reach the identity service.
    fixture.catalog.endpoints = None;
    fixture.run("update-status").unwrap();
    assert_eq!(fixture.sets_on(CONTROLLER), 1);
}

#[test]
fn update_status_on_follower() {
    let mut fixture = Fixture::related();
    fixture.config.set("auth_info", json!(AUTH_INFO));
    fixture.catalog.endpoints = Some(btreemap! {
        "compute".to_string() => "http://10.0.0.20:8774/v2.1".to_string(),
    });
    fixture.run("update-status").unwrap();
    assert_eq!(fixture.env.leader_setting("compute_service_ip"), None);
}
