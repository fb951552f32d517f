//! Event handlers.
//!
//! Each handler reads what it needs from the context, asks `reconcile` and `payload` what the
//! store, files and relations should look like, and applies the result.

use crate::client_config;
use crate::context::HookContext;
use crate::error::{self, Result};
use crate::hooks::{Downstream, Hook, CONTROLLER_RELATION};
use crate::payload::{self, OrchestratorInfo};
use crate::reconcile::{self, SecretAction};
use crate::service_ips;
use hookenv::apt;
use hookenv::contrail::{self, AuthInfo};
use hookenv::leadership::LeaderSettings;
use hookenv::{RelationSettings, Status};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs;
use uuid::Uuid;

const MISSING_CONTROLLER: &str = "Missing relation to contrail-controller";
const INSTALL_SOURCES: &str = "install-sources";
const INSTALL_KEYS: &str = "install-keys";
const HEAT_PLUGIN_DIRS: &str = "heat-plugin-dirs";

const NEUTRON_API_PACKAGES: &[&str] = &["neutron-plugin-contrail"];
const HEAT_PACKAGES: &[&str] = &["contrail-heat"];
// The Contrail builds of these carry the vhost-user VIF needed for DPDK.
const NOVA_DPDK_PACKAGES: &[&str] = &["nova-compute", "libvirt-bin", "contrail-nova-vif"];
const NOVA_DPDK_OPTIONS: &[&str] = &[
    "--reinstall",
    "--force-yes",
    "-fy",
    "-o",
    "Dpkg::Options::=--force-confnew",
];
const NOVA_APT_PREFERENCES: &str = "40contrail";
const METADATA_SERVICE: &str = "nova-api-metadata";

/// Runs the handler for `hook`.  Events without a handler are logged and skipped.
pub(crate) fn dispatch(hook: &Hook, ctx: &mut HookContext<'_>) -> Result<()> {
    info!("Running '{}' hook", hook);
    match hook {
        Hook::Install => install(ctx),
        Hook::ConfigChanged => config_changed(ctx),
        Hook::LeaderElected => leader_elected(ctx),
        Hook::LeaderSettingsChanged => notify(ctx, Downstream::NovaCompute),
        Hook::UpdateStatus => update_status(ctx),
        Hook::ControllerJoined => controller_joined(ctx),
        Hook::ControllerChanged => controller_changed(ctx),
        Hook::ControllerDeparted => controller_departed(ctx),
        Hook::DownstreamJoined(downstream) => downstream_joined(ctx, *downstream, None),
        Hook::Unknown(name) => {
            info!("Unknown hook '{}' - skipping", name);
            Ok(())
        }
    }
}

fn install(ctx: &mut HookContext<'_>) -> Result<()> {
    set_status(ctx, Status::maintenance("Installing..."))?;
    configure_sources(ctx)?;
    ctx.packages
        .upgrade(false)
        .context(error::PackageUpgradeSnafu)?;
    set_status(ctx, Status::blocked(MISSING_CONTROLLER))
}

fn config_changed(ctx: &mut HookContext<'_>) -> Result<()> {
    if ctx.config.changed(INSTALL_SOURCES) || ctx.config.changed(INSTALL_KEYS) {
        info!("Package sources changed");
        configure_sources(ctx)?;
        ctx.packages
            .upgrade(false)
            .context(error::PackageUpgradeSnafu)?;
        notify(ctx, Downstream::NeutronApi)?;
    }

    if is_leader(ctx)? && manage_metadata_secret(ctx)? {
        notify_controller(ctx)?;
        notify(ctx, Downstream::NovaCompute)?;
    }
    Ok(())
}

fn leader_elected(ctx: &mut HookContext<'_>) -> Result<()> {
    if manage_metadata_secret(ctx)? {
        notify_controller(ctx)?;
    }
    notify(ctx, Downstream::NovaCompute)
}

fn update_status(ctx: &mut HookContext<'_>) -> Result<()> {
    if !is_leader(ctx)? {
        return Ok(());
    }
    if update_service_ips(ctx)? {
        notify_controller(ctx)?;
    }
    Ok(())
}

fn controller_joined(ctx: &mut HookContext<'_>) -> Result<()> {
    if !is_leader(ctx)? {
        debug!("Not the leader, leaving orchestrator info to the leader");
        return Ok(());
    }
    let settings = orchestrator_info(ctx)?.settings()?;
    relation_set(ctx, None, CONTROLLER_RELATION, &settings)
}

fn controller_changed(ctx: &mut HookContext<'_>) -> Result<()> {
    let data = ctx
        .env
        .relation_get(None, None)
        .context(error::RelationQuerySnafu {
            relation: CONTROLLER_RELATION,
        })?;
    trace!("Controller data: {:?}", data);
    let address = ctx
        .env
        .private_address()
        .context(error::PrivateAddressSnafu)?;

    let changes = reconcile::controller_changes(&data, &address);
    debug!("Store changes from controller: {:?}", changes.set.keys());
    changes.apply(&mut *ctx.config);
    save(ctx)?;
    write_configs(ctx)?;
    notify_downstreams(ctx)?;
    set_status(ctx, Status::active("Unit is ready"))?;

    // The identity service may have moved the endpoints.
    if is_leader(ctx)? && update_service_ips(ctx)? {
        notify_controller(ctx)?;
    }
    Ok(())
}

fn controller_departed(ctx: &mut HookContext<'_>) -> Result<()> {
    let remaining = ctx
        .env
        .any_related_units(CONTROLLER_RELATION)
        .context(error::RelationQuerySnafu {
            relation: CONTROLLER_RELATION,
        })?;
    if remaining {
        debug!("Controller units remain, keeping controller settings");
        return Ok(());
    }

    info!("Last controller unit departed, removing controller settings");
    reconcile::departure_changes().apply(&mut *ctx.config);
    save(ctx)?;
    write_configs(ctx)?;
    notify_downstreams(ctx)?;
    set_status(ctx, Status::blocked(MISSING_CONTROLLER))
}

fn downstream_joined(
    ctx: &mut HookContext<'_>,
    downstream: Downstream,
    relation_id: Option<&str>,
) -> Result<()> {
    match downstream {
        Downstream::NovaCompute => nova_compute_joined(ctx, relation_id),
        Downstream::NeutronApi => neutron_api_joined(ctx, relation_id),
        Downstream::HeatPlugin => heat_plugin_joined(ctx, relation_id),
    }
}

fn nova_compute_joined(ctx: &mut HookContext<'_>, relation_id: Option<&str>) -> Result<()> {
    let dpdk = ctx.config.get_bool(reconcile::DPDK).unwrap_or(false);
    if dpdk {
        info!("DPDK is enabled, installing the vhost-user VIF");
        let from = ctx.paths.charm_dir.join("files").join(NOVA_APT_PREFERENCES);
        let to = ctx.paths.apt_preferences_dir.join(NOVA_APT_PREFERENCES);
        fs::copy(&from, &to).context(error::CopyFileSnafu { from: &from, to: &to })?;
        install_packages(ctx, NOVA_DPDK_PACKAGES, NOVA_DPDK_OPTIONS)?;
        ctx.services
            .restart(METADATA_SERVICE)
            .context(error::ServiceRestartSnafu {
                service: METADATA_SERVICE,
            })?;
    }

    let secret = leader_get(ctx, reconcile::METADATA_SECRET)?;
    let settings = payload::nova_settings(dpdk, secret)?;
    relation_set(ctx, relation_id, Downstream::NovaCompute.relation_name(), &settings)
}

fn neutron_api_joined(ctx: &mut HookContext<'_>, relation_id: Option<&str>) -> Result<()> {
    install_packages(ctx, NEUTRON_API_PACKAGES, &[])?;
    if let Some(version) = report_version(ctx, NEUTRON_API_PACKAGES[0])? {
        match reconcile::version_number(&version) {
            Some(number) => {
                ctx.config.set(reconcile::VERSION, json!(number));
                save(ctx)?;
            }
            None => warn!("Unable to parse package version '{}'", version),
        }
    }

    let auth_mode = contrail::config_text(&*ctx.config, reconcile::AUTH_MODE);
    let settings = payload::neutron_settings(auth_mode.as_deref())?;
    relation_set(ctx, relation_id, Downstream::NeutronApi.relation_name(), &settings)?;

    // Installing the plugin package may have replaced our files with its defaults.
    write_configs(ctx)
}

fn heat_plugin_joined(ctx: &mut HookContext<'_>, relation_id: Option<&str>) -> Result<()> {
    configure_sources(ctx)?;
    ctx.packages
        .upgrade(true)
        .context(error::PackageUpgradeSnafu)?;
    install_packages(ctx, HEAT_PACKAGES, &[])?;
    report_version(ctx, HEAT_PACKAGES[0])?;

    let plugin_dirs = contrail::config_text(&*ctx.config, HEAT_PLUGIN_DIRS);
    let auth = AuthInfo::from_config_or_empty(&*ctx.config);
    let api_server = contrail::controller_address(&*ctx.config).map(|(ip, _)| ip);
    let settings = payload::heat_settings(plugin_dirs, &auth, api_server)?;
    relation_set(ctx, relation_id, Downstream::HeatPlugin.relation_name(), &settings)
}

/// Sends the current settings to every joined unit of a downstream service.
fn notify(ctx: &mut HookContext<'_>, downstream: Downstream) -> Result<()> {
    for relation_id in joined_relation_ids(ctx, downstream.relation_name())? {
        debug!("Notifying {}", relation_id);
        downstream_joined(ctx, downstream, Some(relation_id.as_str()))?;
    }
    Ok(())
}

fn notify_downstreams(ctx: &mut HookContext<'_>) -> Result<()> {
    for downstream in Downstream::ALL {
        notify(ctx, downstream)?;
    }
    Ok(())
}

fn notify_controller(ctx: &mut HookContext<'_>) -> Result<()> {
    let settings = orchestrator_info(ctx)?.settings()?;
    for relation_id in joined_relation_ids(ctx, CONTROLLER_RELATION)? {
        relation_set(ctx, Some(relation_id.as_str()), CONTROLLER_RELATION, &settings)?;
    }
    Ok(())
}

fn orchestrator_info(ctx: &HookContext<'_>) -> Result<OrchestratorInfo> {
    let mut info = OrchestratorInfo::new();
    if metadata_enabled(ctx) {
        info.metadata_shared_secret = leader_get(ctx, reconcile::METADATA_SECRET)?;
    }
    info.compute_service_ip = leader_get(ctx, &service_ips::setting_name("compute"))?;
    info.image_service_ip = leader_get(ctx, &service_ips::setting_name("image"))?;
    info.network_service_ip = leader_get(ctx, &service_ips::setting_name("network"))?;
    Ok(info)
}

fn metadata_enabled(ctx: &HookContext<'_>) -> bool {
    ctx.config
        .get_bool(reconcile::ENABLE_METADATA_SERVER)
        .unwrap_or(true)
}

/// Generates or clears the metadata shared secret to match the charm option.  Returns whether
/// the secret changed.
fn manage_metadata_secret(ctx: &mut HookContext<'_>) -> Result<bool> {
    let secret = leader_get(ctx, reconcile::METADATA_SECRET)?;
    let new_secret = match reconcile::secret_action(metadata_enabled(ctx), secret.as_deref()) {
        SecretAction::Generate => {
            info!("Generating metadata shared secret");
            Some(Uuid::new_v4().to_string())
        }
        SecretAction::Clear => {
            info!("Clearing metadata shared secret");
            None
        }
        SecretAction::Keep => return Ok(false),
    };

    let mut settings = LeaderSettings::new();
    settings.insert(reconcile::METADATA_SECRET.to_string(), new_secret);
    ctx.env
        .leader_set(&settings)
        .context(error::LeadershipSnafu)?;
    Ok(true)
}

/// Refreshes the service addresses in leader settings.  Returns whether any changed; failing to
/// reach the identity service counts as no change.
fn update_service_ips(ctx: &mut HookContext<'_>) -> Result<bool> {
    let auth = match AuthInfo::from_config(&*ctx.config) {
        Some(auth) => auth,
        None => {
            debug!("No auth info yet, skipping service discovery");
            return Ok(false);
        }
    };
    let discovered = match service_ips::discover(ctx.catalog, &auth) {
        Ok(discovered) => discovered,
        Err(e) => {
            error!("Unable to discover service addresses: {}", e);
            return Ok(false);
        }
    };

    let mut current = BTreeMap::new();
    for key in discovered.keys() {
        if let Some(value) = leader_get(ctx, key)? {
            current.insert(key.clone(), value);
        }
    }
    let changed = service_ips::changed_settings(&discovered, |key| current.get(key).cloned());
    if changed.is_empty() {
        debug!("Service addresses unchanged");
        return Ok(false);
    }

    info!("Service addresses changed: {:?}", changed);
    ctx.env
        .leader_set(&changed)
        .context(error::LeadershipSnafu)?;
    Ok(true)
}

/// Rewrites the Contrail client configuration files from the store.
fn write_configs(ctx: &HookContext<'_>) -> Result<()> {
    let patches = [
        client_config::contrail_plugin_patch(&*ctx.config, &ctx.paths.contrail_plugin_ini),
        client_config::vnc_api_lib_patch(&*ctx.config, &ctx.paths.vnc_api_lib_ini),
    ];
    for patch in &patches {
        let changed = patch.write().context(error::WriteConfigFileSnafu {
            path: &patch.path,
        })?;
        if changed {
            info!("Updated '{}'", patch.path.display());
        }
    }
    Ok(())
}

fn configure_sources(ctx: &mut HookContext<'_>) -> Result<()> {
    apt::configure_sources(
        ctx.packages,
        ctx.config.get_str(INSTALL_SOURCES),
        ctx.config.get_str(INSTALL_KEYS),
        false,
    )
    .context(error::ConfigureSourcesSnafu)?;
    ctx.packages.update().context(error::PackageUpdateSnafu)
}

fn install_packages(ctx: &HookContext<'_>, packages: &[&str], options: &[&str]) -> Result<()> {
    ctx.packages
        .install(packages, options)
        .context(error::PackageInstallSnafu {
            packages: packages.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        })
}

/// Reports the installed version of `package` as the application version.  Failing to query it
/// is not fatal.
fn report_version(ctx: &mut HookContext<'_>, package: &str) -> Result<Option<String>> {
    let version = match ctx.packages.installed_version(package) {
        Ok(version) => version,
        Err(e) => {
            warn!("Couldn't detect installed application version: {}", e);
            return Ok(None);
        }
    };
    ctx.env
        .application_version_set(&version)
        .context(error::StatusSnafu)?;
    Ok(Some(version))
}

fn is_leader(ctx: &HookContext<'_>) -> Result<bool> {
    ctx.env.is_leader().context(error::LeadershipSnafu)
}

fn leader_get(ctx: &HookContext<'_>, key: &str) -> Result<Option<String>> {
    let value = ctx.env.leader_get(key).context(error::LeadershipSnafu)?;
    Ok(value.filter(|v| !v.is_empty()))
}

fn joined_relation_ids(ctx: &HookContext<'_>, relation: &str) -> Result<Vec<String>> {
    ctx.env
        .joined_relation_ids(relation)
        .context(error::RelationQuerySnafu { relation })
}

fn relation_set(
    ctx: &mut HookContext<'_>,
    relation_id: Option<&str>,
    relation: &str,
    settings: &RelationSettings,
) -> Result<()> {
    trace!("Setting {:?} on {}", settings.keys(), relation_id.unwrap_or(relation));
    ctx.env
        .relation_set(relation_id, settings)
        .context(error::RelationSetSnafu {
            relation: relation_id.unwrap_or(relation),
        })
}

fn set_status(ctx: &mut HookContext<'_>, status: Status) -> Result<()> {
    info!("Status: {} '{}'", status.state, status.message);
    ctx.env.status_set(&status).context(error::StatusSnafu)
}

fn save(ctx: &mut HookContext<'_>) -> Result<()> {
    ctx.config.save().context(error::SaveConfigSnafu)
}
