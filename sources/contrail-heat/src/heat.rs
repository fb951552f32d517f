//! Event handlers and the heat configuration.

use crate::error::{self, Result};
use crate::Hook;
use hookenv::apt;
use hookenv::contrail::{self, AuthInfo};
use hookenv::ini::ConfigPatch;
use hookenv::{host, ConfigStore, HookEnvironment, PackageManager, ServiceManager, Status};
use log::{debug, info, trace, warn};
use serde_json::Value;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

const CONTROLLER_RELATION: &str = "contrail-controller";
const MISSING_CONTROLLER: &str = "Missing relation to contrail-controller";
const PACKAGES: &[&str] = &["contrail-heat"];
const HEAT_ENGINE: &str = "heat-engine";
const HEAT_PLUGIN_PATH: &str = "heat-plugin-path";
const DEFAULT_HEAT_PLUGIN_PATH: &str = "/usr/lib/heat";

const HEAT_CONF: &str = "/etc/heat/heat.conf";
// Shipped by the Contrail python API package.
const CONTRAIL_RESOURCES: &str = "/usr/lib/python2.7/dist-packages/vnc_api/gen/heat/resources";

/// Store keys that mirror the controller relation, and the relation keys they come from.
const CONTROLLER_KEYS: &[(&str, &str)] = &[
    (contrail::API_IP, "private-address"),
    (contrail::API_PORT, "port"),
    (contrail::API_VIP, "api-vip"),
    (contrail::AUTH_INFO, "auth-info"),
    ("orchestrator_info", "orchestrator-info"),
];

/// Locations of the files this agent reads and writes.
#[derive(Debug, Clone)]
pub(crate) struct Paths {
    pub(crate) heat_conf: PathBuf,
    pub(crate) contrail_resources: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            heat_conf: PathBuf::from(HEAT_CONF),
            contrail_resources: PathBuf::from(CONTRAIL_RESOURCES),
        }
    }
}

pub(crate) struct HookContext<'a> {
    pub(crate) config: &'a mut dyn ConfigStore,
    pub(crate) env: &'a mut dyn HookEnvironment,
    pub(crate) packages: &'a dyn PackageManager,
    pub(crate) services: &'a dyn ServiceManager,
    pub(crate) paths: Paths,
}

/// Runs the handler for `hook`.  Events without a handler are logged and skipped.
pub(crate) fn dispatch(hook: &Hook, ctx: &mut HookContext<'_>) -> Result<()> {
    info!("Running '{}' hook", hook);
    match hook {
        Hook::Install => install(ctx),
        Hook::ControllerChanged => controller_changed(ctx),
        Hook::ControllerDeparted => controller_departed(ctx),
        Hook::Unknown(name) => {
            info!("Unknown hook '{}' - skipping", name);
            Ok(())
        }
    }
}

fn install(ctx: &mut HookContext<'_>) -> Result<()> {
    set_status(ctx, Status::maintenance("Installing..."))?;
    apt::configure_sources(
        ctx.packages,
        ctx.config.get_str("install-sources"),
        ctx.config.get_str("install-keys"),
        true,
    )
    .context(error::ConfigureSourcesSnafu)?;
    ctx.packages
        .upgrade(true)
        .context(error::PackageUpgradeSnafu)?;
    ctx.packages
        .install(PACKAGES, &[])
        .context(error::PackageInstallSnafu {
            packages: PACKAGES.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        })?;

    match ctx.packages.installed_version(PACKAGES[0]) {
        Ok(version) => ctx
            .env
            .application_version_set(&version)
            .context(error::StatusSnafu)?,
        Err(e) => warn!("Couldn't detect installed application version: {}", e),
    }
    Ok(())
}

fn controller_changed(ctx: &mut HookContext<'_>) -> Result<()> {
    let data = ctx
        .env
        .relation_get(None, None)
        .context(error::RelationQuerySnafu {
            relation: CONTROLLER_RELATION,
        })?;
    trace!("Controller data: {:?}", data);

    for (local, remote) in CONTROLLER_KEYS {
        if let Some(value) = data.get(*remote) {
            ctx.config.set(local, Value::String(value.clone()));
        }
    }
    ctx.config.save().context(error::SaveConfigSnafu)?;

    configure_heat(ctx)
}

fn controller_departed(ctx: &mut HookContext<'_>) -> Result<()> {
    let remaining = ctx
        .env
        .any_related_units(CONTROLLER_RELATION)
        .context(error::RelationQuerySnafu {
            relation: CONTROLLER_RELATION,
        })?;
    if remaining {
        debug!("Controller units remain");
        return Ok(());
    }
    set_status(ctx, Status::blocked(MISSING_CONTROLLER))
}

/// Installs the Contrail resources into heat's plugin directory and points heat at the
/// controller.
fn configure_heat(ctx: &mut HookContext<'_>) -> Result<()> {
    let plugin_path = PathBuf::from(
        contrail::config_text(&*ctx.config, HEAT_PLUGIN_PATH)
            .unwrap_or_else(|| DEFAULT_HEAT_PLUGIN_PATH.to_string()),
    );
    host::ensure_directory(&plugin_path).context(error::PluginDirectorySnafu {
        path: &plugin_path,
    })?;

    let resources = plugin_path.join("contrail");
    if resources.is_dir() {
        debug!("Contrail resources already in '{}'", resources.display());
    } else {
        info!("Copying Contrail resources to '{}'", resources.display());
        host::copy_tree(&ctx.paths.contrail_resources, &resources)
            .context(error::CopyResourcesSnafu { path: &resources })?;
    }

    let auth = AuthInfo::from_config_or_empty(&*ctx.config);
    let api_server = contrail::controller_address(&*ctx.config).map(|(ip, _)| ip);
    let patch = heat_conf_patch(&ctx.paths.heat_conf, &plugin_path, &auth, api_server);
    patch.write().context(error::HeatConfSnafu {
        path: &ctx.paths.heat_conf,
    })?;

    ctx.services
        .restart(HEAT_ENGINE)
        .context(error::ServiceRestartSnafu {
            service: HEAT_ENGINE,
        })?;
    set_status(ctx, Status::active("Contrail resources installed"))
}

/// Edits to heat.conf: add the plugin directory to `plugin_dirs` and set the credentials heat
/// uses to reach the controller.  Unknown values are written empty.
fn heat_conf_patch(
    heat_conf: &Path,
    plugin_path: &Path,
    auth: &AuthInfo,
    api_server: Option<String>,
) -> ConfigPatch {
    let section = "clients_contrail";
    ConfigPatch::merge(heat_conf)
        .add_to_list("DEFAULT", "plugin_dirs", plugin_path.display().to_string())
        .set(section, "user", auth.admin_user().unwrap_or_default())
        .set(section, "password", auth.admin_password().unwrap_or_default())
        .set(section, "tenant", auth.admin_tenant().unwrap_or_default())
        .set(section, "api_server", api_server.unwrap_or_default())
        .set(section, "auth_host_ip", auth.keystone_ip().unwrap_or_default())
}

fn set_status(ctx: &mut HookContext<'_>, status: Status) -> Result<()> {
    info!("Status: {} '{}'", status.state, status.message);
    ctx.env.status_set(&status).context(error::StatusSnafu)
}
