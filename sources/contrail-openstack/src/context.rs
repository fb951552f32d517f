//! Everything a handler works with, passed explicitly.

use crate::payload::CONTRAIL_PLUGIN_INI;
use crate::service_ips::ServiceCatalog;
use hookenv::{ConfigStore, HookEnvironment, PackageManager, ServiceManager};
use std::path::PathBuf;

const VNC_API_LIB_INI: &str = "/etc/contrail/vnc_api_lib.ini";
const APT_PREFERENCES_DIR: &str = "/etc/apt/preferences.d";

/// Locations of the files this agent reads and writes.
#[derive(Debug, Clone)]
pub(crate) struct Paths {
    /// Root of the charm, holding the `files/` shipped with it.
    pub(crate) charm_dir: PathBuf,
    pub(crate) contrail_plugin_ini: PathBuf,
    pub(crate) vnc_api_lib_ini: PathBuf,
    pub(crate) apt_preferences_dir: PathBuf,
}

impl Paths {
    pub(crate) fn new<P: Into<PathBuf>>(charm_dir: P) -> Self {
        Self {
            charm_dir: charm_dir.into(),
            contrail_plugin_ini: PathBuf::from(CONTRAIL_PLUGIN_INI),
            vnc_api_lib_ini: PathBuf::from(VNC_API_LIB_INI),
            apt_preferences_dir: PathBuf::from(APT_PREFERENCES_DIR),
        }
    }
}

pub(crate) struct HookContext<'a> {
    pub(crate) config: &'a mut dyn ConfigStore,
    pub(crate) env: &'a mut dyn HookEnvironment,
    pub(crate) packages: &'a dyn PackageManager,
    pub(crate) services: &'a dyn ServiceManager,
    pub(crate) catalog: &'a dyn ServiceCatalog,
    pub(crate) paths: Paths,
}
