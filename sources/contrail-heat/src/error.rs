//! Provides the list of errors for `contrail-heat`.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Logger setup error: {}", source))]
    Logger { source: log::SetLoggerError },

    #[snafu(display("Unable to determine the hook to run: {}", source))]
    HookName { source: hookenv::Error },

    #[snafu(display("Unable to read charm options: {}", source))]
    CharmConfig { source: hookenv::Error },

    #[snafu(display("Unable to load the configuration store: {}", source))]
    LoadConfig { source: hookenv::Error },

    #[snafu(display("Unable to save the configuration store: {}", source))]
    SaveConfig { source: hookenv::Error },

    #[snafu(display("Unable to configure package sources: {}", source))]
    ConfigureSources { source: hookenv::Error },

    #[snafu(display("Failed to upgrade packages: {}", source))]
    PackageUpgrade { source: hookenv::Error },

    #[snafu(display("Failed to install {:?}: {}", packages, source))]
    PackageInstall {
        packages: Vec<String>,
        source: hookenv::Error,
    },

    #[snafu(display("Unable to create heat plugin directory '{}': {}", path.display(), source))]
    PluginDirectory {
        path: PathBuf,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to copy Contrail resources to '{}': {}", path.display(), source))]
    CopyResources {
        path: PathBuf,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to update '{}': {}", path.display(), source))]
    HeatConf {
        path: PathBuf,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to restart '{}': {}", service, source))]
    ServiceRestart {
        service: String,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to query relation '{}': {}", relation, source))]
    RelationQuery {
        relation: String,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to set unit status: {}", source))]
    Status { source: hookenv::Error },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
