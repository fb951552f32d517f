//! Provides the list of errors for `contrail-openstack`.

use snafu::Snafu;
use std::path::PathBuf;
use url::Url;

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

    #[snafu(display("Failed to update package index: {}", source))]
    PackageUpdate { source: hookenv::Error },

    #[snafu(display("Failed to upgrade packages: {}", source))]
    PackageUpgrade { source: hookenv::Error },

    #[snafu(display("Failed to install {:?}: {}", packages, source))]
    PackageInstall {
        packages: Vec<String>,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to restart '{}': {}", service, source))]
    ServiceRestart {
        service: String,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to copy '{}' to '{}': {}", from.display(), to.display(), source))]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to write '{}': {}", path.display(), source))]
    WriteConfigFile {
        path: PathBuf,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to query relation '{}': {}", relation, source))]
    RelationQuery {
        relation: String,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to set relation data on '{}': {}", relation, source))]
    RelationSet {
        relation: String,
        source: hookenv::Error,
    },

    #[snafu(display("Failed to access leader settings: {}", source))]
    Leadership { source: hookenv::Error },

    #[snafu(display("Failed to set unit status: {}", source))]
    Status { source: hookenv::Error },

    #[snafu(display("Failed to determine the unit's private address: {}", source))]
    PrivateAddress { source: hookenv::Error },

    #[snafu(display("Error serializing '{}': {}", what, source))]
    Serialize {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("Identity service address is unknown"))]
    MissingKeystone,

    #[snafu(display("Unable to parse URL {}: {}", url, source))]
    UrlParse {
        url: String,
        source: url::ParseError,
    },

    #[snafu(display("Endpoint URL {} has no host", url.as_str()))]
    UrlHost { url: Url },

    #[snafu(display("Error building HTTP client: {}", source))]
    HttpClient { source: reqwest::Error },

    #[snafu(display("Error sending HTTP request to {}: {}", url.as_str(), source))]
    HttpSend { url: Url, source: reqwest::Error },

    #[snafu(display("Error receiving HTTP response {}: {}", url.as_str(), source))]
    HttpResponse { url: Url, source: reqwest::Error },

    #[snafu(display("Unable to resolve '{}': {}", host, source))]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    #[snafu(display("'{}' did not resolve to any address", host))]
    NoAddress { host: String },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
