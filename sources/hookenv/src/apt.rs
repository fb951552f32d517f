//! The system package manager.

use crate::command;
use crate::error::{self, Result};
use crate::host;
use log::{debug, info};
use serde_yaml::Value as YamlValue;
use snafu::{ensure, OptionExt, ResultExt};

const APT_GET_BIN: &str = "apt-get";
const APT_KEY_BIN: &str = "apt-key";
const ADD_APT_REPOSITORY_BIN: &str = "add-apt-repository";
const DPKG_QUERY_BIN: &str = "dpkg-query";
const KEYSERVER: &str = "hkp://keyserver.ubuntu.com:80";
const CLOUD_ARCHIVE_LIST: &str = "/etc/apt/sources.list.d/cloud-archive.list";
const CLOUD_ARCHIVE_URL: &str = "http://ubuntu-cloud.archive.canonical.com/ubuntu";
const CLOUD_ARCHIVE_KEYRING: &str = "ubuntu-cloud-keyring";

/// Options passed to apt when the caller gives none; keep existing config files on upgrade.
pub const DEFAULT_OPTIONS: &[&str] = &["--option=Dpkg::Options::=--force-confold"];

const APT_ENV: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// Installation and querying of system packages.  Every failure is fatal to the caller except
/// where noted.
pub trait PackageManager {
    /// Adds package sources, with their signing keys when given.  `keys`, if not empty, must be
    /// the same length as `sources`.
    fn add_sources(&self, sources: &[String], keys: &[String]) -> Result<()>;

    /// Refreshes the package index.
    fn update(&self) -> Result<()>;

    /// Upgrades installed packages; `dist` allows adding and removing packages to do so.
    fn upgrade(&self, dist: bool) -> Result<()>;

    /// Installs packages.  `options` replaces [`DEFAULT_OPTIONS`] when not empty.
    fn install(&self, packages: &[&str], options: &[&str]) -> Result<()>;

    /// Returns the installed version of a package.
    fn installed_version(&self, package: &str) -> Result<String>;
}

/// Manages packages with apt and dpkg.
#[derive(Debug, Clone, Copy, Default)]
pub struct Apt;

impl Apt {
    fn apt_get(&self, options: &[&str], args: &[&str]) -> Result<()> {
        let options = if options.is_empty() {
            DEFAULT_OPTIONS
        } else {
            options
        };
        let mut full_args = vec!["--assume-yes"];
        full_args.extend_from_slice(options);
        full_args.extend_from_slice(args);
        command::run_with_env(APT_GET_BIN, &full_args, APT_ENV)?;
        Ok(())
    }

    fn add_source(&self, source: &str) -> Result<()> {
        match SourceKind::classify(source) {
            SourceKind::Nothing => {
                debug!("Nothing to add for source '{}'", source);
                Ok(())
            }
            SourceKind::Repository => {
                info!("Adding repository '{}'", source);
                command::run(ADD_APT_REPOSITORY_BIN, ["--yes", source])?;
                Ok(())
            }
            SourceKind::CloudArchive(pocket) => {
                info!("Adding cloud archive '{}'", pocket);
                let line = cloud_archive_line(pocket)?;
                host::write_file_atomic(
                    CLOUD_ARCHIVE_LIST,
                    format!("{}\n", line).as_bytes(),
                    0o644,
                )?;
                self.install(&[CLOUD_ARCHIVE_KEYRING], &[])
            }
        }
    }

    fn add_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(());
        }
        if key.starts_with("-----BEGIN PGP") {
            debug!("Importing ASCII armoured key");
            command::run_with_stdin(APT_KEY_BIN, ["add", "-"], key.as_bytes())?;
        } else {
            debug!("Importing key '{}' from {}", key, KEYSERVER);
            command::run(
                APT_KEY_BIN,
                ["adv", "--keyserver", KEYSERVER, "--recv-keys", key],
            )?;
        }
        Ok(())
    }
}

impl PackageManager for Apt {
    fn add_sources(&self, sources: &[String], keys: &[String]) -> Result<()> {
        ensure!(
            keys.is_empty() || keys.len() == sources.len(),
            error::SourcesKeysMismatchSnafu {
                sources: sources.len(),
                keys: keys.len(),
            }
        );
        for (i, source) in sources.iter().enumerate() {
            self.add_source(source)?;
            if let Some(key) = keys.get(i) {
                self.add_key(key)?;
            }
        }
        Ok(())
    }

    fn update(&self) -> Result<()> {
        info!("Updating package index");
        command::run_with_env(APT_GET_BIN, ["update"], APT_ENV)?;
        Ok(())
    }

    fn upgrade(&self, dist: bool) -> Result<()> {
        let verb = if dist { "dist-upgrade" } else { "upgrade" };
        info!("Running apt-get {}", verb);
        self.apt_get(&[], &[verb])
    }

    fn install(&self, packages: &[&str], options: &[&str]) -> Result<()> {
        info!("Installing {:?}", packages);
        let mut args = vec!["install"];
        args.extend_from_slice(packages);
        self.apt_get(options, &args)
    }

    fn installed_version(&self, package: &str) -> Result<String> {
        let stdout = command::run(DPKG_QUERY_BIN, ["-f", "${Version}\\n", "-W", package])?;
        Ok(stdout.trim_end().to_string())
    }
}

#[derive(Debug, PartialEq)]
enum SourceKind<'a> {
    Nothing,
    Repository,
    CloudArchive(&'a str),
}

impl<'a> SourceKind<'a> {
    fn classify(source: &'a str) -> Self {
        let source = source.trim();
        if source.is_empty() || source == "distro" {
            SourceKind::Nothing
        } else if let Some(pocket) = source.strip_prefix("cloud:") {
            SourceKind::CloudArchive(pocket)
        } else {
            // ppa:, deb lines and bare URLs are all understood by add-apt-repository.
            SourceKind::Repository
        }
    }
}

/// Builds the sources.list line for a cloud archive pocket like "xenial-ocata" or
/// "xenial-ocata/proposed".
fn cloud_archive_line(pocket: &str) -> Result<String> {
    let (release, suffix) = match pocket.split_once('/') {
        Some((release, "proposed")) => (release, "proposed"),
        Some((release, "updates")) | Some((release, "")) => (release, "updates"),
        Some(_) => return error::CloudArchiveSnafu { pocket }.fail(),
        None => (pocket, "updates"),
    };
    let (series, openstack) = release
        .split_once('-')
        .context(error::CloudArchiveSnafu { pocket })?;
    ensure!(
        !series.is_empty() && !openstack.is_empty(),
        error::CloudArchiveSnafu { pocket }
    );
    Ok(format!(
        "deb {} {}-{}/{} main",
        CLOUD_ARCHIVE_URL, series, suffix, openstack
    ))
}

/// Reads a charm option holding a YAML string or list of strings, like `install-sources`.
/// An unset or empty option gives an empty list.
pub fn option_list(key: &str, raw: Option<&str>) -> Result<Vec<String>> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(Vec::new()),
    };
    let value: YamlValue = serde_yaml::from_str(raw).context(error::OptionYamlSnafu { key })?;
    match value {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::String(s) => Ok(vec![s]),
        YamlValue::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                YamlValue::String(s) => Ok(s),
                _ => error::OptionShapeSnafu { key }.fail(),
            })
            .collect(),
        _ => error::OptionShapeSnafu { key }.fail(),
    }
}

/// Adds the sources and keys named by two charm options, then refreshes the package index if
/// `update` is set.
pub fn configure_sources<P>(
    packages: &P,
    sources: Option<&str>,
    keys: Option<&str>,
    update: bool,
) -> Result<()>
where
    P: PackageManager + ?Sized,
{
    let sources = option_list("install-sources", sources)?;
    let keys = option_list("install-keys", keys)?;
    packages.add_sources(&sources, &keys)?;
    if update {
        packages.update()?;
    }
    Ok(())
}
