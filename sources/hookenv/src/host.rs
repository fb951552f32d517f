//! Host-level helpers: service control and filesystem operations.

use crate::command;
use crate::error::{self, Result};
use log::{debug, info, trace};
use snafu::{ensure, ResultExt};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

const SYSTEMCTL_BIN: &str = "/bin/systemctl";

/// Control over system services.
pub trait ServiceManager {
    /// Restarts the named service.
    fn restart(&self, service: &str) -> Result<()>;
}

/// Manages services through systemd.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemd;

impl ServiceManager for Systemd {
    fn restart(&self, service: &str) -> Result<()> {
        info!("Restarting {}", service);
        command::run(SYSTEMCTL_BIN, ["restart", service])?;
        Ok(())
    }
}

/// Writes `contents` to `path` by way of a temporary file in the same directory, so a crash
/// mid-write never leaves a truncated file behind.  An existing file keeps its permissions; a new
/// one gets `default_mode`.
pub fn write_file_atomic<P>(path: P, contents: &[u8], default_mode: u32) -> Result<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = match fs::metadata(path) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => Permissions::from_mode(default_mode),
    };

    let mut temp_file = NamedTempFile::new_in(dir).context(error::CreateTempfileSnafu { dir })?;
    temp_file
        .write_all(contents)
        .context(error::TempfileWriteSnafu { path })?;
    fs::set_permissions(temp_file.path(), permissions)
        .context(error::SetPermissionsSnafu { path })?;

    trace!("Moving temporary file into place at '{}'", path.display());
    temp_file
        .persist(path)
        .context(error::PersistFileSnafu { path })?;
    Ok(())
}

/// Creates `path` and any missing parents.  An existing directory is fine; an existing
/// non-directory is an error.
pub fn ensure_directory<P>(path: P) -> Result<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            ensure!(path.is_dir(), error::NotADirectorySnafu { path });
            Ok(())
        }
        Err(e) => Err(e).context(error::CreateDirectorySnafu { path }),
    }
}

/// Recursively copies the directory `from` to `to`, which must not exist yet.
pub fn copy_tree<P1, P2>(from: P1, to: P2) -> Result<()>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let (from, to) = (from.as_ref(), to.as_ref());
    debug!("Copying '{}' to '{}'", from.display(), to.display());

    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.context(error::WalkDirectorySnafu { path: from })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .context(error::StripPrefixSnafu)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).context(error::CreateDirectorySnafu { path: &target })?;
        } else {
            trace!("Copying {}", entry.path().display());
            fs::copy(entry.path(), &target).context(error::CopyFileSnafu {
                from: entry.path(),
                to: &target,
            })?;
        }
    }
    Ok(())
}
