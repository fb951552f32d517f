//! The unit's configuration store.
//!
//! The store is a flat map of string keys to JSON values.  It starts out as the charm options the
//! runtime reports, and handlers add derived keys of their own (like the controller address
//! learned from a relation).  Derived keys survive between hook invocations because the store is
//! persisted to a file in the charm directory; charm options always win over persisted values of
//! the same key, since the operator may have changed them.

use crate::error::{self, Result};
use crate::host;
use log::{debug, trace};
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A JSON object, the in-memory form of the store.
pub type ConfigMap = Map<String, Value>;

/// Name of the persisted store inside the charm directory.
pub const PERSISTENT_CONFIG_NAME: &str = ".juju-persistent-config";

// The store can hold credentials copied from relations.
const PERSISTENT_CONFIG_MODE: u32 = 0o600;

/// Key/value configuration store for a unit.  Read at handler entry, mutated by the handler, and
/// persisted with `save`.
pub trait ConfigStore {
    /// Returns the value of `key`, if set.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Sets `key` to `value`, replacing any existing value.
    fn set(&mut self, key: &str, value: Value);

    /// Removes `key`, returning its old value.  Removing an unset key is not an error.
    fn remove(&mut self, key: &str) -> Option<Value>;

    /// Whether `key` differs from its value at the last save.  A store that has never been
    /// saved reports every key as changed.
    fn changed(&self, key: &str) -> bool;

    /// Persists the store.
    fn save(&mut self) -> Result<()>;

    /// Returns the value of `key` if it's a string.
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the value of `key` if it's a boolean.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }
}

/// Default location of the persisted store: `$CHARM_DIR/.juju-persistent-config`, or the
/// current directory if CHARM_DIR isn't set.
pub fn default_path() -> PathBuf {
    let charm_dir = env::var_os("CHARM_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    charm_dir.join(PERSISTENT_CONFIG_NAME)
}

/// A configuration store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct PersistentConfig {
    path: PathBuf,
    current: ConfigMap,
    // The store as of the last save; None if it has never been saved.
    previous: Option<ConfigMap>,
}

impl PersistentConfig {
    /// Builds the store from the charm options reported by the runtime and the persisted file at
    /// `path`, if one exists.
    pub fn load<P>(charm_options: ConfigMap, path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let previous = match fs::read_to_string(path) {
            Ok(data) => {
                let map: ConfigMap =
                    serde_json::from_str(&data).context(error::ConfigParseSnafu { path })?;
                Some(map)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No persisted config at '{}'", path.display());
                None
            }
            Err(e) => return Err(e).context(error::ConfigReadSnafu { path }),
        };
        Ok(Self::from_parts(charm_options, previous, path))
    }

    /// Builds the store from already-loaded parts.
    pub fn from_parts<P>(charm_options: ConfigMap, previous: Option<ConfigMap>, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        let mut current = charm_options;
        if let Some(previous) = &previous {
            for (key, value) in previous {
                if !current.contains_key(key) {
                    trace!("Carrying persisted key '{}'", key);
                    current.insert(key.clone(), value.clone());
                }
            }
        }
        Self {
            path: path.into(),
            current,
            previous,
        }
    }
}

impl ConfigStore for PersistentConfig {
    fn get(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.current.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.current.remove(key)
    }

    fn changed(&self, key: &str) -> bool {
        match &self.previous {
            None => true,
            Some(previous) => previous.get(key) != self.current.get(key),
        }
    }

    fn save(&mut self) -> Result<()> {
        debug!("Saving config store to '{}'", self.path.display());
        let data = serde_json::to_string_pretty(&self.current).context(error::ConfigSerializeSnafu)?;
        host::write_file_atomic(&self.path, data.as_bytes(), PERSISTENT_CONFIG_MODE)?;
        self.previous = Some(self.current.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn options(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn never_saved_reports_changed() {
        let dir = TempDir::new().unwrap();
        let config = PersistentConfig::load(
            options(json!({"install-sources": ""})),
            dir.path().join(PERSISTENT_CONFIG_NAME),
        )
        .unwrap();
        assert!(config.changed("install-sources"));
        assert!(config.changed("never-set"));
    }

    #[test]
    fn save_then_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PERSISTENT_CONFIG_NAME);

        let mut config =
            PersistentConfig::load(options(json!({"install-sources": "a"})), &path).unwrap();
        config.set("api_ip", json!("10.0.0.1"));
        config.save().unwrap();
        assert!(!config.changed("api_ip"));

        // Operator changed an option; the derived key comes back from disk.
        let config =
            PersistentConfig::load(options(json!({"install-sources": "b"})), &path).unwrap();
        assert_eq!(config.get_str("api_ip"), Some("10.0.0.1"));
        assert_eq!(config.get_str("install-sources"), Some("b"));
        assert!(config.changed("install-sources"));
        assert!(!config.changed("api_ip"));
    }

    #[test]
    fn removed_key_is_changed() {
        let mut config = PersistentConfig::from_parts(
            ConfigMap::new(),
            Some(options(json!({"api_port": "8082"}))),
            "/nonexistent",
        );
        assert!(!config.changed("api_port"));
        assert_eq!(config.remove("api_port"), Some(json!("8082")));
        assert!(config.changed("api_port"));
        assert_eq!(config.remove("api_port"), None);
    }

    #[test]
    fn options_win_over_persisted() {
        let config = PersistentConfig::from_parts(
            options(json!({"enable-metadata-server": false})),
            Some(options(json!({"enable-metadata-server": true}))),
            "/nonexistent",
        );
        assert_eq!(config.get_bool("enable-metadata-server"), Some(false));
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PERSISTENT_CONFIG_NAME);
        fs::write(&path, "[1, 2]").unwrap();
        assert!(PersistentConfig::load(ConfigMap::new(), &path).is_err());
    }
}
