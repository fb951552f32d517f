//! In-memory hook environment for use in testing handlers.
//!
//! Mimics the decisions made by the runtime, e.g. an empty value in relation or leader settings
//! unsets the key.  The package and service managers only record what they were asked to do.

use crate::apt::PackageManager;
use crate::config::{ConfigMap, ConfigStore};
use crate::error::{self, Result};
use crate::host::ServiceManager;
use crate::leadership::{LeaderSettings, Leadership};
use crate::relation::{RelationData, RelationId, RelationSettings, Relations};
use crate::status::{Status, UnitStatus};
use crate::unit::Unit;
use serde_json::Value;
use snafu::{ensure, OptionExt};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Configuration store kept in memory; `save` only snapshots it.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
    current: ConfigMap,
    previous: Option<ConfigMap>,
    /// Number of times `save` was called.
    pub saves: usize,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a store from a JSON object; anything else gives an empty store.
    pub fn from_value(value: Value) -> Self {
        let current = match value {
            Value::Object(map) => map,
            _ => ConfigMap::new(),
        };
        Self {
            current,
            ..Default::default()
        }
    }
}

impl ConfigStore for MemoryConfig {
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
        self.previous = Some(self.current.clone());
        self.saves += 1;
        Ok(())
    }
}

/// Relations, leadership and status kept in memory.
#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
    // Relation name -> ids of its established relations.
    relations: BTreeMap<String, Vec<RelationId>>,
    // Relation id -> joined remote units.
    units: BTreeMap<RelationId, Vec<String>>,
    // Relation id -> settings published by the remote side.
    remote_data: BTreeMap<RelationId, RelationData>,
    // Relation id -> settings this unit has published.
    local_data: BTreeMap<RelationId, BTreeMap<String, String>>,
    /// Every `relation_set` call, in order.
    pub relation_sets: Vec<(RelationId, RelationSettings)>,
    /// The relation of the event being handled, if it's a relation event.
    pub current_relation: Option<RelationId>,
    pub leader: bool,
    leader_settings: BTreeMap<String, String>,
    /// Every reported status, in order.
    pub statuses: Vec<Status>,
    pub application_version: Option<String>,
    pub private_address: String,
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self {
            relations: BTreeMap::new(),
            units: BTreeMap::new(),
            remote_data: BTreeMap::new(),
            local_data: BTreeMap::new(),
            relation_sets: Vec::new(),
            current_relation: None,
            leader: false,
            leader_settings: BTreeMap::new(),
            statuses: Vec::new(),
            application_version: None,
            private_address: "10.0.0.10".to_string(),
        }
    }
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Default::default()
    }

    /// Establishes a relation with the given remote units.
    pub fn add_relation<S>(&mut self, relation_name: &str, relation_id: &str, units: &[S])
    where
        S: AsRef<str>,
    {
        self.relations
            .entry(relation_name.to_string())
            .or_default()
            .push(relation_id.to_string());
        self.units.insert(
            relation_id.to_string(),
            units.iter().map(|u| u.as_ref().to_string()).collect(),
        );
    }

    /// Removes every remote unit from a relation, as after the last unit departs.
    pub fn depart_all(&mut self, relation_id: &str) {
        self.units.insert(relation_id.to_string(), Vec::new());
    }

    /// Sets what the remote side of a relation has published.
    pub fn set_remote_data(&mut self, relation_id: &str, data: RelationData) {
        self.remote_data.insert(relation_id.to_string(), data);
    }

    /// Returns what this unit has published on a relation.
    pub fn local_data(&self, relation_id: &str) -> BTreeMap<String, String> {
        self.local_data.get(relation_id).cloned().unwrap_or_default()
    }

    /// Returns a leader setting without going through the trait's Result.
    pub fn leader_setting(&self, key: &str) -> Option<&str> {
        self.leader_settings.get(key).map(String::as_str)
    }

    pub fn last_status(&self) -> Option<&Status> {
        self.statuses.last()
    }

    fn relation_or_current(&self, relation_id: Option<&str>) -> Result<RelationId> {
        relation_id
            .map(str::to_string)
            .or_else(|| self.current_relation.clone())
            .context(error::NoRelationContextSnafu)
    }
}

impl Relations for MemoryEnvironment {
    fn relation_ids(&self, relation_name: &str) -> Result<Vec<RelationId>> {
        Ok(self.relations.get(relation_name).cloned().unwrap_or_default())
    }

    fn related_units(&self, relation_id: Option<&str>) -> Result<Vec<String>> {
        let relation_id = self.relation_or_current(relation_id)?;
        Ok(self.units.get(&relation_id).cloned().unwrap_or_default())
    }

    fn relation_get(&self, relation_id: Option<&str>, _unit: Option<&str>) -> Result<RelationData> {
        let relation_id = self.relation_or_current(relation_id)?;
        Ok(self.remote_data.get(&relation_id).cloned().unwrap_or_default())
    }

    fn relation_set(
        &mut self,
        relation_id: Option<&str>,
        settings: &RelationSettings,
    ) -> Result<()> {
        let relation_id = self.relation_or_current(relation_id)?;
        let local = self.local_data.entry(relation_id.clone()).or_default();
        for (key, value) in settings {
            match value.as_deref() {
                None | Some("") => local.remove(key),
                Some(value) => local.insert(key.clone(), value.to_string()),
            };
        }
        self.relation_sets.push((relation_id, settings.clone()));
        Ok(())
    }
}

impl Leadership for MemoryEnvironment {
    fn is_leader(&self) -> Result<bool> {
        Ok(self.leader)
    }

    fn leader_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.leader_settings.get(key).cloned())
    }

    fn leader_set(&mut self, settings: &LeaderSettings) -> Result<()> {
        for (key, value) in settings {
            match value.as_deref() {
                None | Some("") => self.leader_settings.remove(key),
                Some(value) => self.leader_settings.insert(key.clone(), value.to_string()),
            };
        }
        Ok(())
    }
}

impl UnitStatus for MemoryEnvironment {
    fn status_set(&mut self, status: &Status) -> Result<()> {
        self.statuses.push(status.clone());
        Ok(())
    }

    fn application_version_set(&mut self, version: &str) -> Result<()> {
        self.application_version = Some(version.to_string());
        Ok(())
    }
}

impl Unit for MemoryEnvironment {
    fn private_address(&self) -> Result<String> {
        Ok(self.private_address.clone())
    }
}

/// Package manager that records each request as a line of text, e.g. "install contrail-heat".
#[derive(Debug, Default)]
pub struct MemoryPackages {
    pub calls: RefCell<Vec<String>>,
    /// Installed package versions; packages not listed fail the version query.
    pub versions: BTreeMap<String, String>,
    /// Makes `install` fail after recording the call.
    pub fail_install: bool,
    /// Makes `upgrade` fail after recording the call.
    pub fail_upgrade: bool,
}

impl MemoryPackages {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn outcome(&self, fail: bool, command: &str) -> Result<()> {
        ensure!(
            !fail,
            error::CommandFailureSnafu {
                command: format!("apt-get {}", command),
                stderr: "E: Sub-process /usr/bin/dpkg returned an error code (1)",
            }
        );
        Ok(())
    }
}

impl PackageManager for MemoryPackages {
    fn add_sources(&self, sources: &[String], keys: &[String]) -> Result<()> {
        self.record(format!("add-sources {:?} {:?}", sources, keys));
        Ok(())
    }

    fn update(&self) -> Result<()> {
        self.record("update".to_string());
        Ok(())
    }

    fn upgrade(&self, dist: bool) -> Result<()> {
        let verb = if dist { "dist-upgrade" } else { "upgrade" };
        self.record(verb.to_string());
        self.outcome(self.fail_upgrade, verb)
    }

    fn install(&self, packages: &[&str], options: &[&str]) -> Result<()> {
        let mut call = format!("install {}", packages.join(" "));
        if !options.is_empty() {
            call.push_str(&format!(" {:?}", options));
        }
        self.record(call);
        self.outcome(self.fail_install, "install")
    }

    fn installed_version(&self, package: &str) -> Result<String> {
        self.versions
            .get(package)
            .cloned()
            .context(error::CommandFailureSnafu {
                command: format!("dpkg-query -W {}", package),
                stderr: format!("dpkg-query: no packages found matching {}", package),
            })
    }
}

/// Service manager that records restarts.
#[derive(Debug, Default)]
pub struct MemoryServices {
    pub restarted: RefCell<Vec<String>>,
}

impl MemoryServices {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn restarted(&self) -> Vec<String> {
        self.restarted.borrow().clone()
    }
}

impl ServiceManager for MemoryServices {
    fn restart(&self, service: &str) -> Result<()> {
        self.restarted.borrow_mut().push(service.to_string());
        Ok(())
    }
}
