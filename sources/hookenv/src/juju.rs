//! Production implementation of the hook environment traits, over the runtime's hook tools.
//!
//! The hook tools are only on PATH while the runtime is executing a hook.

use crate::command;
use crate::config::ConfigMap;
use crate::error::{self, Result};
use crate::leadership::{LeaderSettings, Leadership};
use crate::relation::{RelationData, RelationId, RelationSettings, Relations};
use crate::status::{Status, UnitStatus};
use crate::unit::Unit;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;

/// Talks to the runtime through its hook tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct JujuHookTools;

impl JujuHookTools {
    pub fn new() -> Self {
        Self
    }

    /// Returns the charm options as the operator configured them.
    pub fn charm_config(&self) -> Result<ConfigMap> {
        let config: Option<ConfigMap> = json_command("config-get", &["--all", "--format=json"])?;
        Ok(config.unwrap_or_default())
    }
}

/// Runs a hook tool that prints JSON and deserializes its output.
fn json_command<T>(bin: &str, args: &[&str]) -> Result<T>
where
    T: DeserializeOwned,
{
    let stdout = command::run(bin, args)?;
    serde_json::from_str(&stdout).context(error::CommandJsonSnafu {
        command: format!("{} {}", bin, args.join(" ")),
    })
}

fn relation_args<'a>(relation_id: Option<&'a str>) -> Vec<&'a str> {
    match relation_id {
        Some(id) => vec!["-r", id],
        None => Vec::new(),
    }
}

impl Relations for JujuHookTools {
    fn relation_ids(&self, relation_name: &str) -> Result<Vec<RelationId>> {
        let ids: Option<Vec<RelationId>> =
            json_command("relation-ids", &["--format=json", relation_name])?;
        Ok(ids.unwrap_or_default())
    }

    fn related_units(&self, relation_id: Option<&str>) -> Result<Vec<String>> {
        let mut args = vec!["--format=json"];
        args.extend(relation_args(relation_id));
        let units: Option<Vec<String>> = json_command("relation-list", &args)?;
        Ok(units.unwrap_or_default())
    }

    fn relation_get(&self, relation_id: Option<&str>, unit: Option<&str>) -> Result<RelationData> {
        let mut args = vec!["--format=json"];
        args.extend(relation_args(relation_id));
        // "-" asks for every key rather than a single one.
        args.push("-");
        if let Some(unit) = unit {
            args.push(unit);
        }
        let data: Option<RelationData> = json_command("relation-get", &args)?;
        let data = data.unwrap_or_default();
        trace!("Relation data: {:?}", data);
        Ok(data)
    }

    fn relation_set(
        &mut self,
        relation_id: Option<&str>,
        settings: &RelationSettings,
    ) -> Result<()> {
        if relation_id.is_none() {
            ensure!(
                std::env::var_os("JUJU_RELATION_ID").is_some(),
                error::NoRelationContextSnafu
            );
        }
        // An empty value unsets a key.
        let settings: BTreeMap<&String, &str> = settings
            .iter()
            .map(|(k, v)| (k, v.as_deref().unwrap_or("")))
            .collect();
        debug!(
            "Setting relation keys {:?} on {}",
            settings.keys(),
            relation_id.unwrap_or("current relation")
        );
        // Settings go through stdin so credentials stay off the command line.  JSON is valid
        // YAML, which is what the tool expects.
        let input = serde_json::to_vec(&settings).context(error::SettingsSerializeSnafu)?;
        let mut args = relation_args(relation_id);
        args.extend(["--file", "-"]);
        command::run_with_stdin("relation-set", &args, &input)?;
        Ok(())
    }
}

impl Leadership for JujuHookTools {
    fn is_leader(&self) -> Result<bool> {
        json_command("is-leader", &["--format=json"])
    }

    fn leader_get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = json_command("leader-get", &["--format=json", key])?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn leader_set(&mut self, settings: &LeaderSettings) -> Result<()> {
        debug!("Setting leader keys {:?}", settings.keys());
        let args: Vec<String> = settings
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.as_deref().unwrap_or("")))
            .collect();
        command::run("leader-set", &args)?;
        Ok(())
    }
}

impl UnitStatus for JujuHookTools {
    fn status_set(&mut self, status: &Status) -> Result<()> {
        debug!("Status {}: {}", status.state, status.message);
        command::run(
            "status-set",
            [status.state.to_string().as_str(), status.message.as_str()],
        )?;
        Ok(())
    }

    fn application_version_set(&mut self, version: &str) -> Result<()> {
        command::run("application-version-set", [version])?;
        Ok(())
    }
}

impl Unit for JujuHookTools {
    fn private_address(&self) -> Result<String> {
        let address = command::run("unit-get", ["private-address"])?;
        let address = address.trim();
        ensure!(!address.is_empty(), error::MissingPrivateAddressSnafu);
        Ok(address.to_string())
    }
}
