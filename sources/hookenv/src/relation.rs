//! Relation data exchanged with other units.

use crate::error::Result;
use std::collections::BTreeMap;

/// Identifies one established relation, e.g. "contrail-controller:7".
pub type RelationId = String;

/// Settings a remote unit published on a relation.
pub type RelationData = BTreeMap<String, String>;

/// Settings to publish on a relation.  A `None` value unsets the key.
pub type RelationSettings = BTreeMap<String, Option<String>>;

/// Access to the relations of this unit.
///
/// Methods that take an optional relation id or unit fall back to the relation and remote unit
/// of the event being handled.
pub trait Relations {
    /// Returns the ids of every established relation with the given name.
    fn relation_ids(&self, relation_name: &str) -> Result<Vec<RelationId>>;

    /// Returns the remote units currently joined on a relation.
    fn related_units(&self, relation_id: Option<&str>) -> Result<Vec<String>>;

    /// Returns the settings a remote unit published on a relation.
    fn relation_get(&self, relation_id: Option<&str>, unit: Option<&str>) -> Result<RelationData>;

    /// Publishes this unit's settings on a relation.
    fn relation_set(&mut self, relation_id: Option<&str>, settings: &RelationSettings)
        -> Result<()>;

    /// Returns the ids of the relations with the given name that have at least one remote unit.
    fn joined_relation_ids(&self, relation_name: &str) -> Result<Vec<RelationId>> {
        let mut joined = Vec::new();
        for relation_id in self.relation_ids(relation_name)? {
            if !self.related_units(Some(&relation_id))?.is_empty() {
                joined.push(relation_id);
            }
        }
        Ok(joined)
    }

    /// Whether any remote unit is still joined on any relation with the given name.
    fn any_related_units(&self, relation_name: &str) -> Result<bool> {
        Ok(!self.joined_relation_ids(relation_name)?.is_empty())
    }
}
