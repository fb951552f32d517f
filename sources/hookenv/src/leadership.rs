//! Leader election and leader settings.

use crate::error::Result;
use std::collections::BTreeMap;

/// Leader settings to write.  A `None` value clears the key.
pub type LeaderSettings = BTreeMap<String, Option<String>>;

/// Access to leadership state.  Only the leader may write leader settings; every unit may read
/// them.
pub trait Leadership {
    /// Whether this unit is the elected leader.
    fn is_leader(&self) -> Result<bool>;

    /// Returns the value of a leader setting, if set.
    fn leader_get(&self, key: &str) -> Result<Option<String>>;

    /// Writes leader settings.
    fn leader_set(&mut self, settings: &LeaderSettings) -> Result<()>;
}
