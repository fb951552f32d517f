//! Facts about the local unit.

use crate::error::Result;

pub trait Unit {
    /// The unit's private address, as other units in the model see it.
    fn private_address(&self) -> Result<String>;
}
