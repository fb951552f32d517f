//! Workload status reporting.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// The workload states a unit can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadState {
    Maintenance,
    Blocked,
    Waiting,
    Active,
}

serde_plain::derive_display_from_serialize!(WorkloadState);
serde_plain::derive_fromstr_from_deserialize!(WorkloadState);

/// A workload state plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: WorkloadState,
    pub message: String,
}

impl Status {
    pub fn new<S: Into<String>>(state: WorkloadState, message: S) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub fn maintenance<S: Into<String>>(message: S) -> Self {
        Self::new(WorkloadState::Maintenance, message)
    }

    pub fn blocked<S: Into<String>>(message: S) -> Self {
        Self::new(WorkloadState::Blocked, message)
    }

    pub fn active<S: Into<String>>(message: S) -> Self {
        Self::new(WorkloadState::Active, message)
    }
}

/// Reporting of the unit's status and workload version to the runtime.
pub trait UnitStatus {
    fn status_set(&mut self, status: &Status) -> Result<()>;

    /// Reports the version of the workload software, e.g. an installed package version.
    fn application_version_set(&mut self, version: &str) -> Result<()>;
}
