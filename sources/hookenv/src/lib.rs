/*!
# Background

hookenv is the shared plumbing for the Contrail charm agents.

A charm agent is a short-lived program that the orchestration runtime (Juju) runs once per
lifecycle event: install, configuration change, relation joined/changed/departed, leader
election, and so on.  The runtime owns everything that outlives a single invocation: the charm
options, the relation data exchanged with other units, and the leader settings.  The agent reads
that state through a small set of "hook tools" (`config-get`, `relation-get`, `leader-get`, ...)
and writes back through their counterparts.

# Library

This library wraps those hook tools behind traits so that handlers can be written against an
interface and tested with the in-memory doubles in [`memory`]:

* [`ConfigStore`] - the persistent key/value configuration store of a unit.
* [`Relations`], [`Leadership`], [`UnitStatus`], [`Unit`] - relation data, leader settings,
  workload status, and unit facts.  [`HookEnvironment`] bundles them.
* [`PackageManager`] and [`ServiceManager`] - the system package manager and init system.

[`juju::JujuHookTools`], [`apt::Apt`] and [`host::Systemd`] are the production
implementations.

[`contrail`] reads back the controller facts both agents keep in the store, and the [`ini`]
module holds the configuration file writer used to patch service configuration
files without clobbering content the agent doesn't own.
*/

pub mod apt;
pub mod command;
pub mod config;
pub mod contrail;
pub mod error;
pub mod hook;
pub mod host;
pub mod ini;
pub mod juju;
pub mod leadership;
pub mod memory;
pub mod relation;
pub mod status;
pub mod unit;

pub use apt::PackageManager;
pub use config::{ConfigStore, PersistentConfig};
pub use error::{Error, Result};
pub use host::ServiceManager;
pub use leadership::Leadership;
pub use relation::{RelationData, RelationId, RelationSettings, Relations};
pub use status::{Status, UnitStatus, WorkloadState};
pub use unit::Unit;

/// Everything a handler needs from the runtime, as a single trait object.
pub trait HookEnvironment: Relations + Leadership + UnitStatus + Unit {}

impl<T> HookEnvironment for T where T: Relations + Leadership + UnitStatus + Unit {}
