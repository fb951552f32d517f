#![deny(unused_imports)]

/*!
# Introduction

contrail-openstack connects an OpenStack cloud to a Contrail controller.  The runtime runs it once
per lifecycle event, under the name of the event (`hooks/install`, `hooks/config-changed`, ...).

# What it does

* Learns the controller's address, API port, identity service and auth mode from the
  `contrail-controller` relation and keeps them in the unit's configuration store.
* Writes the Contrail client configuration for this unit: the Neutron plugin's
  `/etc/neutron/plugins/opencontrail/ContrailPlugin.ini` and `/etc/contrail/vnc_api_lib.ini`.
* Hands Contrail configuration to nova-compute, neutron-api and heat over their relations, and
  re-sends it whenever something upstream changes so they converge on current settings.
* On the leader, manages the Nova metadata shared secret and tells the controller about this
  cloud, including the addresses of the compute, image and network services.

# Usage

```
contrail-openstack [--log-level info] [--hook <name>]
```

The event is taken from `--hook`, then `JUJU_HOOK_NAME`, then the name the program was invoked
as.  Events without a handler are logged and skipped.
*/

mod client_config;
mod context;
mod error;
mod handlers;
mod hooks;
#[cfg(test)]
mod main_test;
mod payload;
mod reconcile;
mod service_ips;

use crate::context::{HookContext, Paths};
use crate::error::Result;
use crate::hooks::Hook;
use crate::service_ips::KeystoneCatalog;
use argh::FromArgs;
use hookenv::apt::Apt;
use hookenv::host::Systemd;
use hookenv::juju::JujuHookTools;
use hookenv::{config, hook, PersistentConfig};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::env;
use std::path::PathBuf;
use std::process;

/// Handles lifecycle events for the Contrail OpenStack charm.
#[derive(FromArgs, Debug)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,
    /// the event to handle, instead of detecting it
    #[argh(option)]
    hook: Option<String>,
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();
    SimpleLogger::init(args.log_level, LogConfig::default()).context(error::LoggerSnafu)?;

    let hook_name = hook::hook_name(args.hook.as_deref()).context(error::HookNameSnafu)?;
    let hook = Hook::from_name(&hook_name);

    let mut tools = JujuHookTools::new();
    let charm_options = tools.charm_config().context(error::CharmConfigSnafu)?;
    let mut config = PersistentConfig::load(charm_options, config::default_path())
        .context(error::LoadConfigSnafu)?;
    let charm_dir = env::var_os("CHARM_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let catalog = KeystoneCatalog::default();

    let mut ctx = HookContext {
        config: &mut config,
        env: &mut tools,
        packages: &Apt,
        services: &Systemd,
        catalog: &catalog,
        paths: Paths::new(charm_dir),
    };
    main_inner(&hook, &mut ctx)
}

/// Handles one event and saves the store.  pub(crate) for testing.
pub(crate) fn main_inner(hook: &Hook, ctx: &mut HookContext<'_>) -> Result<()> {
    handlers::dispatch(hook, ctx)?;
    ctx.config.save().context(error::SaveConfigSnafu)
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}
