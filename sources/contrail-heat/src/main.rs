#![deny(unused_imports)]

/*!
contrail-heat installs the Contrail resources for OpenStack Heat and points heat at the Contrail
controller.

It handles three events:

* `install` installs the `contrail-heat` package.
* `contrail-controller-relation-changed` records the controller's address and identity service,
  copies the Contrail resources into heat's plugin directory, and patches `/etc/heat/heat.conf`
  with the plugin directory and the `[clients_contrail]` credentials.
* `contrail-controller-relation-departed` reports the missing controller once the last unit is
  gone.

Any other event is logged and skipped.
*/

mod error;
mod heat;
#[cfg(test)]
mod main_test;

use crate::error::Result;
use crate::heat::{HookContext, Paths};
use argh::FromArgs;
use hookenv::apt::Apt;
use hookenv::host::Systemd;
use hookenv::juju::JujuHookTools;
use hookenv::{config, hook, PersistentConfig};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::fmt;
use std::process;

/// Handles lifecycle events for the Contrail Heat charm.
#[derive(FromArgs, Debug)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,
    /// the event to handle, instead of detecting it
    #[argh(option)]
    hook: Option<String>,
}

/// An event delivered by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Hook {
    Install,
    ControllerChanged,
    ControllerDeparted,
    Unknown(String),
}

impl Hook {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "install" => Hook::Install,
            "contrail-controller-relation-changed" => Hook::ControllerChanged,
            "contrail-controller-relation-departed" => Hook::ControllerDeparted,
            other => Hook::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Install => write!(f, "install"),
            Hook::ControllerChanged => write!(f, "contrail-controller-relation-changed"),
            Hook::ControllerDeparted => write!(f, "contrail-controller-relation-departed"),
            Hook::Unknown(name) => write!(f, "{}", name),
        }
    }
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

    let mut ctx = HookContext {
        config: &mut config,
        env: &mut tools,
        packages: &Apt,
        services: &Systemd,
        paths: Paths::default(),
    };
    main_inner(&hook, &mut ctx)
}

/// Handles one event and saves the store.  pub(crate) for testing.
pub(crate) fn main_inner(hook: &Hook, ctx: &mut HookContext<'_>) -> Result<()> {
    heat::dispatch(hook, ctx)?;
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hook_names() {
        assert_eq!(Hook::from_name("install"), Hook::Install);
        assert_eq!(
            Hook::from_name("contrail-controller-relation-departed"),
            Hook::ControllerDeparted
        );
        assert_eq!(
            Hook::from_name("contrail-controller-relation-joined"),
            Hook::Unknown("contrail-controller-relation-joined".to_string())
        );
        assert_eq!(
            Hook::from_name("contrail-controller-relation-changed").to_string(),
            "contrail-controller-relation-changed"
        );
    }
}
