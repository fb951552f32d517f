//! Working out which event an agent was invoked for.
//!
//! The runtime runs a file named after the event (`hooks/install`, `hooks/config-changed`, ...),
//! usually a symlink to the agent binary, and also exports the name in `JUJU_HOOK_NAME`.  An
//! explicit `--hook` argument overrides both, which is handy when running an agent by hand.

use crate::error::{self, Result};
use log::debug;
use snafu::OptionExt;
use std::env;
use std::path::Path;

/// Environment variable the runtime sets to the name of the running hook.
pub const HOOK_NAME_ENV: &str = "JUJU_HOOK_NAME";

// Some charms install a wrapper as `hooks/install` that execs `hooks/install.real`.
const WRAPPED_SUFFIX: &str = ".real";

/// Returns the name of the event being handled, from `flag` if given, then the environment, then
/// the name the process was invoked as.
pub fn hook_name(flag: Option<&str>) -> Result<String> {
    let from_env = env::var(HOOK_NAME_ENV).ok();
    let argv0 = env::args_os().next().unwrap_or_default();
    resolve(flag, from_env.as_deref(), Path::new(&argv0))
}

fn resolve(flag: Option<&str>, from_env: Option<&str>, argv0: &Path) -> Result<String> {
    if let Some(name) = flag.filter(|n| !n.is_empty()) {
        debug!("Hook name '{}' given on the command line", name);
        return Ok(name.to_string());
    }
    if let Some(name) = from_env.filter(|n| !n.is_empty()) {
        debug!("Hook name '{}' from {}", name, HOOK_NAME_ENV);
        return Ok(name.to_string());
    }

    let base = argv0
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .context(error::HookNameSnafu {
            arg: argv0.display().to_string(),
        })?;
    let name = base.strip_suffix(WRAPPED_SUFFIX).unwrap_or(base);
    debug!("Hook name '{}' from invocation path", name);
    Ok(name.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn precedence() {
        let argv0 = Path::new("/var/lib/juju/charm/hooks/install");
        assert_eq!(
            resolve(Some("update-status"), Some("config-changed"), argv0).unwrap(),
            "update-status"
        );
        assert_eq!(
            resolve(None, Some("config-changed"), argv0).unwrap(),
            "config-changed"
        );
        assert_eq!(resolve(None, None, argv0).unwrap(), "install");
        assert_eq!(resolve(Some(""), Some(""), argv0).unwrap(), "install");
    }

    #[test]
    fn wrapped_hook() {
        assert_eq!(
            resolve(None, None, Path::new("hooks/install.real")).unwrap(),
            "install"
        );
    }

    #[test]
    fn no_name() {
        assert!(resolve(None, None, Path::new("")).is_err());
        assert!(resolve(None, None, Path::new("/")).is_err());
    }
}
