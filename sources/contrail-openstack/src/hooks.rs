//! The events this agent handles.

use std::fmt;

pub(crate) const CONTROLLER_RELATION: &str = "contrail-controller";

/// The services this agent hands configuration to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Downstream {
    NovaCompute,
    NeutronApi,
    HeatPlugin,
}

impl Downstream {
    pub(crate) const ALL: [Downstream; 3] = [
        Downstream::NovaCompute,
        Downstream::NeutronApi,
        Downstream::HeatPlugin,
    ];

    pub(crate) fn relation_name(self) -> &'static str {
        match self {
            Downstream::NovaCompute => "nova-compute",
            Downstream::NeutronApi => "neutron-api",
            Downstream::HeatPlugin => "heat-plugin",
        }
    }

    fn from_relation_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.relation_name() == name)
    }
}

/// An event delivered by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Hook {
    Install,
    ConfigChanged,
    LeaderElected,
    LeaderSettingsChanged,
    UpdateStatus,
    ControllerJoined,
    ControllerChanged,
    ControllerDeparted,
    /// A downstream service joined, or changed its side of the relation.
    DownstreamJoined(Downstream),
    /// An event this agent has no handler for.
    Unknown(String),
}

impl Hook {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "install" => return Hook::Install,
            "config-changed" => return Hook::ConfigChanged,
            "leader-elected" => return Hook::LeaderElected,
            "leader-settings-changed" => return Hook::LeaderSettingsChanged,
            "update-status" => return Hook::UpdateStatus,
            _ => {}
        }

        if let Some((relation, event)) = name.split_once("-relation-") {
            if relation == CONTROLLER_RELATION {
                match event {
                    "joined" => return Hook::ControllerJoined,
                    "changed" => return Hook::ControllerChanged,
                    "departed" => return Hook::ControllerDeparted,
                    _ => {}
                }
            } else if let Some(downstream) = Downstream::from_relation_name(relation) {
                if event == "joined" || event == "changed" {
                    return Hook::DownstreamJoined(downstream);
                }
            }
        }
        Hook::Unknown(name.to_string())
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Install => write!(f, "install"),
            Hook::ConfigChanged => write!(f, "config-changed"),
            Hook::LeaderElected => write!(f, "leader-elected"),
            Hook::LeaderSettingsChanged => write!(f, "leader-settings-changed"),
            Hook::UpdateStatus => write!(f, "update-status"),
            Hook::ControllerJoined => write!(f, "{}-relation-joined", CONTROLLER_RELATION),
            Hook::ControllerChanged => write!(f, "{}-relation-changed", CONTROLLER_RELATION),
            Hook::ControllerDeparted => write!(f, "{}-relation-departed", CONTROLLER_RELATION),
            Hook::DownstreamJoined(d) => write!(f, "{}-relation-joined", d.relation_name()),
            Hook::Unknown(name) => write!(f, "{}", name),
        }
    }
}
