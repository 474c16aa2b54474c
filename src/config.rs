//! Runtime configuration for [`crate::manager::ChannelManager`].

use std::collections::HashSet;

/// The events `ChannelManager::on_event` actually dispatches on; anything
/// else is silently ignored before it ever reaches the reporter, as if the
/// upstream AMI feed had never forwarded it.
pub fn default_interesting_events() -> HashSet<&'static str> {
    [
        "FullyBooted",
        "Newchannel",
        "Newstate",
        "NewCallerid",
        "NewAccountCode",
        "LocalBridge",
        "Rename",
        "Bridge",
        "Dial",
        "Hangup",
        "Transfer",
        "Masquerade",
        "UserEvent",
    ]
    .into_iter()
    .collect()
}

/// Which events get dispatched.
#[derive(Debug, Clone)]
pub enum EventFilter {
    Only(HashSet<String>),
    All,
}

impl Default for EventFilter {
    fn default() -> Self {
        EventFilter::Only(default_interesting_events().into_iter().map(str::to_string).collect())
    }
}

impl EventFilter {
    pub fn allows(&self, event_name: &str) -> bool {
        match self {
            EventFilter::Only(set) => set.contains(event_name),
            EventFilter::All => true,
        }
    }

    pub fn wildcard() -> Self {
        EventFilter::All
    }
}

/// Tunables for a [`crate::manager::ChannelManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub event_filter: EventFilter,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig { event_filter: EventFilter::default() }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches every event the manager knows how to handle, not just the
    /// ones production deployments care about. Useful for exercising
    /// rarely-hit branches (`UserEvent`, `NewAccountCode`, ...) in tests.
    pub fn debug() -> Self {
        ManagerConfig { event_filter: EventFilter::wildcard() }
    }

    pub fn allows(&self, event_name: &str) -> bool {
        self.event_filter.allows(event_name)
    }
}
