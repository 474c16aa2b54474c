//! Handle types used as edges in the channel graph.
//!
//! The channel graph has cycles: `prev`/`next` pairs, symmetric bridge
//! sets, dial relationships. Rust has no cycle-collecting GC, so channels
//! are values owned by a single arena (`ChannelManager::channels`) and
//! every cross-channel edge is one of these small, cheaply-clonable
//! handles rather than a reference.

use std::fmt;
use std::sync::Arc;

/// Stable identifier assigned by Asterisk at `Newchannel`, immutable for
/// the channel's lifetime. Used as the arena key and as every graph edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uniqueid(Arc<str>);

impl Uniqueid {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Uniqueid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uniqueid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uniqueid {
    fn from(value: &str) -> Self {
        Uniqueid(Arc::from(value))
    }
}

impl From<String> for Uniqueid {
    fn from(value: String) -> Self {
        Uniqueid(Arc::from(value.as_str()))
    }
}

/// The Asterisk channel name, e.g. `SIP/trunk-0000000c`. Unlike `Uniqueid`
/// this can change at any time via `Rename` or `Masquerade`, which is why
/// it is kept as a secondary index rather than the arena key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(Arc<str>);

impl ChannelName {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        ChannelName(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Channels named `SIP/...` that have not been zombified are the only
    /// ones that participate in user-visible events.
    pub fn is_relevant(&self) -> bool {
        self.0.starts_with("SIP/") && !self.0.ends_with("<ZOMBIE>")
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(value: &str) -> Self {
        ChannelName(Arc::from(value))
    }
}

impl From<String> for ChannelName {
    fn from(value: String) -> Self {
        ChannelName(Arc::from(value.as_str()))
    }
}
