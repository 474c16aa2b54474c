//! The inbound AMI event shape.
//!
//! Events arrive already parsed into a flat string-to-string mapping; the
//! AMI transport (TCP connection, framing, authentication) is a separate
//! concern this crate never touches. `AmiEvent` is a thin wrapper around
//! that mapping with typed accessors for the fields the dispatch logic
//! actually reads.

use std::collections::HashMap;
use std::fmt;

/// A single AMI event, keyed by its field names (`Event`, `Channel`,
/// `Uniqueid`, ...).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmiEvent {
    fields: HashMap<String, String>,
}

impl AmiEvent {
    pub fn new(fields: HashMap<String, String>) -> Self {
        AmiEvent { fields }
    }

    /// Look up a field by name, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The `Event` field, e.g. `"Newchannel"`.
    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    /// Look up a field that the event's own `Event` type guarantees is
    /// present. A missing field here means the upstream transport handed
    /// us a malformed event — a contract violation, not a recoverable
    /// `ManagerError`.
    pub fn require(&self, key: &str) -> &str {
        self.get(key).unwrap_or_else(|| {
            panic!("event {:?} is missing required field {:?}", self.event_name(), key)
        })
    }

    /// Parse a required field as `ChannelState`'s underlying integer code.
    pub fn require_u8(&self, key: &str) -> u8 {
        self.require(key)
            .parse()
            .unwrap_or_else(|_| panic!("field {:?} is not a valid integer in event {:?}", key, self.event_name()))
    }

    /// `true` iff the named field contains the substring `"Allowed"` — used
    /// to read the public/private presentation flag out of
    /// `CID-CallingPres`.
    pub fn contains(&self, key: &str, needle: &str) -> bool {
        self.get(key).map(|v| v.contains(needle)).unwrap_or(false)
    }
}

impl FromIterator<(String, String)> for AmiEvent {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        AmiEvent { fields: iter.into_iter().collect() }
    }
}

impl fmt::Display for AmiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Message")?;
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, " {}={:?}", key, self.fields[key])?;
        }
        write!(f, ">")
    }
}

/// `SubEvent` on a `Dial` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialSubEvent {
    Begin,
    End,
}

impl DialSubEvent {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Begin" => Some(DialSubEvent::Begin),
            "End" => Some(DialSubEvent::End),
            _ => None,
        }
    }
}

/// `Bridgestate` on a `Bridge` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridgestate {
    Link,
    Unlink,
}

impl Bridgestate {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Link" => Some(Bridgestate::Link),
            "Unlink" => Some(Bridgestate::Unlink),
            _ => None,
        }
    }
}

/// `TransferType` on a `Transfer` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Attended,
    Blind,
}

impl TransferType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Attended" => Some(TransferType::Attended),
            "Blind" => Some(TransferType::Blind),
            _ => None,
        }
    }
}

/// Convenience constructor for tests and embedders assembling events from
/// string-pair literals.
#[macro_export]
macro_rules! ami_event {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::event::AmiEvent::new(
            [$(($key.to_string(), $value.to_string())),*]
                .into_iter()
                .collect()
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_and_field_lookup() {
        let event = ami_event! {
            "Event" => "Newstate",
            "Channel" => "SIP/trunk-0000000c",
            "ChannelState" => "4",
        };

        assert_eq!(event.event_name(), Some("Newstate"));
        assert_eq!(event.require_u8("ChannelState"), 4);
        assert_eq!(event.get("Missing"), None);
    }

    #[test]
    #[should_panic(expected = "missing required field")]
    fn require_panics_on_missing_field() {
        let event = ami_event! { "Event" => "Newstate" };
        event.require("Channel");
    }

    #[test]
    fn contains_checks_substring() {
        let event = ami_event! { "CID-CallingPres" => "1 (Presentation Allowed, Passed Screen)" };
        assert!(event.contains("CID-CallingPres", "Allowed"));
    }

    #[test]
    fn sub_event_and_transfer_type_parsing() {
        assert_eq!(DialSubEvent::parse("Begin"), Some(DialSubEvent::Begin));
        assert_eq!(DialSubEvent::parse("Bogus"), None);
        assert_eq!(Bridgestate::parse("Link"), Some(Bridgestate::Link));
        assert_eq!(TransferType::parse("Blind"), Some(TransferType::Blind));
    }
}
