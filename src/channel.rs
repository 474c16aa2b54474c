//! Per-channel state and the graph edges used to resolve it.
//!
//! A `Channel` only ever touches its own fields; anything that needs to
//! look at other channels (rename bookkeeping, dial-graph traversal,
//! recognition rules) lives on `ChannelManager`, which owns the arena all
//! the handles below point into.

use std::fmt;

use strum_macros::Display;

use crate::caller_id::{CallerId, CallerIdOverrides};
use crate::ids::{ChannelName, Uniqueid};

/// Asterisk's `AST_STATE_*` channel state enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChannelState {
    Down,
    Reserved,
    OffHook,
    Dialing,
    Ring,
    Ringing,
    Up,
    Busy,
    DialingOffHook,
    PreRing,
}

impl ChannelState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChannelState::Down,
            1 => ChannelState::Reserved,
            2 => ChannelState::OffHook,
            3 => ChannelState::Dialing,
            4 => ChannelState::Ring,
            5 => ChannelState::Ringing,
            6 => ChannelState::Up,
            7 => ChannelState::Busy,
            8 => ChannelState::DialingOffHook,
            9 => ChannelState::PreRing,
            other => panic!("unknown Asterisk ChannelState code {other}"),
        }
    }
}

/// Cross-event signal a channel carries for itself: currently only a
/// pending blind-transfer marker, modeled as a tagged variant rather than a
/// free-form bag so the one thing ever stashed here stays exhaustively
/// checked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingPattern {
    #[default]
    None,
    /// Set by a `Transfer`/Blind event that arrived before the dial that
    /// completes it; consumed by the first B-dial resolved through this
    /// channel.
    BlindTransfer { from: Uniqueid },
}

/// Which dial-recognition hooks a state transition fired.
/// `Channel::set_state` only computes this signal; `ChannelManager` is the
/// one that actually runs the hooks, since they need the whole arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateTransition {
    pub fired_a_dial: bool,
    pub fired_b_dial: bool,
}

/// One tracked Asterisk channel.
#[derive(Debug, Clone)]
pub struct Channel {
    name: ChannelName,
    uniqueid: Uniqueid,
    state: ChannelState,
    callerid: CallerId,
    accountcode: String,
    exten: String,
    prev: Option<Uniqueid>,
    next: Option<Uniqueid>,
    bridged: std::collections::HashSet<Uniqueid>,
    pending: PendingPattern,
}

/// The fields of a `Newchannel` event needed to construct a `Channel`.
pub struct NewChannelFields<'a> {
    pub name: &'a str,
    pub uniqueid: &'a str,
    pub state_code: u8,
    pub account_code: &'a str,
    pub caller_id_name: &'a str,
    pub caller_id_num: &'a str,
    pub exten: &'a str,
}

impl Channel {
    /// Construct a channel from a `Newchannel` event.
    pub fn new(fields: NewChannelFields<'_>) -> Self {
        let callerid = if outbound_trunk_code(fields.name, fields.account_code).is_some() {
            // Outbound leg to a trunk: the nominal caller-id is wrong, the
            // real CLI is the dialed extension. `code` is re-derived from
            // `name` on every `callerid()` read below, so it is not needed
            // here.
            CallerId::new(0, "", fields.exten, false)
        } else {
            CallerId::new(
                fields.account_code.parse().unwrap_or(0),
                fields.caller_id_name,
                fields.caller_id_num,
                true,
            )
        };

        Channel {
            name: ChannelName::from(fields.name),
            uniqueid: Uniqueid::from(fields.uniqueid),
            state: ChannelState::from_code(fields.state_code),
            callerid,
            accountcode: fields.account_code.to_string(),
            exten: fields.exten.to_string(),
            prev: None,
            next: None,
            bridged: Default::default(),
            pending: PendingPattern::None,
        }
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn uniqueid(&self) -> &Uniqueid {
        &self.uniqueid
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn accountcode(&self) -> &str {
        &self.accountcode
    }

    pub fn exten(&self) -> &str {
        &self.exten
    }

    pub fn prev(&self) -> Option<&Uniqueid> {
        self.prev.as_ref()
    }

    pub fn next(&self) -> Option<&Uniqueid> {
        self.next.as_ref()
    }

    pub fn bridged(&self) -> &std::collections::HashSet<Uniqueid> {
        &self.bridged
    }

    pub fn is_bridged(&self) -> bool {
        !self.bridged.is_empty()
    }

    pub fn pending(&self) -> &PendingPattern {
        &self.pending
    }

    /// Channels named `SIP/...` that are not zombies participate in
    /// user-visible events.
    pub fn is_relevant(&self) -> bool {
        self.name.is_relevant()
    }

    /// The effective caller id: the stored value, unconditionally patched
    /// with a name-derived account code override on every read. This is
    /// what makes the reported account code track renames.
    pub fn callerid(&self) -> CallerId {
        if self.name.as_str().starts_with("SIP/") {
            match trunk_account_code_in_name(self.name.as_str()) {
                Some(code) => self.callerid.replace(CallerIdOverrides::default().code(code)),
                None => self.callerid.replace(CallerIdOverrides::default().code(0)),
            }
        } else {
            self.callerid.clone()
        }
    }

    /// Rename the channel. The caller (`ChannelManager`) is responsible for
    /// updating the `by_name` index.
    pub fn set_name(&mut self, name: impl Into<ChannelName>) {
        self.name = name.into();
    }

    /// Apply a `Newstate` event, returning which dial hooks fired.
    ///
    /// # Panics
    /// If the new state equals the old one (contract violation: Asterisk
    /// does not emit a no-op state change).
    pub fn set_state(&mut self, new_state: ChannelState) -> StateTransition {
        let old_state = self.state;
        assert!(old_state != new_state, "Newstate with no actual state change on {:?}", self.name);
        self.state = new_state;

        let mut transition = StateTransition::default();
        if old_state == ChannelState::Down {
            if matches!(new_state, ChannelState::Dialing | ChannelState::Ring | ChannelState::Up) {
                transition.fired_a_dial = true;
            }
            if matches!(new_state, ChannelState::Ringing | ChannelState::Up) {
                transition.fired_b_dial = true;
            }
        }
        transition
    }

    /// Apply a `NewCallerid` event. The account code is preserved; name,
    /// number and public-presentation are overwritten.
    pub fn set_callerid(&mut self, name: &str, number: &str, is_public: bool) {
        self.callerid = CallerId::new(self.callerid.code, name, number, is_public);
    }

    /// Apply a `NewAccountCode` event.
    pub fn set_accountcode(&mut self, accountcode: &str) {
        self.accountcode = accountcode.to_string();
    }

    /// Link `self` to `other` as the head of a two-channel local-bridge
    /// pair: `self.next = other`, `other.prev = self`.
    ///
    /// # Panics
    /// If either channel already has a local link in either direction.
    pub fn do_localbridge(&mut self, other: &mut Channel) {
        assert!(self.next.is_none(), "do_localbridge: {:?} already has a next link", self.name);
        assert!(self.prev.is_none(), "do_localbridge: {:?} already has a prev link", self.name);
        assert!(other.next.is_none(), "do_localbridge: {:?} already has a next link", other.name);
        assert!(other.prev.is_none(), "do_localbridge: {:?} already has a prev link", other.name);

        self.next = Some(other.uniqueid.clone());
        other.prev = Some(self.uniqueid.clone());
    }

    /// Add `other` to `self.bridged` (the symmetric half is applied by the
    /// caller on `other`).
    pub fn link(&mut self, other: Uniqueid) {
        self.bridged.insert(other);
    }

    /// Remove `other` from `self.bridged`.
    pub fn unlink(&mut self, other: &Uniqueid) {
        self.bridged.remove(other);
    }

    /// Sever local links and clear pending state on hangup. Only clears
    /// this channel's own `prev`/`next`; the caller (`ChannelManager`) is
    /// responsible for clearing the reciprocal back-pointer on whichever
    /// local-bridge peer still points here.
    ///
    /// # Panics
    /// If the channel is still bridged to anyone — a hung-up channel must
    /// have been unlinked from every peer first.
    pub fn do_hangup(&mut self) {
        self.prev = None;
        self.next = None;
        assert!(self.bridged.is_empty(), "do_hangup: {:?} still bridged to {:?}", self.name, self.bridged);
        self.pending = PendingPattern::None;
    }

    /// Discard `self`'s local links, then transplant `other`'s onto self,
    /// and move `other`'s pending pattern onto self. `bridged` sets are
    /// left untouched on both sides: Asterisk's own masquerade copies
    /// properties but leaves bridge membership, and any stale bridge on the
    /// clone is cleaned up when the clone itself is later hung up. Returns
    /// the far-end uniqueids whose back-pointer now needs to be rewritten to
    /// point at `self` instead of `other` — `ChannelManager` applies those,
    /// since a lone `Channel` cannot reach into the arena.
    pub fn do_masquerade(&mut self, other: &mut Channel) -> MasqueradeRewrites {
        let discarded_next = self.next.take();
        let discarded_prev = self.prev.take();

        self.next = other.next.take();
        self.prev = other.prev.take();

        self.pending = std::mem::take(&mut other.pending);

        MasqueradeRewrites {
            discarded_next,
            discarded_prev,
            adopted_next: self.next.clone(),
            adopted_prev: self.prev.clone(),
            new_self: self.uniqueid.clone(),
        }
    }

    pub fn set_pending(&mut self, pending: PendingPattern) {
        self.pending = pending;
    }

    pub fn take_pending(&mut self) -> PendingPattern {
        std::mem::take(&mut self.pending)
    }

    /// Used by `ChannelManager` to rewrite a neighbor's back-pointer after
    /// a masquerade; a lone `Channel` has no reason to call this itself.
    pub fn set_prev(&mut self, prev: Option<Uniqueid>) {
        self.prev = prev;
    }

    pub fn set_next(&mut self, next: Option<Uniqueid>) {
        self.next = next;
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel({}, uniqueid={}, state={}, prev={:?}, next={:?}, accountcode={:?}, callerid={}, exten={:?})",
            self.name,
            self.uniqueid,
            self.state,
            self.prev,
            self.next,
            self.accountcode,
            self.callerid(),
            self.exten,
        )
    }
}

/// Far-end back-pointers that must be rewritten in the arena after a
/// masquerade, since `Channel::do_masquerade` can only see the two
/// channels directly involved.
#[derive(Debug, Clone)]
pub struct MasqueradeRewrites {
    pub discarded_next: Option<Uniqueid>,
    pub discarded_prev: Option<Uniqueid>,
    pub adopted_next: Option<Uniqueid>,
    pub adopted_prev: Option<Uniqueid>,
    pub new_self: Uniqueid,
}

/// Does `accountcode` (as read straight off the `Newchannel` event) mark
/// `name` as an outbound leg to a trunk? True when `accountcode` is exactly
/// 9 ASCII digits and `name` starts with `SIP/<accountcode>-`.
fn outbound_trunk_code(name: &str, accountcode: &str) -> Option<i64> {
    if accountcode.len() == 9 && accountcode.bytes().all(|b| b.is_ascii_digit()) {
        let prefix = format!("SIP/{accountcode}-");
        if name.starts_with(&prefix) {
            return accountcode.parse().ok();
        }
    }
    None
}

/// Does `name` itself currently look like `SIP/<9 digits>-...`? This is
/// re-checked on every `callerid()` read, independent of how the channel was
/// originally constructed — a rename or masquerade can change `name` at any
/// time.
fn trunk_account_code_in_name(name: &str) -> Option<i64> {
    let digits = name.get(4..13)?;
    let dash = name.get(13..14)?;
    if dash == "-" && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}
