//! Event dispatch, the channel arena, the dial graph, and the recognition
//! rules that turn channel-level mutations into call-level events.
//!
//! `ChannelManager` is the sole owner of every `Channel`; everything else
//! in this crate reaches a channel only through a `Uniqueid` handle looked
//! up here.

use std::collections::{HashMap, HashSet};

use crate::caller_id::CallerIdOverrides;
use crate::channel::{Channel, ChannelState, NewChannelFields, PendingPattern};
use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::event::{AmiEvent, Bridgestate, DialSubEvent, TransferType};
use crate::ids::{ChannelName, Uniqueid};
use crate::reporter::{NullReporter, Reporter};

/// Owns the channel arena, the name index, the dial graph, and drives
/// recognition of `on_b_dial` / `on_transfer` from the raw AMI stream.
pub struct ChannelManager<R: Reporter = NullReporter> {
    channels: HashMap<Uniqueid, Channel>,
    by_name: HashMap<ChannelName, Uniqueid>,
    dial_fwd: HashMap<Uniqueid, Vec<Uniqueid>>,
    dial_bck: HashMap<Uniqueid, Uniqueid>,
    config: ManagerConfig,
    reporter: R,
}

impl<R: Reporter> ChannelManager<R> {
    pub fn new(reporter: R) -> Self {
        Self::with_config(ManagerConfig::default(), reporter)
    }

    pub fn with_config(config: ManagerConfig, reporter: R) -> Self {
        ChannelManager {
            channels: HashMap::new(),
            by_name: HashMap::new(),
            dial_fwd: HashMap::new(),
            dial_bck: HashMap::new(),
            config,
            reporter,
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_by_uniqueid(&self, uniqueid: &Uniqueid) -> Option<&Channel> {
        self.channels.get(uniqueid)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.by_name.get(&ChannelName::from(name)).and_then(|uid| self.channels.get(uid))
    }

    /// Single entry point: trace the event, dispatch it, and echo it to the
    /// reporter regardless of dispatch outcome — but only for events the
    /// configured filter allows through in the first place. An event the
    /// filter rejects never reaches the reporter at all, exactly as if the
    /// upstream feed loop had never forwarded it.
    pub fn on_event(&mut self, event: &AmiEvent) {
        let name = match event.event_name() {
            Some(name) if self.config.allows(name) => name,
            _ => return,
        };

        self.reporter.trace_ami(event);

        if let Err(err) = self.dispatch(name, event) {
            self.reporter.trace_msg(&err.to_string());
        }

        self.reporter.on_event(event);
    }

    fn dispatch(&mut self, name: &str, event: &AmiEvent) -> ManagerResult<()> {
        match name {
            "FullyBooted" => {
                self.reporter.trace_msg("AMI connection established");
                Ok(())
            }
            "Newchannel" => self.handle_newchannel(event),
            "Newstate" => self.handle_newstate(event),
            "NewCallerid" => self.handle_newcallerid(event),
            "NewAccountCode" => self.handle_newaccountcode(event),
            "LocalBridge" => self.handle_localbridge(event),
            "Rename" => self.handle_rename(event),
            "Bridge" => self.handle_bridge(event),
            "Masquerade" => self.handle_masquerade(event),
            "Hangup" => self.handle_hangup(event),
            "Dial" => self.handle_dial(event),
            "Transfer" => self.handle_transfer(event),
            _ => Ok(()),
        }
    }

    // -- lookups -------------------------------------------------------

    fn channel(&self, uid: &Uniqueid) -> ManagerResult<&Channel> {
        self.channels.get(uid).ok_or_else(|| ManagerError::missing_uniqueid(uid.as_str()))
    }

    fn channel_mut(&mut self, uid: &Uniqueid) -> ManagerResult<&mut Channel> {
        self.channels.get_mut(uid).ok_or_else(|| ManagerError::missing_uniqueid(uid.as_str()))
    }

    fn uniqueid_by_name(&self, name: &str) -> ManagerResult<Uniqueid> {
        self.by_name
            .get(&ChannelName::from(name))
            .cloned()
            .ok_or_else(|| ManagerError::missing_channel("Channel", name))
    }

    fn require_uniqueid(&self, raw: &str) -> ManagerResult<Uniqueid> {
        let uid = Uniqueid::from(raw);
        if self.channels.contains_key(&uid) {
            Ok(uid)
        } else {
            Err(ManagerError::missing_uniqueid(raw))
        }
    }

    /// The single channel `uid` is currently bridged to. Lives here, not on
    /// `Channel`, since it has to resolve the peer handle through the
    /// arena.
    pub fn bridged_channel(&self, uid: &Uniqueid) -> ManagerResult<&Channel> {
        let channel = self.channel(uid)?;
        let mut peers = channel.bridged().iter();
        let only = peers
            .next()
            .ok_or_else(|| ManagerError::bridged_error(format!("{uid} is not bridged to any channel")))?;
        if peers.next().is_some() {
            return Err(ManagerError::bridged_error(format!("{uid} is bridged to more than one channel")));
        }
        self.channel(only)
    }

    // -- event handlers --------------------------------------------------

    fn handle_newchannel(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name = event.require("Channel");
        let uniqueid = event.require("Uniqueid");
        let state_code = event.require_u8("ChannelState");
        let account_code = event.get("AccountCode").unwrap_or("");
        let caller_id_name = event.get("CallerIDName").unwrap_or("");
        let caller_id_num = event.get("CallerIDNum").unwrap_or("");
        let exten = event.get("Exten").unwrap_or("");

        let channel = Channel::new(NewChannelFields {
            name,
            uniqueid,
            state_code,
            account_code,
            caller_id_name,
            caller_id_num,
            exten,
        });

        let uid = channel.uniqueid().clone();
        assert!(!self.channels.contains_key(&uid), "Newchannel with duplicate uniqueid {uid}");
        self.by_name.insert(channel.name().clone(), uid.clone());
        self.channels.insert(uid, channel);
        Ok(())
    }

    fn handle_newstate(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name = event.require("Channel");
        let state_code = event.require_u8("ChannelState");
        let uid = self.uniqueid_by_name(name)?;

        let transition = self.channel_mut(&uid)?.set_state(ChannelState::from_code(state_code));

        if transition.fired_a_dial {
            self.raw_a_dial(&uid);
        }
        if transition.fired_b_dial {
            self.raw_b_dial(&uid)?;
        }
        Ok(())
    }

    fn handle_newcallerid(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name = event.require("Channel");
        let caller_id_name = event.get("CallerIDName").unwrap_or("");
        let caller_id_num = event.get("CallerIDNum").unwrap_or("");
        let is_public = event.contains("CID-CallingPres", "Allowed");
        let uid = self.uniqueid_by_name(name)?;
        self.channel_mut(&uid)?.set_callerid(caller_id_name, caller_id_num, is_public);
        Ok(())
    }

    fn handle_newaccountcode(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name = event.require("Channel");
        let accountcode = event.get("AccountCode").unwrap_or("");
        let uid = self.uniqueid_by_name(name)?;
        self.channel_mut(&uid)?.set_accountcode(accountcode);
        Ok(())
    }

    fn handle_localbridge(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name1 = event.require("Channel1");
        let name2 = event.require("Channel2");
        let uid1 = self.uniqueid_by_name(name1)?;
        let uid2 = self.uniqueid_by_name(name2)?;

        let mut c2 = self.channels.remove(&uid2).ok_or_else(|| ManagerError::missing_uniqueid(uid2.as_str()))?;
        let result = match self.channels.get_mut(&uid1) {
            Some(c1) => {
                c1.do_localbridge(&mut c2);
                Ok(())
            }
            None => Err(ManagerError::missing_uniqueid(uid1.as_str())),
        };
        self.channels.insert(uid2, c2);
        result
    }

    fn handle_rename(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let old_name = event.require("Channel");
        let new_name = event.require("Newname");

        let uid = self
            .by_name
            .remove(&ChannelName::from(old_name))
            .ok_or_else(|| ManagerError::missing_channel("Channel", old_name))?;

        let channel = match self.channels.get_mut(&uid) {
            Some(channel) => channel,
            None => return Err(ManagerError::missing_uniqueid(uid.as_str())),
        };
        channel.set_name(ChannelName::from(new_name));
        self.by_name.insert(channel.name().clone(), uid);
        Ok(())
    }

    fn handle_bridge(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let name1 = event.require("Channel1");
        let name2 = event.require("Channel2");
        let state = event.require("Bridgestate");
        let uid1 = self.uniqueid_by_name(name1)?;
        let uid2 = self.uniqueid_by_name(name2)?;

        match Bridgestate::parse(state) {
            Some(Bridgestate::Link) => {
                self.channel_mut(&uid1)?.link(uid2.clone());
                self.channel_mut(&uid2)?.link(uid1);
                Ok(())
            }
            Some(Bridgestate::Unlink) => {
                self.channel_mut(&uid1)?.unlink(&uid2);
                self.channel_mut(&uid2)?.unlink(&uid1);
                Ok(())
            }
            None => panic!("Bridge event with unknown Bridgestate {state:?}"),
        }
    }

    fn handle_masquerade(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let clone_name = event.require("Clone");
        let clone_state = event.require("CloneState");
        let original_name = event.require("Original");
        let original_state = event.require("OriginalState");

        let clone_uid = self.uniqueid_by_name(clone_name)?;
        let original_uid = self.uniqueid_by_name(original_name)?;

        if clone_state != original_state {
            assert!(
                original_state == "Ring" || original_state == "Ringing",
                "Masquerade: state-changing masquerade with unexpected OriginalState {original_state:?}"
            );
            assert_eq!(
                clone_state, "Up",
                "Masquerade: state-changing masquerade with unexpected CloneState {clone_state:?}"
            );
            if original_state == "Ringing" {
                self.raw_pickup_transfer(&clone_uid, &original_uid)?;
            }
        }

        self.do_masquerade(&original_uid, &clone_uid)
    }

    /// Transplant `clone`'s local links and pending pattern onto
    /// `original`, rewriting whichever far-end back-pointers now need to
    /// point at `original` instead of `clone`. Channels are pulled out of
    /// the arena one at a time to satisfy the borrow checker, then
    /// reinserted.
    fn do_masquerade(&mut self, original_uid: &Uniqueid, clone_uid: &Uniqueid) -> ManagerResult<()> {
        let mut original =
            self.channels.remove(original_uid).ok_or_else(|| ManagerError::missing_uniqueid(original_uid.as_str()))?;
        let mut clone =
            self.channels.remove(clone_uid).ok_or_else(|| ManagerError::missing_uniqueid(clone_uid.as_str()))?;

        let discarded_next = original.next().cloned();
        let discarded_prev = original.prev().cloned();

        let rewrites = original.do_masquerade(&mut clone);

        if let Some(far) = discarded_next {
            if let Some(channel) = self.channels.get_mut(&far) {
                if channel.prev() == Some(original_uid) {
                    channel.set_prev(None);
                }
            }
        }
        if let Some(far) = discarded_prev {
            if let Some(channel) = self.channels.get_mut(&far) {
                if channel.next() == Some(original_uid) {
                    channel.set_next(None);
                }
            }
        }
        if let Some(far) = &rewrites.adopted_next {
            if let Some(channel) = self.channels.get_mut(far) {
                channel.set_prev(Some(rewrites.new_self.clone()));
            }
        }
        if let Some(far) = &rewrites.adopted_prev {
            if let Some(channel) = self.channels.get_mut(far) {
                channel.set_next(Some(rewrites.new_self.clone()));
            }
        }

        self.channels.insert(original_uid.clone(), original);
        self.channels.insert(clone_uid.clone(), clone);
        Ok(())
    }

    /// `Hangup` is the trickiest cleanup: sever the channel's own links,
    /// clear any surviving neighbor's back-pointer to it, drop it from both
    /// indices, purge the dial graph where it was the B-side, and verify
    /// that the relevant channels reachable from its former neighbors are
    /// unchanged by its departure.
    fn handle_hangup(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let uniqueid = event.require("Uniqueid");
        let uid = self.require_uniqueid(uniqueid)?;

        let (prev_uid, next_uid) = {
            let channel = self.channel(&uid)?;
            (channel.prev().cloned(), channel.next().cloned())
        };
        let neighbors: Vec<Uniqueid> = {
            let channel = self.channel(&uid)?;
            let mut n: Vec<Uniqueid> = channel.bridged().iter().cloned().collect();
            n.extend(prev_uid.clone());
            n.extend(next_uid.clone());
            n
        };

        let mut before: HashSet<Uniqueid> = neighbors.iter().flat_map(|n| self.relevant_neighborhood(n)).collect();
        before.remove(&uid);

        let mut channel = self.channels.remove(&uid).expect("presence checked by require_uniqueid above");
        self.by_name.remove(channel.name());
        channel.do_hangup();

        // A local-bridge peer on either side still holds a back-pointer at
        // the now-removed channel; clear it so it does not dangle.
        if let Some(p) = prev_uid {
            if let Some(peer) = self.channels.get_mut(&p) {
                if peer.next() == Some(&uid) {
                    peer.set_next(None);
                }
            }
        }
        if let Some(n) = next_uid {
            if let Some(peer) = self.channels.get_mut(&n) {
                if peer.prev() == Some(&uid) {
                    peer.set_prev(None);
                }
            }
        }

        let after: HashSet<Uniqueid> = neighbors.iter().flat_map(|n| self.relevant_neighborhood(n)).collect();

        assert_eq!(
            before, after,
            "Hangup({uid}) changed the set of relevant channels reachable from its former neighbors"
        );

        if let Some(a_uid) = self.dial_bck.remove(&uid) {
            if let Some(list) = self.dial_fwd.get_mut(&a_uid) {
                list.retain(|b| b != &uid);
                if list.is_empty() {
                    self.dial_fwd.remove(&a_uid);
                }
            }
        }

        Ok(())
    }

    fn handle_dial(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let sub_event = event.require("SubEvent");
        match DialSubEvent::parse(sub_event) {
            Some(DialSubEvent::Begin) => {
                let a_uid = self.require_uniqueid(event.require("UniqueID"))?;
                let b_uid = self.require_uniqueid(event.require("DestUniqueID"))?;
                assert!(
                    !self.dial_bck.contains_key(&b_uid),
                    "Dial/Begin: {b_uid} is already the target of a recorded dial"
                );
                self.dial_fwd.entry(a_uid.clone()).or_default().push(b_uid.clone());
                self.dial_bck.insert(b_uid, a_uid);
                Ok(())
            }
            Some(DialSubEvent::End) => Ok(()),
            None => panic!("Dial event with unknown SubEvent {sub_event:?}"),
        }
    }

    fn handle_transfer(&mut self, event: &AmiEvent) -> ManagerResult<()> {
        let channel_name = event.require("Channel");
        let target_uniqueid = event.require("TargetUniqueid");
        let transfer_type = event.require("TransferType");

        let channel_uid = self.uniqueid_by_name(channel_name)?;
        let target_uid = self.require_uniqueid(target_uniqueid)?;

        match TransferType::parse(transfer_type) {
            Some(TransferType::Attended) => self.raw_attended_transfer(&channel_uid, &target_uid),
            Some(TransferType::Blind) => self.raw_blind_transfer(&channel_uid, &target_uid),
            None => panic!("Transfer event with unknown TransferType {transfer_type:?}"),
        }
    }

    // -- graph traversal -------------------------------------------------

    /// Resolve who is really dialing the channel at `start`, walking back
    /// through the dial graph and rewinding each hop to the head of its
    /// local-bridge chain.
    pub fn get_dialing_channel(&self, start: &Uniqueid) -> Uniqueid {
        let mut current = start.clone();
        loop {
            let dialer = match self.dial_bck.get(&current) {
                Some(dialer) => dialer.clone(),
                None => break,
            };
            current = dialer;

            let mut depth = 0;
            while let Some(channel) = self.channels.get(&current) {
                match channel.prev() {
                    Some(prev) => {
                        current = prev.clone();
                        depth += 1;
                        assert!(depth <= 2, "local-bridge prev chain deeper than the documented maximum");
                    }
                    None => break,
                }
            }
        }
        current
    }

    /// Collect the terminal B-side channels reachable by dialing from
    /// `start`, following local-bridge chains to their far end and
    /// recursing through any further dials from there.
    pub fn get_dialed_channels(&self, start: &Uniqueid) -> HashSet<Uniqueid> {
        let mut result = HashSet::new();
        let dialed = self.dial_fwd.get(start).cloned().unwrap_or_default();

        for dialed_uid in dialed {
            let terminal = self.walk_local_chain_end(&dialed_uid);
            if terminal == dialed_uid {
                result.insert(terminal);
            } else {
                result.extend(self.get_dialed_channels(&terminal));
            }
        }
        result
    }

    fn walk_local_chain_end(&self, start: &Uniqueid) -> Uniqueid {
        let mut current = start.clone();
        let mut depth = 0;
        while let Some(channel) = self.channels.get(&current) {
            match channel.next() {
                Some(next) => {
                    current = next.clone();
                    depth += 1;
                    assert!(depth <= 2, "local-bridge next chain deeper than the documented maximum");
                }
                None => break,
            }
        }
        current
    }

    /// Relevant (`SIP/*`, non-zombie) channels reachable from `start` via
    /// `prev`/`next`/`bridged`, transitively. Used only by the hangup
    /// sanity check.
    fn relevant_neighborhood(&self, start: &Uniqueid) -> HashSet<Uniqueid> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];
        let mut result = HashSet::new();

        while let Some(uid) = stack.pop() {
            if !seen.insert(uid.clone()) {
                continue;
            }
            if let Some(channel) = self.channels.get(&uid) {
                if channel.is_relevant() {
                    result.insert(uid.clone());
                }
                stack.extend(channel.prev().cloned());
                stack.extend(channel.next().cloned());
                stack.extend(channel.bridged().iter().cloned());
            }
        }
        result
    }

    // -- recognition rules ------------------------------------------------

    /// Hook for the A-side counterpart of `raw_b_dial`, fired when a
    /// channel first transitions out of Down into Dialing, Ring, or Up.
    /// Currently a no-op placeholder, kept so the state-transition contract
    /// has a concrete home to attach behavior to later.
    fn raw_a_dial(&mut self, _a_chan: &Uniqueid) {}

    fn raw_b_dial(&mut self, b_uid: &Uniqueid) -> ManagerResult<()> {
        let b_name = self.channel(b_uid)?.name().clone();
        if !b_name.as_str().starts_with("SIP/") {
            return Ok(());
        }

        let a_uid = self.get_dialing_channel(b_uid);
        let pending = self.channel_mut(&a_uid)?.take_pending();
        let b_callerid = self.channel(b_uid)?.callerid();

        match pending {
            PendingPattern::BlindTransfer { from: old_a_uid } => {
                let old_a_callerid = self.channel(&old_a_uid)?.callerid();
                let a_callerid = self.channel(&a_uid)?.callerid();
                self.reporter.on_b_dial(&old_a_callerid, &b_callerid);
                self.reporter.on_transfer(&old_a_callerid, &a_callerid, &b_callerid);
            }
            PendingPattern::None => {
                let a_callerid = self.channel(&a_uid)?.callerid();
                self.reporter.on_b_dial(&a_callerid, &b_callerid);
            }
        }
        Ok(())
    }

    fn raw_attended_transfer(&mut self, channel_uid: &Uniqueid, target_uid: &Uniqueid) -> ManagerResult<()> {
        let redirector = self.channel(target_uid)?.callerid();
        let caller = self.bridged_channel(channel_uid)?.callerid();

        if self.channel(target_uid)?.is_bridged() {
            let callee = self.bridged_channel(target_uid)?.callerid();
            self.reporter.on_transfer(&redirector, &caller, &callee);
        } else {
            for b_uid in self.get_dialed_channels(target_uid) {
                let callee = self.channel(&b_uid)?.callerid();
                self.reporter.on_transfer(&redirector, &caller, &callee);
            }
        }
        Ok(())
    }

    fn raw_blind_transfer(&mut self, channel_uid: &Uniqueid, target_uid: &Uniqueid) -> ManagerResult<()> {
        self.channel_mut(target_uid)?.set_pending(PendingPattern::BlindTransfer { from: channel_uid.clone() });
        Ok(())
    }

    fn raw_pickup_transfer(&mut self, winner_uid: &Uniqueid, loser_uid: &Uniqueid) -> ManagerResult<()> {
        let a_uid = self.get_dialing_channel(loser_uid);
        let caller = self.channel(&a_uid)?.callerid();
        let dest = self.channel(loser_uid)?.callerid();
        let winner_callerid = self.channel(winner_uid)?.callerid();

        let callee = winner_callerid.replace(
            CallerIdOverrides::default().name(dest.name).number(dest.number).is_public(dest.is_public),
        );
        self.reporter.on_transfer(&callee, &caller, &callee);
        Ok(())
    }
}
