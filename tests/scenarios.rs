//! End-to-end scenarios: feed a sequence of AMI events into a fresh
//! `ChannelManager` and check the call events it recognizes.

use amitrack::caller_id::CallerId;
use amitrack::event::AmiEvent;
use amitrack::manager::ChannelManager;
use amitrack::reporter::Reporter;
use amitrack::{ami_event, ManagerConfig};

#[derive(Default)]
struct RecordingReporter {
    messages: Vec<String>,
    b_dials: Vec<(CallerId, CallerId)>,
    transfers: Vec<(CallerId, CallerId, CallerId)>,
}

impl Reporter for RecordingReporter {
    fn trace_msg(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn on_b_dial(&mut self, a_chan: &CallerId, b_chan: &CallerId) {
        self.b_dials.push((a_chan.clone(), b_chan.clone()));
    }

    fn on_transfer(&mut self, redirector: &CallerId, party1: &CallerId, party2: &CallerId) {
        self.transfers.push((redirector.clone(), party1.clone(), party2.clone()));
    }
}

fn newchannel(name: &str, uniqueid: &str, caller_num: &str, exten: &str) -> AmiEvent {
    ami_event! {
        "Event" => "Newchannel",
        "Channel" => name,
        "Uniqueid" => uniqueid,
        "ChannelState" => "0",
        "CallerIDName" => "Some Name",
        "CallerIDNum" => caller_num,
        "AccountCode" => "",
        "Exten" => exten,
    }
}

fn dial_begin(uniqueid: &str, dest_uniqueid: &str) -> AmiEvent {
    ami_event! {
        "Event" => "Dial",
        "SubEvent" => "Begin",
        "UniqueID" => uniqueid,
        "DestUniqueID" => dest_uniqueid,
    }
}

fn newstate(name: &str, state: &str) -> AmiEvent {
    ami_event! {
        "Event" => "Newstate",
        "Channel" => name,
        "ChannelState" => state,
    }
}

fn bridge(name1: &str, name2: &str, state: &str) -> AmiEvent {
    ami_event! {
        "Event" => "Bridge",
        "Channel1" => name1,
        "Channel2" => name2,
        "Bridgestate" => state,
    }
}

/// S1 - simple A-to-B call.
#[test]
fn s1_simple_call_fires_one_b_dial() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newchannel("SIP/trunk-0000a1", "a1", "+31501234567", "+31501234567"));
    manager.on_event(&newchannel("SIP/200-0000b1", "b1", "200", "200"));
    manager.on_event(&dial_begin("a1", "b1"));
    manager.on_event(&newstate("SIP/200-0000b1", "5"));

    let reporter = manager.into_reporter();
    assert_eq!(reporter.b_dials.len(), 1);
    assert_eq!(reporter.transfers.len(), 0);
    assert_eq!(reporter.b_dials[0].0.number, "+31501234567");
    assert_eq!(reporter.b_dials[0].1.number, "200");
}

/// S2 - attended transfer: A bridged to B, C bridged to D, C attended-transfers
/// A onto the call, connecting D (C's peer) with B (A's peer).
#[test]
fn s2_attended_transfer() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newchannel("SIP/100-a1", "a1", "100", "100"));
    manager.on_event(&newchannel("SIP/200-b1", "b1", "200", "200"));
    manager.on_event(&bridge("SIP/100-a1", "SIP/200-b1", "Link"));

    manager.on_event(&newchannel("SIP/300-c1", "c1", "300", "300"));
    manager.on_event(&newchannel("SIP/400-d1", "d1", "400", "400"));
    manager.on_event(&dial_begin("c1", "d1"));
    manager.on_event(&bridge("SIP/300-c1", "SIP/400-d1", "Link"));

    manager.on_event(&ami_event! {
        "Event" => "Transfer",
        "Channel" => "SIP/300-c1",
        "TargetChannel" => "SIP/100-a1",
        "TargetUniqueid" => "a1",
        "TransferType" => "Attended",
    });

    let reporter = manager.into_reporter();
    assert_eq!(reporter.transfers.len(), 1);
    let (redirector, caller, callee) = &reporter.transfers[0];
    assert_eq!(redirector.number, "100");
    assert_eq!(caller.number, "400");
    assert_eq!(callee.number, "200");
}

/// S3 - blind transfer: A bridged to B, B blind-transfers to extension 300
/// (resolved through a local-bridge leg chained off A), which dials C.
#[test]
fn s3_blind_transfer_emits_b_dial_then_transfer_in_order() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newchannel("SIP/300-a1", "a1", "300", "300"));
    manager.on_event(&newchannel("SIP/400-b1", "b1", "400", "400"));
    manager.on_event(&bridge("SIP/300-a1", "SIP/400-b1", "Link"));

    manager.on_event(&ami_event! {
        "Event" => "Transfer",
        "Channel" => "SIP/400-b1",
        "TargetChannel" => "SIP/300-a1",
        "TargetUniqueid" => "a1",
        "TransferType" => "Blind",
        "TransferExten" => "500",
    });

    manager.on_event(&ami_event! {
        "Event" => "Newchannel",
        "Channel" => "Local/500@from-internal-00000001;1",
        "Uniqueid" => "ap1",
        "ChannelState" => "0",
        "CallerIDName" => "",
        "CallerIDNum" => "",
        "AccountCode" => "",
        "Exten" => "500",
    });
    manager.on_event(&ami_event! {
        "Event" => "LocalBridge",
        "Channel1" => "SIP/300-a1",
        "Channel2" => "Local/500@from-internal-00000001;1",
        "Uniqueid1" => "a1",
        "Uniqueid2" => "ap1",
        "LocalOptimization" => "Yes",
    });

    manager.on_event(&newchannel("SIP/500-c1", "c1", "500", "500"));
    manager.on_event(&dial_begin("ap1", "c1"));
    manager.on_event(&newstate("SIP/500-c1", "5"));

    let reporter = manager.into_reporter();
    assert_eq!(reporter.b_dials.len(), 1);
    assert_eq!(reporter.transfers.len(), 1);

    assert_eq!(reporter.b_dials[0].0.number, "400");
    assert_eq!(reporter.b_dials[0].1.number, "500");

    let (redirector, party1, party2) = &reporter.transfers[0];
    assert_eq!(redirector.number, "400");
    assert_eq!(party1.number, "300");
    assert_eq!(party2.number, "500");
}

/// S4 - blonde transfer: B attended-transfers A' onto the call, but A'
/// has only open dials (to C1 and C2), no bridge yet.
#[test]
fn s4_blonde_transfer_fires_once_per_dialed_channel() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newchannel("SIP/100-a1", "a1", "100", "100"));
    manager.on_event(&newchannel("SIP/200-b1", "b1", "200", "200"));
    manager.on_event(&bridge("SIP/100-a1", "SIP/200-b1", "Link"));

    manager.on_event(&newchannel("SIP/300-ap1", "ap1", "300", "300"));
    manager.on_event(&newchannel("SIP/610-c1", "c1", "610", "610"));
    manager.on_event(&newchannel("SIP/620-c2", "c2", "620", "620"));
    manager.on_event(&dial_begin("ap1", "c1"));
    manager.on_event(&dial_begin("ap1", "c2"));

    manager.on_event(&ami_event! {
        "Event" => "Transfer",
        "Channel" => "SIP/200-b1",
        "TargetChannel" => "SIP/300-ap1",
        "TargetUniqueid" => "ap1",
        "TransferType" => "Attended",
    });

    let reporter = manager.into_reporter();
    assert_eq!(reporter.transfers.len(), 2);
    for (redirector, caller, _callee) in &reporter.transfers {
        assert_eq!(redirector.number, "300");
        assert_eq!(caller.number, "100");
    }
    let mut callees: Vec<&str> = reporter.transfers.iter().map(|(_, _, callee)| callee.number.as_str()).collect();
    callees.sort();
    assert_eq!(callees, vec!["610", "620"]);
}

/// S5 - call pickup, modeled as a Masquerade where a still-ringing
/// original is swapped for an already-answered clone.
#[test]
fn s5_call_pickup() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newchannel("SIP/600-a1", "a1", "600", "600"));
    manager.on_event(&newchannel("SIP/700-loser", "loser1", "700", "700"));
    manager.on_event(&dial_begin("a1", "loser1"));
    manager.on_event(&newchannel("SIP/800-winner", "winner1", "999", "999"));

    manager.on_event(&ami_event! {
        "Event" => "Masquerade",
        "Clone" => "SIP/800-winner",
        "CloneState" => "Up",
        "Original" => "SIP/700-loser",
        "OriginalState" => "Ringing",
    });

    let reporter = manager.into_reporter();
    assert_eq!(reporter.transfers.len(), 1);
    let (redirector, caller, party2) = &reporter.transfers[0];
    assert_eq!(caller.number, "600");
    assert_eq!(redirector.number, "700");
    assert_eq!(party2.number, "700");
    assert_eq!(redirector, party2);
}

/// S6 - a Newstate for a channel the tracker never saw a Newchannel for is
/// logged and skipped, without interrupting subsequent processing.
#[test]
fn s6_missing_channel_is_tolerated() {
    let mut manager = ChannelManager::new(RecordingReporter::default());

    manager.on_event(&newstate("SIP/ghost-00000000", "4"));

    manager.on_event(&newchannel("SIP/trunk-0000a1", "a1", "100", "100"));
    manager.on_event(&newchannel("SIP/200-0000b1", "b1", "200", "200"));
    manager.on_event(&dial_begin("a1", "b1"));
    manager.on_event(&newstate("SIP/200-0000b1", "5"));

    let reporter = manager.into_reporter();
    assert_eq!(reporter.messages.len(), 1);
    assert!(reporter.messages[0].contains("SIP/ghost-00000000"));
    assert_eq!(reporter.b_dials.len(), 1);
}

/// Configured with `ManagerConfig::debug()`, events outside the default
/// interesting set are no longer silently dropped by the filter (though
/// the core still treats unrecognized `Event` names as no-ops).
#[test]
fn debug_config_does_not_panic_on_unknown_events() {
    let mut manager = ChannelManager::with_config(ManagerConfig::debug(), RecordingReporter::default());
    manager.on_event(&ami_event! {
        "Event" => "VarSet",
        "Channel" => "SIP/100-a1",
        "Variable" => "SOMEVAR",
        "Value" => "1",
    });
    assert_eq!(manager.into_reporter().messages.len(), 0);
}
