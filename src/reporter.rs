//! Output side of the tracker: the high-level call events it recognizes,
//! plus optional low-level tracing of the raw AMI stream.
//!
//! Split into a trait so embedders can wire recognized events into
//! whatever they actually want (a message bus, a test assertion buffer,
//! ...) without this crate caring. `TracingReporter` is the batteries-
//! included implementation used by `ManagerConfig::debug()`.

use crate::caller_id::CallerId;
use crate::event::AmiEvent;

/// Sink for both raw-event tracing and recognized call events.
///
/// Default method bodies are all no-ops, so implementors only override the
/// hooks they care about.
pub trait Reporter {
    /// Called for every event handed to [`crate::manager::ChannelManager::on_event`],
    /// before dispatch, regardless of whether it is `is_relevant`.
    fn trace_ami(&mut self, _event: &AmiEvent) {}

    /// Free-form diagnostic message (dropped channel lookups, skipped
    /// events, ...).
    fn trace_msg(&mut self, _message: &str) {}

    /// Echoed once dispatch of `event` has finished, whether or not it
    /// raised a recoverable [`crate::error::ManagerError`].
    fn on_event(&mut self, _event: &AmiEvent) {}

    /// `b_chan` started ringing because `a_chan` dialed it.
    fn on_b_dial(&mut self, _a_chan: &CallerId, _b_chan: &CallerId) {}

    /// `redirector` moved `party1` onto a call with `party2` (covers
    /// attended, blind, blonde transfers and pickups alike).
    fn on_transfer(&mut self, _redirector: &CallerId, _party1: &CallerId, _party2: &CallerId) {}
}

/// A `Reporter` that discards everything. The default for
/// [`crate::config::ManagerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// A `Reporter` that logs every hook through the `tracing` crate, at the
/// verbosity a production deployment would actually want: recognized call
/// events at `info`, raw AMI traffic and internal diagnostics at `trace`/`debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn trace_ami(&mut self, event: &AmiEvent) {
        tracing::trace!(event = %event, "ami event");
    }

    fn trace_msg(&mut self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn on_event(&mut self, event: &AmiEvent) {
        tracing::trace!(event = ?event.event_name(), "dispatched");
    }

    fn on_b_dial(&mut self, a_chan: &CallerId, b_chan: &CallerId) {
        tracing::info!(a = %a_chan, b = %b_chan, "b_dial");
    }

    fn on_transfer(&mut self, redirector: &CallerId, party1: &CallerId, party2: &CallerId) {
        tracing::info!(redirector = %redirector, party1 = %party1, party2 = %party2, "transfer");
    }
}
