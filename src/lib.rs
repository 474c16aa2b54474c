//! amitrack - a channel-graph state tracker for Asterisk Manager Interface
//! (AMI) event streams.
//!
//! Feed an already-parsed stream of AMI events to [`manager::ChannelManager`]
//! and it reconstructs the evolving graph of PBX channels — renames,
//! masquerades, local bridges, dial relationships, bridged peerings — and
//! recognizes, purely from the event stream, when a call is ringing
//! ([`reporter::Reporter::on_b_dial`]) or a transfer (attended, blind,
//! blonde, or pickup) has occurred ([`reporter::Reporter::on_transfer`]).
//!
//! The AMI transport itself, persistence across restarts, and concrete
//! `Reporter` backends beyond the bundled [`reporter::NullReporter`] and
//! [`reporter::TracingReporter`] are out of scope for this crate.

pub mod caller_id;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod manager;
pub mod reporter;

pub use caller_id::{CallerId, CallerIdOverrides};
pub use channel::{Channel, ChannelState, PendingPattern};
pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult};
pub use event::AmiEvent;
pub use ids::{ChannelName, Uniqueid};
pub use manager::ChannelManager;
pub use reporter::{NullReporter, Reporter, TracingReporter};
