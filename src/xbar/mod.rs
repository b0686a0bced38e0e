pub mod arbiter;
pub mod completion;
pub mod config;
pub mod error;
pub mod id_gate;
pub mod interconnect;
pub mod ports;
pub mod route;
pub mod sequencer;
pub mod stats;
pub mod tracker;
pub mod transaction;
pub mod types;
pub mod watchdog;

#[cfg(test)]
mod unit_tests;

pub use arbiter::Arbiter;
pub use completion::{CompletionRouter, IdTagger, LocalCompletion, LocalResponder, Source};
pub use config::{Capability, InitiatorConfig, Protocol, TargetConfig, XbarConfig};
pub use error::{ConfigError, XbarError};
pub use id_gate::{Destination, IdOrderGate};
pub use interconnect::Interconnect;
pub use ports::{InitiatorHandle, TargetHandle};
pub use route::{Decode, RouteTable};
pub use sequencer::{BeatRoute, BurstSink, DataSequencer, WriteBurst};
pub use stats::{InitiatorStats, TargetStats, XbarStats};
pub use tracker::{Full, OutstandingTracker, Slot};
pub use transaction::{PendingTransaction, TransactionTable, TxnState};
pub use types::{
    AddrRequest, BurstKind, ChannelKind, InitiatorId, ReadBeat, Resp, TargetId, TxnSerial,
    WriteBeat, WriteResp,
};
pub use watchdog::Watchdog;
