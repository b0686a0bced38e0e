use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};

use crate::timeq::Cycle;

use super::arbiter::Arbiter;
use super::completion::{CompletionRouter, IdTagger, LocalResponder};
use super::config::XbarConfig;
use super::error::{Result, XbarError};
use super::id_gate::IdOrderGate;
use super::ports::{initiator_port, target_port, InitiatorHandle, InitiatorSide, TargetHandle, TargetSide};
use super::route::RouteTable;
use super::sequencer::DataSequencer;
use super::stats::XbarStats;
use super::tracker::OutstandingTracker;
use super::transaction::TransactionTable;
use super::types::{ChannelKind, InitiatorId, TargetId, TxnSerial};
use super::watchdog::Watchdog;

mod address;
mod data;
mod response;
mod timeout;

/// Responses a target still owes for transactions the watchdog already faulted.  Counted in
/// beats for reads and in responses for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct OrphanKey {
    target: TargetId,
    kind: ChannelKind,
    tagged_id: u32,
}

/// The switching core.
///
/// Owns every per-port structure and advances them all by one step per call to `step`.  Adapters
/// talk to it only through the handles returned by `initiator` and `target`.
pub struct Interconnect {
    config: Arc<XbarConfig>,
    routes: RouteTable,
    tagger: IdTagger,
    initiators: Vec<InitiatorSide>,
    targets: Vec<TargetSide>,
    initiator_handles: Vec<InitiatorHandle>,
    target_handles: Vec<TargetHandle>,
    // one per target, one requester slot per initiator
    aw_arbiters: Vec<Arbiter>,
    ar_arbiters: Vec<Arbiter>,
    b_routers: Vec<CompletionRouter>,
    r_routers: Vec<CompletionRouter>,
    tracker: OutstandingTracker,
    sequencer: DataSequencer,
    gate: IdOrderGate,
    local: LocalResponder,
    watchdog: Watchdog,
    txns: TransactionTable,
    orphans: HashMap<OrphanKey, u32>,
    next_serial: TxnSerial,
    cycle: Cycle,
    stats: XbarStats,
    halted: Option<XbarError>,
}

impl Interconnect {
    pub fn new(config: XbarConfig) -> Result<Self> {
        let routes = config.route_table()?;
        let num_initiators = config.num_initiators();
        let num_targets = config.num_targets();

        let (initiators, initiator_handles): (Vec<_>, Vec<_>) =
            (0..num_initiators).map(|_| initiator_port()).unzip();
        let (targets, target_handles): (Vec<_>, Vec<_>) =
            (0..num_targets).map(|_| target_port()).unzip();

        info!(
            "interconnect: {} initiators, {} targets, {:?}, timeout {}",
            num_initiators,
            num_targets,
            config.protocol,
            if config.timeout_enable {
                format!("{} cycles", config.timeout_value)
            } else {
                "disabled".to_string()
            }
        );

        Ok(Self {
            tagger: IdTagger::new(&config),
            tracker: OutstandingTracker::new(&config),
            watchdog: Watchdog::new(config.timeout_enable, config.timeout_value),
            routes,
            initiators,
            targets,
            initiator_handles,
            target_handles,
            aw_arbiters: (0..num_targets).map(|_| Arbiter::new(num_initiators)).collect(),
            ar_arbiters: (0..num_targets).map(|_| Arbiter::new(num_initiators)).collect(),
            b_routers: (0..num_initiators)
                .map(|i| CompletionRouter::new(i, ChannelKind::Write, num_targets))
                .collect(),
            r_routers: (0..num_initiators)
                .map(|i| CompletionRouter::new(i, ChannelKind::Read, num_targets))
                .collect(),
            sequencer: DataSequencer::new(num_initiators, num_targets),
            gate: IdOrderGate::new(),
            local: LocalResponder::new(num_initiators),
            txns: TransactionTable::new(),
            orphans: HashMap::new(),
            next_serial: 0,
            cycle: 0,
            stats: XbarStats::new(num_initiators, num_targets),
            halted: None,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &XbarConfig {
        &self.config
    }

    pub fn num_initiators(&self) -> usize {
        self.initiators.len()
    }

    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }

    /// Adapter handle for initiator port `i`.  Panics on an index outside the configuration.
    pub fn initiator(&self, i: InitiatorId) -> InitiatorHandle {
        self.initiator_handles[i].clone()
    }

    pub fn target(&self, t: TargetId) -> TargetHandle {
        self.target_handles[t].clone()
    }

    /// Advance every channel by one step: responses (B, then R), write data, address requests
    /// (AW, then AR), then the watchdog.
    ///
    /// A systemic error halts the interconnect; this call and every later one return it.
    pub fn step(&mut self) -> Result<()> {
        if let Some(err) = &self.halted {
            return Err(err.clone());
        }
        if let Err(err) = self.advance() {
            error!("interconnect halted at cycle {}: {}", self.cycle, err);
            self.halted = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.route_write_responses()?;
        self.route_read_data()?;
        self.sequence_write_data()?;
        self.admit_requests(ChannelKind::Write)?;
        self.admit_requests(ChannelKind::Read)?;
        self.expire_timeouts();
        self.cycle += 1;
        self.stats.cycles = self.cycle;
        Ok(())
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn stats(&self) -> &XbarStats {
        &self.stats
    }

    pub fn halted(&self) -> Option<&XbarError> {
        self.halted.as_ref()
    }

    /// Admitted transactions of the pair that have not completed or faulted.
    pub fn outstanding(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.tracker.count(initiator, target)
    }

    pub fn outstanding_depth(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.tracker.depth(initiator, target)
    }

    pub fn peak_outstanding(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.tracker.peak(initiator, target)
    }

    /// Live transactions recorded for the pair; always equal to `outstanding`.
    pub fn live_transactions(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.txns.live_for_pair(initiator, target)
    }

    /// True when nothing is in flight anywhere in the core: no admitted transaction, no queued
    /// local completion, no burst waiting for data and no filler owed to a target.
    pub fn is_idle(&self) -> bool {
        self.txns.is_empty()
            && self.sequencer.fillers_owed() == 0
            && (0..self.num_initiators())
                .all(|i| self.local.pending(i) == 0 && self.sequencer.pending(i) == 0)
    }

    /// Late target responses still expected for faulted transactions.
    pub fn orphaned(&self) -> u32 {
        self.orphans.values().sum()
    }

    fn initiator_port_name(i: InitiatorId, channel: &str) -> String {
        format!("initiator {i} {channel}")
    }

    fn target_port_name(t: TargetId, channel: &str) -> String {
        format!("target {t} {channel}")
    }
}
