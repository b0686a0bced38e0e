use std::collections::BTreeMap;

use crate::timeq::Cycle;

use super::tracker::Slot;
use super::types::{ChannelKind, InitiatorId, TargetId, TxnSerial};

/// Lifecycle of an admitted transaction.  There is no terminal state: completion or a watchdog
/// fault removes the entry from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Admitted,
    /// Write only: some but not all data beats reached the target.
    DataInFlight,
    AwaitingCompletion,
}

#[derive(Debug)]
pub struct PendingTransaction {
    pub serial: TxnSerial,
    pub raw_id: u32,
    pub tagged_id: u32,
    pub initiator: InitiatorId,
    pub target: TargetId,
    pub kind: ChannelKind,
    pub beats: u32,
    pub beats_done: u32,
    pub slot: Slot,
    pub admitted_at: Cycle,
    pub deadline: Option<Cycle>,
    pub state: TxnState,
}

impl PendingTransaction {
    /// Account one write beat forwarded to the target.
    pub fn data_beat(&mut self, last: bool) {
        debug_assert_eq!(self.kind, ChannelKind::Write);
        self.beats_done += 1;
        self.state = if last {
            TxnState::AwaitingCompletion
        } else {
            TxnState::DataInFlight
        };
    }

    /// Account one read beat delivered to the initiator.  True once the burst is complete.
    pub fn read_beat(&mut self) -> bool {
        debug_assert_eq!(self.kind, ChannelKind::Read);
        self.beats_done += 1;
        self.beats_done == self.beats
    }

    pub fn beats_remaining(&self) -> u32 {
        self.beats.saturating_sub(self.beats_done)
    }
}

/// Live transactions keyed by serial, so iteration order is grant order.
#[derive(Debug, Default)]
pub struct TransactionTable {
    live: BTreeMap<TxnSerial, PendingTransaction>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, txn: PendingTransaction) {
        let prev = self.live.insert(txn.serial, txn);
        debug_assert!(prev.is_none(), "serial reused");
    }

    pub fn get(&self, serial: TxnSerial) -> Option<&PendingTransaction> {
        self.live.get(&serial)
    }

    pub fn get_mut(&mut self, serial: TxnSerial) -> Option<&mut PendingTransaction> {
        self.live.get_mut(&serial)
    }

    pub fn remove(&mut self, serial: TxnSerial) -> Option<PendingTransaction> {
        self.live.remove(&serial)
    }

    /// Oldest live transaction a completion from `target` with `tagged_id` can belong to.  Targets
    /// answer same-id transactions in the order they accepted them.
    pub fn oldest_matching(
        &self,
        initiator: InitiatorId,
        target: TargetId,
        kind: ChannelKind,
        tagged_id: u32,
    ) -> Option<TxnSerial> {
        self.live
            .values()
            .find(|txn| {
                txn.initiator == initiator
                    && txn.target == target
                    && txn.kind == kind
                    && txn.tagged_id == tagged_id
            })
            .map(|txn| txn.serial)
    }

    pub fn live_for_pair(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.live
            .values()
            .filter(|txn| txn.initiator == initiator && txn.target == target)
            .count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbar::config::{InitiatorConfig, TargetConfig, XbarConfig};
    use crate::xbar::tracker::OutstandingTracker;

    fn txn(tracker: &mut OutstandingTracker, serial: TxnSerial, kind: ChannelKind, tagged_id: u32, beats: u32) -> PendingTransaction {
        PendingTransaction {
            serial,
            raw_id: tagged_id & 0xff,
            tagged_id,
            initiator: 0,
            target: 0,
            kind,
            beats,
            beats_done: 0,
            slot: tracker.try_admit(0, 0).unwrap(),
            admitted_at: serial,
            deadline: None,
            state: TxnState::Admitted,
        }
    }

    fn tracker() -> OutstandingTracker {
        OutstandingTracker::new(&XbarConfig {
            initiators: vec![InitiatorConfig {
                id_mask: 0x100,
                outstanding: 8,
                ..InitiatorConfig::default()
            }],
            targets: vec![TargetConfig {
                outstanding: 8,
                ..TargetConfig::default()
            }],
            ..XbarConfig::default()
        })
    }

    #[test]
    fn oldest_matching_follows_grant_order() {
        let mut tr = tracker();
        let mut table = TransactionTable::new();
        table.insert(txn(&mut tr, 7, ChannelKind::Read, 0x101, 1));
        table.insert(txn(&mut tr, 3, ChannelKind::Read, 0x101, 1));
        table.insert(txn(&mut tr, 5, ChannelKind::Write, 0x101, 1));
        assert_eq!(table.oldest_matching(0, 0, ChannelKind::Read, 0x101), Some(3));
        assert_eq!(table.oldest_matching(0, 0, ChannelKind::Write, 0x101), Some(5));
        assert_eq!(table.oldest_matching(0, 0, ChannelKind::Read, 0x102), None);
        assert_eq!(table.live_for_pair(0, 0), 3);
        let removed = table.remove(3).unwrap();
        tr.release(removed.slot);
        assert_eq!(table.oldest_matching(0, 0, ChannelKind::Read, 0x101), Some(7));
        assert_eq!(tr.count(0, 0), table.len());
    }

    #[test]
    fn write_state_advances_with_data() {
        let mut tr = tracker();
        let mut t = txn(&mut tr, 1, ChannelKind::Write, 0x100, 3);
        t.data_beat(false);
        assert_eq!(t.state, TxnState::DataInFlight);
        t.data_beat(false);
        t.data_beat(true);
        assert_eq!(t.state, TxnState::AwaitingCompletion);
        assert_eq!(t.beats_remaining(), 0);
    }

    #[test]
    fn read_completes_on_final_beat() {
        let mut tr = tracker();
        let mut t = txn(&mut tr, 1, ChannelKind::Read, 0x100, 2);
        assert!(!t.read_beat());
        assert!(t.read_beat());
    }
}
