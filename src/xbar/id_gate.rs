use std::collections::HashMap;

use smallvec::SmallVec;

use super::types::{ChannelKind, InitiatorId, TargetId, TxnSerial};

/// Where a transaction's completion will come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Target(TargetId),
    /// Synthesized locally because the address did not decode.
    DecodeError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GateKey {
    initiator: InitiatorId,
    kind: ChannelKind,
    id: u32,
}

#[derive(Debug, Clone)]
struct GateEntry {
    dest: Destination,
    live: SmallVec<[TxnSerial; 4]>,
}

/// Per-ID ordering across destinations.
///
/// All live transactions sharing (initiator, channel, id) go to one destination; a request with
/// the same id toward another destination waits until they drain.  Completions for a key are
/// released strictly in grant order.
#[derive(Debug, Clone, Default)]
pub struct IdOrderGate {
    entries: HashMap<GateKey, GateEntry>,
}

impl IdOrderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_issue(
        &self,
        initiator: InitiatorId,
        kind: ChannelKind,
        id: u32,
        dest: Destination,
    ) -> bool {
        self.entries
            .get(&GateKey { initiator, kind, id })
            .map_or(true, |entry| entry.dest == dest)
    }

    pub fn open(
        &mut self,
        initiator: InitiatorId,
        kind: ChannelKind,
        id: u32,
        dest: Destination,
        serial: TxnSerial,
    ) {
        let entry = self
            .entries
            .entry(GateKey { initiator, kind, id })
            .or_insert_with(|| GateEntry {
                dest,
                live: SmallVec::new(),
            });
        debug_assert_eq!(entry.dest, dest, "gate opened toward a second destination");
        debug_assert!(entry.live.last().map_or(true, |&last| last < serial));
        entry.live.push(serial);
    }

    /// True if `serial` is the oldest live transaction of its key.
    pub fn is_oldest(&self, initiator: InitiatorId, kind: ChannelKind, id: u32, serial: TxnSerial) -> bool {
        self.entries
            .get(&GateKey { initiator, kind, id })
            .and_then(|entry| entry.live.first())
            .is_some_and(|&front| front == serial)
    }

    pub fn close(&mut self, initiator: InitiatorId, kind: ChannelKind, id: u32, serial: TxnSerial) {
        let key = GateKey { initiator, kind, id };
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if let Some(pos) = entry.live.iter().position(|&s| s == serial) {
            entry.live.remove(pos);
        }
        if entry.live.is_empty() {
            self.entries.remove(&key);
        }
    }

    #[cfg(test)]
    pub fn live(&self, initiator: InitiatorId, kind: ChannelKind, id: u32) -> usize {
        self.entries
            .get(&GateKey { initiator, kind, id })
            .map_or(0, |entry| entry.live.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: ChannelKind = ChannelKind::Write;
    const R: ChannelKind = ChannelKind::Read;

    #[test]
    fn same_id_held_to_one_destination() {
        let mut gate = IdOrderGate::new();
        gate.open(0, W, 5, Destination::Target(1), 10);
        assert!(gate.can_issue(0, W, 5, Destination::Target(1)));
        assert!(!gate.can_issue(0, W, 5, Destination::Target(2)));
        assert!(!gate.can_issue(0, W, 5, Destination::DecodeError));
        // other ids, channels and initiators are independent
        assert!(gate.can_issue(0, W, 6, Destination::Target(2)));
        assert!(gate.can_issue(0, R, 5, Destination::Target(2)));
        assert!(gate.can_issue(1, W, 5, Destination::Target(2)));
        gate.close(0, W, 5, 10);
        assert!(gate.can_issue(0, W, 5, Destination::Target(2)));
    }

    #[test]
    fn oldest_tracks_grant_order() {
        let mut gate = IdOrderGate::new();
        gate.open(0, R, 1, Destination::Target(0), 3);
        gate.open(0, R, 1, Destination::Target(0), 8);
        assert!(gate.is_oldest(0, R, 1, 3));
        assert!(!gate.is_oldest(0, R, 1, 8));
        gate.close(0, R, 1, 3);
        assert!(gate.is_oldest(0, R, 1, 8));
        assert_eq!(gate.live(0, R, 1), 1);
    }
}
