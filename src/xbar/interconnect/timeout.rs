use log::warn;

use crate::xbar::completion::LocalCompletion;
use crate::xbar::types::{ChannelKind, Resp, TargetId};

use super::{Interconnect, OrphanKey};

impl Interconnect {
    /// Fault every transaction whose deadline has passed.  The slot is freed now; the SLVERR
    /// completion goes out through the local responder once the initiator's data phase allows.
    pub(super) fn expire_timeouts(&mut self) {
        for serial in self.watchdog.expired(self.cycle) {
            let Some(txn) = self.txns.remove(serial) else {
                continue;
            };
            let i = txn.initiator;
            warn!(
                "cycle {}: a{} #{} initiator {} -> target {} id {:#x} timed out (admitted at {}, deadline {}, {}/{} beats)",
                self.cycle,
                txn.kind.short(),
                serial,
                i,
                txn.target,
                txn.raw_id,
                txn.admitted_at,
                txn.deadline.unwrap_or(self.cycle),
                txn.beats_done,
                txn.beats
            );

            let owed = match txn.kind {
                ChannelKind::Write => 1,
                ChannelKind::Read => txn.beats_remaining(),
            };
            *self
                .orphans
                .entry(OrphanKey {
                    target: txn.target,
                    kind: txn.kind,
                    tagged_id: txn.tagged_id,
                })
                .or_insert(0) += owed;

            let fault = LocalCompletion {
                serial,
                raw_id: txn.raw_id,
                resp: Resp::SlvErr,
                beats: owed,
                issued_at: txn.admitted_at,
            };
            match txn.kind {
                // a burst still in its data phase is absorbed first; the fault follows its last beat
                ChannelKind::Write => {
                    if !self.sequencer.drain(i, serial, txn.tagged_id, Resp::SlvErr) {
                        self.local.push(i, ChannelKind::Write, fault);
                    }
                }
                ChannelKind::Read => self.local.push(i, ChannelKind::Read, fault),
            }
            self.stats.initiators[i].record_timeout();
            self.tracker.release(txn.slot);
        }
    }

    /// Swallow a response owed for a faulted transaction.  True if one was expected.
    pub(super) fn consume_orphan(&mut self, target: TargetId, kind: ChannelKind, tagged_id: u32) -> bool {
        let key = OrphanKey {
            target,
            kind,
            tagged_id,
        };
        let Some(owed) = self.orphans.get_mut(&key) else {
            return false;
        };
        *owed -= 1;
        if *owed == 0 {
            self.orphans.remove(&key);
        }
        self.stats.targets[target].record_late_discard();
        warn!(
            "cycle {}: late {} from target {} for faulted id {:#x} discarded",
            self.cycle,
            match kind {
                ChannelKind::Write => "write response",
                ChannelKind::Read => "read beat",
            },
            target,
            tagged_id
        );
        true
    }
}
