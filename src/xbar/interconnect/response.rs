use log::debug;
use smallvec::SmallVec;

use crate::xbar::completion::{LocalCompletion, Source};
use crate::xbar::error::{Result, XbarError};
use crate::xbar::transaction::TxnState;
use crate::xbar::types::{ChannelKind, InitiatorId, ReadBeat, Resp, TargetId, TxnSerial, WriteResp};

use super::Interconnect;

type Offers = SmallVec<[Option<u8>; 8]>;

/// What each target currently holds on one response channel, resolved to its owner.
struct Pending {
    // offers[i][t]: priority of target t if it holds a deliverable completion for initiator i
    offers: Vec<Offers>,
    // matched[t]: the transaction target t's held completion belongs to
    matched: Vec<Option<TxnSerial>>,
}

impl Pending {
    fn new(num_initiators: usize, num_targets: usize) -> Self {
        Self {
            offers: vec![SmallVec::from_elem(None, num_targets); num_initiators],
            matched: vec![None; num_targets],
        }
    }
}

impl Interconnect {
    /// Attribute a target completion to its transaction.  Returns None when the completion is
    /// not deliverable yet (an older same-id transaction is still open).
    fn match_completion(&self, t: TargetId, kind: ChannelKind, tagged_id: u32) -> Result<Option<(InitiatorId, TxnSerial)>> {
        let unroutable = XbarError::UnroutableCompletion {
            target: t,
            id: tagged_id,
        };
        let Some(i) = self.tagger.owner(tagged_id) else {
            return Err(unroutable);
        };
        let Some(serial) = self.txns.oldest_matching(i, t, kind, tagged_id) else {
            return Err(unroutable);
        };
        let Some(txn) = self.txns.get(serial) else {
            return Err(unroutable);
        };
        if kind == ChannelKind::Write && txn.state != TxnState::AwaitingCompletion {
            return Err(XbarError::protocol(
                Self::target_port_name(t, "B"),
                format!(
                    "write response for id {tagged_id:#x} after {} of {} data beats",
                    txn.beats_done, txn.beats
                ),
            ));
        }
        Ok(self
            .gate
            .is_oldest(i, kind, txn.raw_id, serial)
            .then_some((i, serial)))
    }

    /// Response phase, B channel.
    pub(super) fn route_write_responses(&mut self) -> Result<()> {
        let kind = ChannelKind::Write;
        let mut pending = Pending::new(self.num_initiators(), self.num_targets());
        for t in 0..self.num_targets() {
            let Some(resp) = self.targets[t].b.peek() else {
                continue;
            };
            if self.consume_orphan(t, kind, resp.id) {
                self.targets[t].b.get();
                continue;
            }
            if let Some((i, serial)) = self.match_completion(t, kind, resp.id)? {
                pending.offers[i][t] = Some(self.config.targets[t].priority);
                pending.matched[t] = Some(serial);
            }
        }

        for i in 0..self.num_initiators() {
            if self.initiators[i].b.blocked() {
                continue;
            }
            let local = self
                .local
                .find(i, kind, |c| self.gate.is_oldest(i, kind, c.raw_id, c.serial));
            let Some(source) = self.b_routers[i].select(&pending.offers[i], local.is_some()) else {
                continue;
            };
            match source {
                Source::Target(t) => {
                    let (Some(serial), Some(resp)) = (pending.matched[t], self.targets[t].b.get())
                    else {
                        continue;
                    };
                    let raw_id = self.txns.get(serial).map_or(0, |txn| txn.raw_id);
                    self.initiators[i].b.put(&WriteResp {
                        id: raw_id,
                        resp: resp.resp,
                    });
                    self.stats.targets[t].record_response();
                    self.finish_transaction(serial, resp.resp);
                }
                Source::Local => {
                    let Some((c, _)) = local.and_then(|idx| self.local.take_beat(i, kind, idx))
                    else {
                        continue;
                    };
                    self.initiators[i].b.put(&WriteResp {
                        id: c.raw_id,
                        resp: c.resp,
                    });
                    self.finish_local(i, kind, &c);
                }
            }
            self.b_routers[i].complete(source);
        }
        Ok(())
    }

    /// Response phase, R channel.  Beats of different ids interleave; each beat is arbitrated on
    /// its own.
    pub(super) fn route_read_data(&mut self) -> Result<()> {
        let kind = ChannelKind::Read;
        let mut pending = Pending::new(self.num_initiators(), self.num_targets());
        for t in 0..self.num_targets() {
            let Some(beat) = self.targets[t].r.peek() else {
                continue;
            };
            if self.consume_orphan(t, kind, beat.id) {
                self.targets[t].r.get();
                continue;
            }
            let Some((i, serial)) = self.match_completion(t, kind, beat.id)? else {
                continue;
            };
            if let Some(txn) = self.txns.get(serial) {
                let final_beat = txn.beats_done + 1 == txn.beats;
                if beat.last != final_beat {
                    return Err(XbarError::protocol(
                        Self::target_port_name(t, "R"),
                        format!(
                            "beat {} of {} for id {:#x} has last={}",
                            txn.beats_done + 1,
                            txn.beats,
                            beat.id,
                            beat.last
                        ),
                    ));
                }
            }
            pending.offers[i][t] = Some(self.config.targets[t].priority);
            pending.matched[t] = Some(serial);
        }

        for i in 0..self.num_initiators() {
            if self.initiators[i].r.blocked() {
                continue;
            }
            let local = self
                .local
                .find(i, kind, |c| self.gate.is_oldest(i, kind, c.raw_id, c.serial));
            let Some(source) = self.r_routers[i].select(&pending.offers[i], local.is_some()) else {
                continue;
            };
            match source {
                Source::Target(t) => {
                    let (Some(serial), Some(beat)) = (pending.matched[t], self.targets[t].r.get())
                    else {
                        continue;
                    };
                    let Some(txn) = self.txns.get_mut(serial) else {
                        continue;
                    };
                    let done = txn.read_beat();
                    self.initiators[i].r.put(&ReadBeat {
                        id: txn.raw_id,
                        ..beat
                    });
                    self.stats.initiators[i].record_read_beat();
                    self.stats.targets[t].record_read_beat();
                    if done {
                        self.stats.targets[t].record_response();
                        self.finish_transaction(serial, beat.resp);
                    }
                }
                Source::Local => {
                    let Some((c, last)) = local.and_then(|idx| self.local.take_beat(i, kind, idx))
                    else {
                        continue;
                    };
                    self.initiators[i].r.put(&ReadBeat {
                        id: c.raw_id,
                        data: 0,
                        resp: c.resp,
                        last,
                    });
                    self.stats.initiators[i].record_read_beat();
                    if last {
                        self.finish_local(i, kind, &c);
                    }
                }
            }
            self.r_routers[i].complete(source);
        }
        Ok(())
    }

    /// Retire a transaction whose final completion reached its initiator.
    fn finish_transaction(&mut self, serial: TxnSerial, resp: Resp) {
        let Some(txn) = self.txns.remove(serial) else {
            return;
        };
        self.watchdog.disarm(serial);
        self.gate.close(txn.initiator, txn.kind, txn.raw_id, serial);
        self.stats.initiators[txn.initiator].record_completion(txn.kind, resp, txn.admitted_at, self.cycle);
        debug!(
            "cycle {}: {} #{} target {} -> initiator {} id {:#x} {} after {} cycles",
            self.cycle,
            match txn.kind {
                ChannelKind::Write => "b",
                ChannelKind::Read => "r",
            },
            serial,
            txn.target,
            txn.initiator,
            txn.raw_id,
            resp.as_str(),
            self.cycle - txn.admitted_at
        );
        self.tracker.release(txn.slot);
    }

    fn finish_local(&mut self, i: InitiatorId, kind: ChannelKind, c: &LocalCompletion) {
        self.gate.close(i, kind, c.raw_id, c.serial);
        self.stats.initiators[i].record_completion(kind, c.resp, c.issued_at, self.cycle);
        debug!(
            "cycle {}: {} #{} local -> initiator {} id {:#x} {}",
            self.cycle,
            kind.short(),
            c.serial,
            i,
            c.raw_id,
            c.resp.as_str()
        );
    }
}
