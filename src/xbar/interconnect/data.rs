use log::debug;

use crate::xbar::completion::LocalCompletion;
use crate::xbar::error::Result;
use crate::xbar::sequencer::BeatRoute;
use crate::xbar::types::{ChannelKind, WriteBeat};

use super::Interconnect;

impl Interconnect {
    /// Finish drained bursts at their targets, one null-strobe beat per target per step.
    fn send_fillers(&mut self) {
        for t in 0..self.num_targets() {
            let Some(beat) = self.sequencer.filler(t) else {
                continue;
            };
            if !self.targets[t].w.put(&beat) {
                continue;
            }
            self.stats.targets[t].record_write_beat();
            if let Some(serial) = self.sequencer.commit_filler(t) {
                debug!(
                    "cycle {}: w #{} target {} filled after timeout",
                    self.cycle, serial, t
                );
            }
        }
    }

    /// Write-data phase: move at most one beat per initiator, in the order the sequencer allows.
    pub(super) fn sequence_write_data(&mut self) -> Result<()> {
        self.send_fillers();
        for i in 0..self.num_initiators() {
            if !self.initiators[i].ready.is_ready() {
                continue;
            }
            let Some(beat) = self.initiators[i].w.peek() else {
                continue;
            };
            match self.sequencer.route(i, &beat)? {
                None => {}
                Some(BeatRoute::Forward { target, serial, last }) => {
                    let tagged_id = self.txns.get(serial).map(|txn| txn.tagged_id);
                    let forwarded = WriteBeat {
                        id: tagged_id,
                        ..beat
                    };
                    if !self.targets[target].w.put(&forwarded) {
                        continue;
                    }
                    self.initiators[i].w.get();
                    self.sequencer.commit(i);
                    if let Some(txn) = self.txns.get_mut(serial) {
                        txn.data_beat(last);
                    }
                    self.stats.initiators[i].record_write_beat();
                    self.stats.targets[target].record_write_beat();
                    if last {
                        debug!(
                            "cycle {}: w #{} initiator {} -> target {} last beat",
                            self.cycle, serial, i, target
                        );
                    }
                }
                Some(BeatRoute::Absorb { serial, last, resp }) => {
                    self.initiators[i].w.get();
                    let done = self.sequencer.commit(i);
                    self.stats.initiators[i].record_write_beat();
                    if let (true, Some(burst)) = (last, done) {
                        self.local.push(
                            i,
                            ChannelKind::Write,
                            LocalCompletion {
                                serial,
                                raw_id: burst.raw_id,
                                resp,
                                beats: 1,
                                issued_at: burst.issued_at,
                            },
                        );
                        debug!(
                            "cycle {}: w #{} initiator {} burst absorbed, {} queued",
                            self.cycle,
                            serial,
                            i,
                            resp.as_str()
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
