use log::debug;
use smallvec::SmallVec;

use crate::xbar::completion::LocalCompletion;
use crate::xbar::config::Protocol;
use crate::xbar::error::{Result, XbarError};
use crate::xbar::id_gate::Destination;
use crate::xbar::route::Decode;
use crate::xbar::sequencer::{BurstSink, WriteBurst};
use crate::xbar::transaction::{PendingTransaction, TxnState};
use crate::xbar::types::{AddrRequest, ChannelKind, InitiatorId, Resp, TargetId};

use super::Interconnect;

/// A decoded request that passed every eligibility check and competes for its target.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    initiator: InitiatorId,
    req: AddrRequest,
    addr: u64,
}

impl Interconnect {
    fn request_port_peek(&self, i: InitiatorId, kind: ChannelKind) -> Option<AddrRequest> {
        match kind {
            ChannelKind::Write => self.initiators[i].aw.peek(),
            ChannelKind::Read => self.initiators[i].ar.peek(),
        }
    }

    fn request_port_take(&self, i: InitiatorId, kind: ChannelKind) -> Option<AddrRequest> {
        match kind {
            ChannelKind::Write => self.initiators[i].aw.get(),
            ChannelKind::Read => self.initiators[i].ar.get(),
        }
    }

    fn target_accepts(&self, t: TargetId, kind: ChannelKind) -> bool {
        let side = &self.targets[t];
        let blocked = match kind {
            ChannelKind::Write => side.aw.blocked(),
            ChannelKind::Read => side.ar.blocked(),
        };
        side.ready.is_ready() && !blocked
    }

    /// Enforce the burst rules of the configured protocol.  AXI4-Lite carries no ids, so the
    /// returned request has id 0.
    fn check_request(&self, i: InitiatorId, kind: ChannelKind, mut req: AddrRequest) -> Result<AddrRequest> {
        let channel = match kind {
            ChannelKind::Write => "AW",
            ChannelKind::Read => "AR",
        };
        match self.config.protocol {
            Protocol::Axi4Lite => {
                if req.len != 0 {
                    return Err(XbarError::protocol(
                        Self::initiator_port_name(i, channel),
                        format!("AXI4-Lite request with len {} at {:#x}", req.len, req.addr),
                    ));
                }
                req.id = 0;
            }
            Protocol::Axi4 => {
                let capacity = self.config.initiators[i].burst_capacity;
                if req.beats() > capacity {
                    return Err(XbarError::protocol(
                        Self::initiator_port_name(i, channel),
                        format!(
                            "burst of {} beats exceeds the port's {capacity}-beat capacity",
                            req.beats()
                        ),
                    ));
                }
            }
        }
        Ok(req)
    }

    /// Address phase for one channel: decode every offered request, answer unmapped ones locally,
    /// then run each target's arbiter over the eligible rest and admit the winners.
    pub(super) fn admit_requests(&mut self, kind: ChannelKind) -> Result<()> {
        let num_initiators = self.num_initiators();
        let mut contenders: Vec<SmallVec<[Candidate; 4]>> = vec![SmallVec::new(); self.num_targets()];

        for i in 0..num_initiators {
            if !self.initiators[i].ready.is_ready() {
                continue;
            }
            let Some(offered) = self.request_port_peek(i, kind) else {
                continue;
            };
            let req = self.check_request(i, kind, offered)?;

            match self.routes.resolve_for(i, kind, req.addr) {
                Decode::Unmapped => {
                    if self.gate.can_issue(i, kind, req.id, Destination::DecodeError) {
                        self.reject_unmapped(i, kind, req);
                    } else {
                        self.stats.initiators[i].record_order_stall();
                    }
                }
                Decode::Target { target, addr } => {
                    // collisions are systemic whether or not the request wins this step
                    self.tagger.tag(i, req.id)?;
                    if !self.target_accepts(target, kind) {
                        continue;
                    }
                    if self.tracker.is_full(i, target) {
                        self.stats.initiators[i].record_tracker_stall();
                        continue;
                    }
                    if !self.gate.can_issue(i, kind, req.id, Destination::Target(target)) {
                        self.stats.initiators[i].record_order_stall();
                        continue;
                    }
                    contenders[target].push(Candidate {
                        initiator: i,
                        req,
                        addr,
                    });
                }
            }
        }

        for (target, candidates) in contenders.into_iter().enumerate() {
            if candidates.is_empty() {
                continue;
            }
            let mut requests: SmallVec<[Option<u8>; 8]> = SmallVec::from_elem(None, num_initiators);
            for c in &candidates {
                requests[c.initiator] = Some(self.config.initiators[c.initiator].priority);
            }
            let arbiter = match kind {
                ChannelKind::Write => &mut self.aw_arbiters[target],
                ChannelKind::Read => &mut self.ar_arbiters[target],
            };
            let Some(winner) = arbiter.arbitrate(&requests) else {
                continue;
            };
            for c in candidates.iter().filter(|c| c.initiator != winner) {
                self.stats.initiators[c.initiator].record_arbitration_loss();
            }
            if let Some(c) = candidates.iter().find(|c| c.initiator == winner) {
                self.admit(*c, target, kind)?;
            }
            // the target port was free, so the handshake completes in the granting step
            match kind {
                ChannelKind::Write => self.aw_arbiters[target].release(winner),
                ChannelKind::Read => self.ar_arbiters[target].release(winner),
            }
        }
        Ok(())
    }

    /// Take the granted request off the initiator port and hand it to the target.
    fn admit(&mut self, c: Candidate, target: TargetId, kind: ChannelKind) -> Result<()> {
        let i = c.initiator;
        let Ok(slot) = self.tracker.try_admit(i, target) else {
            debug_assert!(false, "granted a request on a full pair");
            return Ok(());
        };
        let tagged_id = self.tagger.tag(i, c.req.id)?;
        let forwarded = AddrRequest {
            id: tagged_id,
            addr: c.addr,
            ..c.req
        };
        let sent = match kind {
            ChannelKind::Write => self.targets[target].aw.put(&forwarded),
            ChannelKind::Read => self.targets[target].ar.put(&forwarded),
        };
        debug_assert!(sent, "granted onto a blocked target port");
        self.request_port_take(i, kind);

        let serial = self.next_serial;
        self.next_serial += 1;
        let beats = c.req.beats();
        self.gate
            .open(i, kind, c.req.id, Destination::Target(target), serial);
        let deadline = self.watchdog.arm(serial, self.cycle);
        self.txns.insert(PendingTransaction {
            serial,
            raw_id: c.req.id,
            tagged_id,
            initiator: i,
            target,
            kind,
            beats,
            beats_done: 0,
            slot,
            admitted_at: self.cycle,
            deadline,
            state: TxnState::Admitted,
        });
        if kind == ChannelKind::Write {
            self.sequencer.bind(
                i,
                WriteBurst::new(serial, c.req.id, beats, BurstSink::Target(target))
                    .issued_at(self.cycle),
            );
        }
        self.stats.initiators[i].record_issue(kind);
        self.stats.targets[target].record_grant(kind);
        debug!(
            "cycle {}: a{} #{} initiator {} -> target {} id {:#x}->{:#x} addr {:#x} beats {}",
            self.cycle,
            kind.short(),
            serial,
            i,
            target,
            c.req.id,
            tagged_id,
            c.addr,
            beats
        );
        Ok(())
    }

    /// Consume an unmapped request without forwarding it.  No tracker slot is taken; the DECERR
    /// completion comes from the local responder (after the write burst has been absorbed).
    fn reject_unmapped(&mut self, i: InitiatorId, kind: ChannelKind, req: AddrRequest) {
        self.request_port_take(i, kind);
        let serial = self.next_serial;
        self.next_serial += 1;
        self.gate
            .open(i, kind, req.id, Destination::DecodeError, serial);
        match kind {
            ChannelKind::Write => self.sequencer.bind(
                i,
                WriteBurst::new(serial, req.id, req.beats(), BurstSink::Discard(Resp::DecErr))
                    .issued_at(self.cycle),
            ),
            ChannelKind::Read => self.local.push(
                i,
                kind,
                LocalCompletion {
                    serial,
                    raw_id: req.id,
                    resp: Resp::DecErr,
                    beats: req.beats(),
                    issued_at: self.cycle,
                },
            ),
        }
        self.stats.initiators[i].record_issue(kind);
        self.stats.initiators[i].record_decode_error();
        debug!(
            "cycle {}: a{} #{} initiator {} addr {:#x} unmapped, DECERR",
            self.cycle,
            kind.short(),
            serial,
            i,
            req.addr
        );
    }
}
