use std::collections::VecDeque;

use crate::timeq::Cycle;

use super::error::XbarError;
use super::types::{InitiatorId, Resp, TargetId, TxnSerial, WriteBeat};

/// Where the beats of a granted write burst go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstSink {
    Target(TargetId),
    /// Beats are absorbed and the burst completes locally with `Resp`.  Used for decode errors and
    /// for bursts whose transaction timed out mid-data.
    Discard(Resp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBurst {
    pub serial: TxnSerial,
    pub raw_id: u32,
    pub beats: u32,
    pub sent: u32,
    pub sink: BurstSink,
    /// Cycle the burst's address phase was accepted.
    pub issued_at: Cycle,
}

impl WriteBurst {
    pub fn new(serial: TxnSerial, raw_id: u32, beats: u32, sink: BurstSink) -> Self {
        Self {
            serial,
            raw_id,
            beats,
            sent: 0,
            sink,
            issued_at: 0,
        }
    }

    pub fn issued_at(mut self, cycle: Cycle) -> Self {
        self.issued_at = cycle;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatRoute {
    Forward {
        target: TargetId,
        serial: TxnSerial,
        last: bool,
    },
    Absorb {
        serial: TxnSerial,
        last: bool,
        resp: Resp,
    },
}

/// One entry of a target's write-data order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetTurn {
    Burst(TxnSerial),
    /// The burst timed out after its address reached the target.  The core completes it with
    /// `remaining` null-strobe beats so later bursts line up with their addresses.
    Filler {
        serial: TxnSerial,
        tagged_id: u32,
        remaining: u32,
    },
}

/// Binds write-data bursts to address grants.
///
/// Each initiator's bursts are consumed in the order its AW requests were granted, and each target
/// accepts bursts in the order it granted them.  A beat moves only when its burst heads both
/// queues; grants are totally ordered, so the two orders can never wait on each other in a cycle.
#[derive(Debug, Clone)]
pub struct DataSequencer {
    per_initiator: Vec<VecDeque<WriteBurst>>,
    per_target: Vec<VecDeque<TargetTurn>>,
}

impl DataSequencer {
    pub fn new(num_initiators: usize, num_targets: usize) -> Self {
        Self {
            per_initiator: vec![VecDeque::new(); num_initiators],
            per_target: vec![VecDeque::new(); num_targets],
        }
    }

    pub fn bind(&mut self, initiator: InitiatorId, burst: WriteBurst) {
        if let BurstSink::Target(target) = burst.sink {
            self.per_target[target].push_back(TargetTurn::Burst(burst.serial));
        }
        self.per_initiator[initiator].push_back(burst);
    }

    /// Decide where the next beat from `initiator` goes without consuming it.  `Ok(None)` means the
    /// beat has to wait: no grant yet, or the target is still taking another initiator's burst.
    pub fn route(&self, initiator: InitiatorId, beat: &WriteBeat) -> Result<Option<BeatRoute>, XbarError> {
        let Some(head) = self.per_initiator[initiator].front() else {
            return Ok(None);
        };
        if let Some(id) = beat.id {
            if id != head.raw_id {
                return Err(XbarError::ordering(
                    initiator,
                    format!(
                        "beat tagged id {id:#x} but the next granted burst is id {:#x}",
                        head.raw_id
                    ),
                ));
            }
        }
        let index = head.sent + 1;
        let final_beat = index == head.beats;
        if beat.last != final_beat {
            return Err(XbarError::ordering(
                initiator,
                format!(
                    "beat {index} of {} for id {:#x} has last={}",
                    head.beats, head.raw_id, beat.last
                ),
            ));
        }
        let route = match head.sink {
            BurstSink::Discard(resp) => Some(BeatRoute::Absorb {
                serial: head.serial,
                last: final_beat,
                resp,
            }),
            BurstSink::Target(target) => (self.per_target[target].front()
                == Some(&TargetTurn::Burst(head.serial)))
                .then_some(BeatRoute::Forward {
                    target,
                    serial: head.serial,
                    last: final_beat,
                }),
        };
        Ok(route)
    }

    /// Account one transferred beat for the head burst of `initiator`.  Returns the burst once its
    /// final beat has gone through.
    pub fn commit(&mut self, initiator: InitiatorId) -> Option<WriteBurst> {
        let head = self.per_initiator[initiator].front_mut()?;
        head.sent += 1;
        if head.sent < head.beats {
            return None;
        }
        let done = self.per_initiator[initiator].pop_front()?;
        if let BurstSink::Target(target) = done.sink {
            let popped = self.per_target[target].pop_front();
            debug_assert_eq!(popped, Some(TargetTurn::Burst(done.serial)));
        }
        Some(done)
    }

    /// Stop forwarding the burst `serial`: the rest of the initiator's beats are absorbed and it
    /// completes with `resp`.  The target already holds the address, so its turn becomes filler
    /// beats tagged `tagged_id` that keep its write data in address order.  Returns false if the
    /// burst already finished its data phase.
    pub fn drain(&mut self, initiator: InitiatorId, serial: TxnSerial, tagged_id: u32, resp: Resp) -> bool {
        let Some(burst) = self.per_initiator[initiator]
            .iter_mut()
            .find(|b| b.serial == serial)
        else {
            return false;
        };
        if let BurstSink::Target(target) = burst.sink {
            let remaining = burst.beats - burst.sent;
            if let Some(turn) = self.per_target[target]
                .iter_mut()
                .find(|turn| **turn == TargetTurn::Burst(serial))
            {
                *turn = TargetTurn::Filler {
                    serial,
                    tagged_id,
                    remaining,
                };
            }
        }
        burst.sink = BurstSink::Discard(resp);
        true
    }

    /// Filler beat owed to `target`, if its next turn belongs to a drained burst.
    pub fn filler(&self, target: TargetId) -> Option<WriteBeat> {
        match self.per_target[target].front()? {
            TargetTurn::Filler {
                tagged_id,
                remaining,
                ..
            } => Some(WriteBeat {
                data: 0,
                strb: 0,
                last: *remaining == 1,
                id: Some(*tagged_id),
            }),
            TargetTurn::Burst(_) => None,
        }
    }

    /// Account one filler beat sent to `target`.  Returns the drained burst's serial after its
    /// final beat.
    pub fn commit_filler(&mut self, target: TargetId) -> Option<TxnSerial> {
        let queue = &mut self.per_target[target];
        let Some(TargetTurn::Filler {
            serial, remaining, ..
        }) = queue.front_mut()
        else {
            return None;
        };
        *remaining -= 1;
        if *remaining > 0 {
            return None;
        }
        let serial = *serial;
        queue.pop_front();
        Some(serial)
    }

    /// Filler beats the core still owes to targets.
    pub fn fillers_owed(&self) -> u32 {
        self.per_target
            .iter()
            .flatten()
            .map(|turn| match turn {
                TargetTurn::Filler { remaining, .. } => *remaining,
                TargetTurn::Burst(_) => 0,
            })
            .sum()
    }

    pub fn pending(&self, initiator: InitiatorId) -> usize {
        self.per_initiator[initiator].len()
    }
}
