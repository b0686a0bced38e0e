use std::collections::VecDeque;

use log::trace;
use smallvec::SmallVec;

use crate::timeq::Cycle;

use super::arbiter::Arbiter;
use super::config::XbarConfig;
use super::error::XbarError;
use super::types::{ChannelKind, InitiatorId, Resp, TargetId, TxnSerial};

/// Tags transaction identifiers with their initiator's mask on the way to a target and recovers
/// the owner from the tag on the way back.
#[derive(Debug, Clone)]
pub struct IdTagger {
    masks: Vec<u32>,
    // union of every initiator's mask bits
    tag_field: u32,
}

impl IdTagger {
    pub fn new(config: &XbarConfig) -> Self {
        let masks: Vec<u32> = config.initiators.iter().map(|ini| ini.id_mask).collect();
        let tag_field = masks.iter().fold(0, |acc, m| acc | m);
        Self { masks, tag_field }
    }

    pub fn mask(&self, initiator: InitiatorId) -> u32 {
        self.masks[initiator]
    }

    /// Identifier the target will see.  A raw id carrying another initiator's tag bits could come
    /// back attributed to that initiator, so it is refused.
    pub fn tag(&self, initiator: InitiatorId, raw: u32) -> Result<u32, XbarError> {
        let own = self.masks[initiator];
        if raw & self.tag_field & !own != 0 {
            return Err(XbarError::IdCollision { initiator, id: raw });
        }
        Ok(raw | own)
    }

    /// The initiator whose mask bits are all present in `tagged`.  Configuration validation rules
    /// out nested masks, so a tag produced by `tag` has exactly one owner.
    pub fn owner(&self, tagged: u32) -> Option<InitiatorId> {
        let mut owners = self
            .masks
            .iter()
            .enumerate()
            .filter(|(_, &mask)| tagged & mask == mask)
            .map(|(i, _)| i);
        let first = owners.next()?;
        owners.next().is_none().then_some(first)
    }
}

/// A completion synthesized inside the interconnect: `DECERR` for decode errors, `SLVERR` for
/// watchdog faults.  `beats` counts what is still owed to the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCompletion {
    pub serial: TxnSerial,
    pub raw_id: u32,
    pub resp: Resp,
    pub beats: u32,
    pub issued_at: Cycle,
}

#[derive(Debug, Clone)]
pub struct LocalResponder {
    write: Vec<VecDeque<LocalCompletion>>,
    read: Vec<VecDeque<LocalCompletion>>,
}

impl LocalResponder {
    pub fn new(num_initiators: usize) -> Self {
        Self {
            write: vec![VecDeque::new(); num_initiators],
            read: vec![VecDeque::new(); num_initiators],
        }
    }

    fn queue(&self, initiator: InitiatorId, kind: ChannelKind) -> &VecDeque<LocalCompletion> {
        match kind {
            ChannelKind::Write => &self.write[initiator],
            ChannelKind::Read => &self.read[initiator],
        }
    }

    fn queue_mut(&mut self, initiator: InitiatorId, kind: ChannelKind) -> &mut VecDeque<LocalCompletion> {
        match kind {
            ChannelKind::Write => &mut self.write[initiator],
            ChannelKind::Read => &mut self.read[initiator],
        }
    }

    pub fn push(&mut self, initiator: InitiatorId, kind: ChannelKind, completion: LocalCompletion) {
        debug_assert!(completion.beats > 0);
        self.queue_mut(initiator, kind).push_back(completion);
    }

    /// Position of the first queued completion that `deliverable` accepts.  Entries behind a
    /// blocked one stay reachable, so a fault waiting on an older same-id transaction never holds
    /// up unrelated ids.
    pub fn find<F>(&self, initiator: InitiatorId, kind: ChannelKind, deliverable: F) -> Option<usize>
    where
        F: Fn(&LocalCompletion) -> bool,
    {
        self.queue(initiator, kind).iter().position(deliverable)
    }

    /// Hand out one beat of the completion at `index`.  The flag is true on its final beat, at
    /// which point the entry is gone.
    pub fn take_beat(
        &mut self,
        initiator: InitiatorId,
        kind: ChannelKind,
        index: usize,
    ) -> Option<(LocalCompletion, bool)> {
        let queue = self.queue_mut(initiator, kind);
        let entry = queue.get_mut(index)?;
        entry.beats -= 1;
        if entry.beats > 0 {
            return Some((*entry, false));
        }
        queue.remove(index).map(|c| (c, true))
    }

    pub fn pending(&self, initiator: InitiatorId) -> usize {
        self.write[initiator].len() + self.read[initiator].len()
    }
}

/// Source of a completion competing for one initiator's response channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Target(TargetId),
    Local,
}

/// One per initiator per response channel.  Arbitrates among the targets (and the local
/// responder, which sits after the last target at priority 0) holding a completion for this
/// initiator.
#[derive(Debug, Clone)]
pub struct CompletionRouter {
    initiator: InitiatorId,
    kind: ChannelKind,
    num_targets: usize,
    arbiter: Arbiter,
    delivered: u64,
}

impl CompletionRouter {
    pub fn new(initiator: InitiatorId, kind: ChannelKind, num_targets: usize) -> Self {
        Self {
            initiator,
            kind,
            num_targets,
            arbiter: Arbiter::new(num_targets + 1),
            delivered: 0,
        }
    }

    /// `targets[t]` is the priority of target `t` when it holds a deliverable completion for this
    /// initiator.
    pub fn select(&mut self, targets: &[Option<u8>], local_ready: bool) -> Option<Source> {
        debug_assert_eq!(targets.len(), self.num_targets);
        let mut requests: SmallVec<[Option<u8>; 9]> = targets.iter().copied().collect();
        requests.push(local_ready.then_some(0));
        self.arbiter.arbitrate(&requests).map(|idx| {
            if idx == self.num_targets {
                Source::Local
            } else {
                Source::Target(idx)
            }
        })
    }

    pub fn complete(&mut self, source: Source) {
        let idx = match source {
            Source::Target(t) => t,
            Source::Local => self.num_targets,
        };
        self.arbiter.release(idx);
        self.delivered = self.delivered.saturating_add(1);
        trace!(
            "initiator {} {}: completion from {:?}",
            self.initiator,
            self.kind.short(),
            source
        );
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}
