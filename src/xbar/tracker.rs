use super::config::XbarConfig;
use super::types::{InitiatorId, TargetId};

/// Handle for one admitted transaction.  Not `Clone`: a slot can be released exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Slot {
    initiator: InitiatorId,
    target: TargetId,
}

impl Slot {
    pub fn initiator(&self) -> InitiatorId {
        self.initiator
    }

    pub fn target(&self) -> TargetId {
        self.target
    }
}

/// Admission refused because the pair has `depth` transactions in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full {
    pub initiator: InitiatorId,
    pub target: TargetId,
    pub depth: usize,
}

/// One bounded counter per (initiator, target) pair, stored flat and indexed
/// `initiator * num_targets + target`.  Pairs that are not routable have depth zero.
#[derive(Debug, Clone)]
pub struct OutstandingTracker {
    num_targets: usize,
    depth: Vec<usize>,
    count: Vec<usize>,
    peak: Vec<usize>,
}

impl OutstandingTracker {
    pub fn new(config: &XbarConfig) -> Self {
        let num_targets = config.num_targets();
        let depth: Vec<usize> = (0..config.num_initiators())
            .flat_map(|i| (0..num_targets).map(move |t| (i, t)))
            .map(|(i, t)| config.pair_depth(i, t))
            .collect();
        let pairs = depth.len();
        Self {
            num_targets,
            depth,
            count: vec![0; pairs],
            peak: vec![0; pairs],
        }
    }

    fn index(&self, initiator: InitiatorId, target: TargetId) -> usize {
        assert!(target < self.num_targets, "target {target} out of range");
        initiator * self.num_targets + target
    }

    pub fn try_admit(&mut self, initiator: InitiatorId, target: TargetId) -> Result<Slot, Full> {
        let idx = self.index(initiator, target);
        if self.count[idx] >= self.depth[idx] {
            return Err(Full {
                initiator,
                target,
                depth: self.depth[idx],
            });
        }
        self.count[idx] += 1;
        self.peak[idx] = self.peak[idx].max(self.count[idx]);
        Ok(Slot { initiator, target })
    }

    pub fn release(&mut self, slot: Slot) {
        let idx = self.index(slot.initiator, slot.target);
        debug_assert!(self.count[idx] > 0, "release on an empty pair");
        self.count[idx] = self.count[idx].saturating_sub(1);
    }

    pub fn is_full(&self, initiator: InitiatorId, target: TargetId) -> bool {
        let idx = self.index(initiator, target);
        self.count[idx] >= self.depth[idx]
    }

    pub fn count(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.count[self.index(initiator, target)]
    }

    pub fn depth(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.depth[self.index(initiator, target)]
    }

    pub fn peak(&self, initiator: InitiatorId, target: TargetId) -> usize {
        self.peak[self.index(initiator, target)]
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.count.iter().sum()
    }
}
