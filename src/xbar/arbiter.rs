/// Priority arbiter with round-robin tie breaking.
///
/// Each call to `arbitrate` receives one entry per requester: `Some(priority)` when that requester
/// is eligible this step.  The highest priority class wins; inside a class the search starts just
/// after the last requester whose grant completed.  A grant is held across steps until the
/// requester completes its handshake (`release`) or stops asking.
#[derive(Debug, Clone)]
pub struct Arbiter {
    num_requesters: usize,
    last_granted: Option<usize>,
    held: Option<usize>,
}

impl Arbiter {
    pub fn new(num_requesters: usize) -> Self {
        assert!(num_requesters > 0, "arbiter needs at least one requester");
        Self {
            num_requesters,
            last_granted: None,
            held: None,
        }
    }

    #[cfg(test)]
    pub fn held(&self) -> Option<usize> {
        self.held
    }

    #[cfg(test)]
    pub fn last_granted(&self) -> Option<usize> {
        self.last_granted
    }

    pub fn arbitrate(&mut self, requests: &[Option<u8>]) -> Option<usize> {
        debug_assert_eq!(requests.len(), self.num_requesters);
        if let Some(held) = self.held {
            if requests.get(held).is_some_and(Option::is_some) {
                return Some(held);
            }
            // requester went away without a handshake: drop the grant, keep the rotation
            self.held = None;
        }

        let top = requests.iter().flatten().copied().max()?;

        let n = self.num_requesters;
        let start = self.last_granted.map_or(0, |last| (last + 1) % n);
        let winner = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&idx| requests.get(idx).copied().flatten() == Some(top))?;
        self.held = Some(winner);
        Some(winner)
    }

    /// The granted requester completed its handshake; rotate past it.
    pub fn release(&mut self, idx: usize) {
        if self.held == Some(idx) {
            self.held = None;
            self.last_granted = Some(idx);
        }
    }
}
