use std::collections::{BTreeSet, HashMap};

use crate::timeq::Cycle;

use super::types::TxnSerial;

/// One countdown per outstanding transaction.  A timer armed at cycle `c` expires at
/// `c + timeout`; a disabled watchdog never arms anything.
#[derive(Debug, Clone)]
pub struct Watchdog {
    enabled: bool,
    timeout: Cycle,
    deadlines: HashMap<TxnSerial, Cycle>,
    // (deadline, serial): iteration order is expiry order, ties broken by grant order
    queue: BTreeSet<(Cycle, TxnSerial)>,
}

impl Watchdog {
    pub fn new(enabled: bool, timeout: Cycle) -> Self {
        Self {
            enabled,
            timeout,
            deadlines: HashMap::new(),
            queue: BTreeSet::new(),
        }
    }

    /// Returns the deadline, or None when the watchdog is disabled.
    pub fn arm(&mut self, serial: TxnSerial, now: Cycle) -> Option<Cycle> {
        if !self.enabled {
            return None;
        }
        let deadline = now.saturating_add(self.timeout);
        if let Some(old) = self.deadlines.insert(serial, deadline) {
            self.queue.remove(&(old, serial));
        }
        self.queue.insert((deadline, serial));
        Some(deadline)
    }

    pub fn disarm(&mut self, serial: TxnSerial) -> bool {
        match self.deadlines.remove(&serial) {
            Some(deadline) => {
                self.queue.remove(&(deadline, serial));
                true
            }
            None => false,
        }
    }

    /// Remove and return every timer whose deadline is at or before `now`, oldest first.
    pub fn expired(&mut self, now: Cycle) -> Vec<TxnSerial> {
        let mut fired = Vec::new();
        while let Some(&(deadline, serial)) = self.queue.first() {
            if deadline > now {
                break;
            }
            self.queue.pop_first();
            self.deadlines.remove(&serial);
            fired.push(serial);
        }
        fired
    }

    #[cfg(test)]
    pub fn armed(&self) -> usize {
        self.deadlines.len()
    }
}
