use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::base::behavior::ModuleBehaviors;
use crate::sim::trace::CompletionRecord;
use crate::timeq::Cycle;
use crate::xbar::ports::InitiatorHandle;
use crate::xbar::types::{AddrRequest, ChannelKind, InitiatorId, Resp, WriteBeat};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrafficOp {
    #[default]
    Read,
    Write,
    /// Reads and writes in random order.
    Mixed,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficPatternConfig {
    pub initiator: InitiatorId,
    pub op: TrafficOp,
    pub count: u32,
    pub base: u64,
    pub stride: u64,
    /// Addresses wrap within `[base, base + span)`; zero disables wrapping.
    pub span: u64,
    /// Beats per burst minus one.
    pub len: u8,
    /// Transaction ids cycle through `0..id_count`.
    pub id_count: u32,
    /// Draw addresses uniformly from the span instead of striding.
    pub random: bool,
    pub seed: u64,
    pub max_inflight: usize,
}

impl Default for TrafficPatternConfig {
    fn default() -> Self {
        Self {
            initiator: 0,
            op: TrafficOp::Read,
            count: 64,
            base: 0,
            stride: 64,
            span: 0,
            len: 0,
            id_count: 4,
            random: false,
            seed: 0,
            max_inflight: 8,
        }
    }
}

/// Value written to `addr` by every driver, so any read can be checked without knowing who
/// wrote last.
pub fn data_for(addr: u64) -> u64 {
    addr.wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(17)
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DriverStats {
    pub issued: u64,
    pub okay: u64,
    pub decerr: u64,
    pub slverr: u64,
    pub read_beats: u64,
    pub mismatches: u64,
}

#[derive(Debug, Clone, Copy)]
struct Inflight {
    addr: u64,
    req: AddrRequest,
    issued_at: Cycle,
    beats_seen: u32,
    resp: Resp,
}

/// Drives one initiator port from a list of patterns, run back to back.
pub struct TrafficDriver {
    initiator: InitiatorId,
    handle: InitiatorHandle,
    patterns: VecDeque<TrafficPatternConfig>,
    rng: StdRng,
    issued_in_pattern: u32,
    aw: Option<AddrRequest>,
    ar: Option<AddrRequest>,
    w: VecDeque<WriteBeat>,
    // per (channel, raw id): transactions in issue order
    inflight: HashMap<(ChannelKind, u32), VecDeque<Inflight>>,
    inflight_count: usize,
    completions: Vec<CompletionRecord>,
    stats: DriverStats,
    now: Cycle,
}

impl TrafficDriver {
    pub fn new(initiator: InitiatorId, handle: InitiatorHandle, patterns: Vec<TrafficPatternConfig>) -> Self {
        let seed = patterns.first().map_or(0, |p| p.seed);
        handle.signal_ready();
        Self {
            initiator,
            handle,
            patterns: patterns.into(),
            rng: StdRng::seed_from_u64(seed),
            issued_in_pattern: 0,
            aw: None,
            ar: None,
            w: VecDeque::new(),
            inflight: HashMap::new(),
            inflight_count: 0,
            completions: Vec::new(),
            stats: DriverStats::default(),
            now: 0,
        }
    }

    pub fn initiator(&self) -> InitiatorId {
        self.initiator
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// All patterns issued and every transaction answered.
    pub fn finished(&self) -> bool {
        self.patterns.is_empty()
            && self.inflight_count == 0
            && self.aw.is_none()
            && self.ar.is_none()
            && self.w.is_empty()
    }

    pub fn drain_completions(&mut self) -> std::vec::Drain<'_, CompletionRecord> {
        self.completions.drain(..)
    }

    fn next_request(&mut self) -> Option<(ChannelKind, AddrRequest)> {
        let pattern = self.patterns.front()?.clone();
        if self.issued_in_pattern >= pattern.count {
            info!(
                "initiator {}: pattern done at cycle {}",
                self.initiator, self.now
            );
            self.patterns.pop_front();
            self.issued_in_pattern = 0;
            if let Some(next) = self.patterns.front() {
                self.rng = StdRng::seed_from_u64(next.seed);
            }
            return None;
        }
        if self.inflight_count >= pattern.max_inflight.max(1) {
            return None;
        }

        let kind = match pattern.op {
            TrafficOp::Read => ChannelKind::Read,
            TrafficOp::Write => ChannelKind::Write,
            TrafficOp::Mixed if self.rng.gen_bool(0.5) => ChannelKind::Write,
            TrafficOp::Mixed => ChannelKind::Read,
        };
        let free = match kind {
            ChannelKind::Write => self.aw.is_none(),
            ChannelKind::Read => self.ar.is_none(),
        };
        if !free {
            return None;
        }

        let n = self.issued_in_pattern as u64;
        let offset = if pattern.random && pattern.span > 0 {
            self.rng.gen_range(0..pattern.span)
        } else if pattern.span > 0 {
            n.wrapping_mul(pattern.stride) % pattern.span
        } else {
            n.wrapping_mul(pattern.stride)
        };
        let addr = pattern.base.wrapping_add(offset) & !7;
        let id = self.issued_in_pattern % pattern.id_count.max(1);
        self.issued_in_pattern += 1;
        Some((kind, AddrRequest::new(id, addr, pattern.len)))
    }

    fn issue(&mut self) {
        let Some((kind, req)) = self.next_request() else {
            return;
        };
        match kind {
            ChannelKind::Write => {
                for beat in 0..req.beats() {
                    let last = beat + 1 == req.beats();
                    self.w
                        .push_back(WriteBeat::new(data_for(req.beat_addr(beat)), last));
                }
                self.aw = Some(req);
            }
            ChannelKind::Read => self.ar = Some(req),
        }
        self.inflight
            .entry((kind, req.id))
            .or_default()
            .push_back(Inflight {
                addr: req.addr,
                req,
                issued_at: self.now,
                beats_seen: 0,
                resp: Resp::Okay,
            });
        self.inflight_count += 1;
        self.stats.issued += 1;
        debug!(
            "initiator {}: a{} id {} addr {:#x} len {} at {}",
            self.initiator,
            kind.short(),
            req.id,
            req.addr,
            req.len,
            self.now
        );
    }

    fn retire(&mut self, kind: ChannelKind, txn: Inflight) {
        self.inflight_count -= 1;
        match txn.resp {
            Resp::Okay | Resp::ExOkay => self.stats.okay += 1,
            Resp::DecErr => self.stats.decerr += 1,
            Resp::SlvErr => self.stats.slverr += 1,
        }
        self.completions.push(CompletionRecord {
            initiator: self.initiator,
            kind,
            id: txn.req.id,
            addr: txn.addr,
            beats: txn.req.beats(),
            resp: txn.resp,
            issued_at: txn.issued_at,
            completed_at: self.now,
        });
    }

    fn collect(&mut self) {
        if let Some(resp) = self.handle.recv_b() {
            let txn = self
                .inflight
                .get_mut(&(ChannelKind::Write, resp.id))
                .and_then(VecDeque::pop_front);
            match txn {
                Some(mut txn) => {
                    txn.resp = resp.resp;
                    self.retire(ChannelKind::Write, txn);
                }
                None => warn!("initiator {}: unexpected b id {}", self.initiator, resp.id),
            }
        }

        if let Some(beat) = self.handle.recv_r() {
            let key = (ChannelKind::Read, beat.id);
            let Some(txn) = self.inflight.get_mut(&key).and_then(|q| q.front_mut()) else {
                warn!("initiator {}: unexpected r id {}", self.initiator, beat.id);
                return;
            };
            let addr = txn.req.beat_addr(txn.beats_seen);
            txn.beats_seen += 1;
            if beat.resp.is_error() {
                txn.resp = beat.resp;
            } else if beat.data != 0 && beat.data != data_for(addr) {
                self.stats.mismatches += 1;
                warn!(
                    "initiator {}: read {:#x} returned {:#x}, expected {:#x}",
                    self.initiator,
                    addr,
                    beat.data,
                    data_for(addr)
                );
            }
            self.stats.read_beats += 1;
            if beat.last {
                if let Some(txn) = self.inflight.get_mut(&key).and_then(VecDeque::pop_front) {
                    self.retire(ChannelKind::Read, txn);
                }
            }
        }
    }

    fn push(&mut self) {
        if let Some(req) = self.aw {
            if self.handle.send_aw(&req) {
                self.aw = None;
            }
        }
        if let Some(req) = self.ar {
            if self.handle.send_ar(&req) {
                self.ar = None;
            }
        }
        if let Some(beat) = self.w.front() {
            if self.handle.send_w(beat) {
                self.w.pop_front();
            }
        }
    }
}

impl ModuleBehaviors for TrafficDriver {
    fn tick_one(&mut self) {
        self.now += 1;
        self.collect();
        self.issue();
        self.push();
    }

    fn reset(&mut self) {
        self.aw = None;
        self.ar = None;
        self.w.clear();
        self.inflight.clear();
        self.inflight_count = 0;
        self.completions.clear();
        self.stats = DriverStats::default();
        self.issued_in_pattern = 0;
        self.now = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbar::config::{InitiatorConfig, TargetConfig, XbarConfig};
    use crate::xbar::interconnect::Interconnect;

    fn driver(pattern: TrafficPatternConfig) -> (Interconnect, TrafficDriver) {
        let xbar = Interconnect::new(XbarConfig {
            initiators: vec![InitiatorConfig {
                id_mask: 0x100,
                ..InitiatorConfig::default()
            }],
            targets: vec![TargetConfig::default()],
            ..XbarConfig::default()
        })
        .unwrap();
        let drv = TrafficDriver::new(0, xbar.initiator(0), vec![pattern]);
        (xbar, drv)
    }

    #[test]
    fn strided_addresses_wrap_in_span() {
        let (_xbar, mut drv) = driver(TrafficPatternConfig {
            count: 6,
            base: 0x100,
            stride: 0x40,
            span: 0x100,
            max_inflight: 64,
            ..TrafficPatternConfig::default()
        });
        let addrs: Vec<u64> = std::iter::from_fn(|| {
            drv.ar = None;
            drv.next_request().map(|(_, req)| req.addr)
        })
        .collect();
        assert_eq!(addrs, vec![0x100, 0x140, 0x180, 0x1c0, 0x100, 0x140]);
    }

    #[test]
    fn write_queues_one_beat_per_burst_beat() {
        let (_xbar, mut drv) = driver(TrafficPatternConfig {
            op: TrafficOp::Write,
            count: 1,
            len: 3,
            ..TrafficPatternConfig::default()
        });
        drv.issue();
        assert_eq!(drv.w.len(), 4);
        assert!(drv.w.back().is_some_and(|b| b.last));
        assert_eq!(drv.w[1].data, data_for(8));
        assert!(!drv.finished());
    }

    #[test]
    fn random_addresses_repeat_with_seed() {
        let pattern = TrafficPatternConfig {
            random: true,
            span: 0x1000,
            seed: 7,
            count: 16,
            max_inflight: 64,
            ..TrafficPatternConfig::default()
        };
        let run = |pattern: TrafficPatternConfig| {
            let (_xbar, mut drv) = driver(pattern);
            std::iter::from_fn(|| {
                drv.ar = None;
                drv.next_request().map(|(_, req)| req.addr)
            })
            .collect::<Vec<_>>()
        };
        let a = run(pattern.clone());
        assert_eq!(a.len(), 16);
        assert!(a.iter().all(|&addr| addr < 0x1000 && addr % 8 == 0));
        assert_eq!(a, run(pattern));
    }
}
