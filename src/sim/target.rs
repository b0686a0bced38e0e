use std::collections::{HashMap, VecDeque};

use log::debug;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::base::behavior::ModuleBehaviors;
use crate::timeq::{Cycle, ServerConfig, ServiceRequest, TimedServer};
use crate::xbar::ports::TargetHandle;
use crate::xbar::types::{AddrRequest, ReadBeat, Resp, TargetId, WriteBeat, WriteResp};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemTargetConfig {
    /// Cycles from accepting a burst to the first response.
    pub latency: Cycle,
    pub bytes_per_cycle: u32,
    /// Bursts the memory works on at once.
    pub queue_capacity: usize,
    /// Accept every request and never answer.
    pub stall: bool,
}

impl Default for MemTargetConfig {
    fn default() -> Self {
        Self {
            latency: 4,
            bytes_per_cycle: 8,
            queue_capacity: 4,
            stall: false,
        }
    }
}

#[derive(Debug)]
enum MemOp {
    Write {
        req: AddrRequest,
        beats: SmallVec<[WriteBeat; 8]>,
    },
    Read {
        req: AddrRequest,
    },
}

impl MemOp {
    fn bytes(&self) -> u32 {
        let req = match self {
            MemOp::Write { req, .. } | MemOp::Read { req } => req,
        };
        (req.beat_bytes() * req.beats() as u64) as u32
    }
}

#[derive(Debug)]
struct OpenWrite {
    req: AddrRequest,
    beats: SmallVec<[WriteBeat; 8]>,
}

/// Word-addressed memory behind one target port.  Bursts are serviced through a `TimedServer`;
/// responses leave in service order, which keeps same-id responses in request order.
pub struct MemTarget {
    id: TargetId,
    handle: TargetHandle,
    config: MemTargetConfig,
    server: TimedServer<MemOp>,
    words: HashMap<u64, u64>,
    open_writes: VecDeque<OpenWrite>,
    staged: VecDeque<MemOp>,
    b_out: VecDeque<WriteResp>,
    r_out: VecDeque<ReadBeat>,
    now: Cycle,
    served: u64,
}

impl MemTarget {
    pub fn new(id: TargetId, handle: TargetHandle, config: MemTargetConfig) -> Self {
        let server = TimedServer::new(ServerConfig {
            base_latency: config.latency,
            bytes_per_cycle: config.bytes_per_cycle.max(1),
            queue_capacity: config.queue_capacity.max(1),
        });
        handle.signal_ready();
        Self {
            id,
            handle,
            config,
            server,
            words: HashMap::new(),
            open_writes: VecDeque::new(),
            staged: VecDeque::new(),
            b_out: VecDeque::new(),
            r_out: VecDeque::new(),
            now: 0,
            served: 0,
        }
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn read_word(&self, addr: u64) -> u64 {
        self.words.get(&(addr & !7)).copied().unwrap_or(0)
    }

    fn write_word(&mut self, addr: u64, data: u64, strb: u8) {
        let mask = (0..8u32)
            .filter(|byte| (strb >> byte) & 1 == 1)
            .fold(0u64, |m, byte| m | 0xffu64 << (8 * byte));
        let word = self.words.entry(addr & !7).or_insert(0);
        *word = (*word & !mask) | (data & mask);
    }

    fn accept(&mut self) {
        if let Some(req) = self.handle.recv_aw() {
            self.open_writes.push_back(OpenWrite {
                req,
                beats: SmallVec::new(),
            });
        }
        if let Some(beat) = self.handle.recv_w() {
            // beats carry the tagged id of their burst; untagged beats go to the oldest open one
            let idx = beat
                .id
                .and_then(|id| self.open_writes.iter().position(|w| w.req.id == id))
                .unwrap_or(0);
            if let Some(open) = self.open_writes.get_mut(idx) {
                open.beats.push(beat);
                if beat.last {
                    if let Some(done) = self.open_writes.remove(idx) {
                        self.staged.push_back(MemOp::Write {
                            req: done.req,
                            beats: done.beats,
                        });
                    }
                }
            }
        }
        if self.staged.len() < self.config.queue_capacity.max(1) {
            if let Some(req) = self.handle.recv_ar() {
                self.staged.push_back(MemOp::Read { req });
            }
        }
    }

    fn complete(&mut self, op: MemOp) {
        self.served += 1;
        match op {
            MemOp::Write { req, beats } => {
                for (n, beat) in beats.iter().enumerate() {
                    self.write_word(req.beat_addr(n as u32), beat.data, beat.strb);
                }
                self.b_out.push_back(WriteResp {
                    id: req.id,
                    resp: Resp::Okay,
                });
            }
            MemOp::Read { req } => {
                for n in 0..req.beats() {
                    self.r_out.push_back(ReadBeat {
                        id: req.id,
                        data: self.read_word(req.beat_addr(n)),
                        resp: Resp::Okay,
                        last: n + 1 == req.beats(),
                    });
                }
            }
        }
    }
}

impl ModuleBehaviors for MemTarget {
    fn tick_one(&mut self) {
        self.now += 1;
        if self.config.stall {
            self.handle.recv_aw();
            self.handle.recv_w();
            self.handle.recv_ar();
            return;
        }

        self.accept();
        if let Some(op) = self.staged.pop_front() {
            let bytes = op.bytes();
            if let Err(bp) = self.server.try_enqueue(self.now, ServiceRequest::new(op, bytes)) {
                self.staged.push_front(bp.into_request().payload);
            }
        }
        let mut done = Vec::new();
        self.server.service_ready(self.now, |op, _| done.push(op));
        for op in done {
            self.complete(op);
        }

        if let Some(resp) = self.b_out.front() {
            if self.handle.send_b(resp) {
                debug!("mem {}: b id {:#x} at {}", self.id, resp.id, self.now);
                self.b_out.pop_front();
            }
        }
        if let Some(beat) = self.r_out.front() {
            if self.handle.send_r(beat) {
                self.r_out.pop_front();
            }
        }
    }

    fn reset(&mut self) {
        self.server.clear();
        self.words.clear();
        self.open_writes.clear();
        self.staged.clear();
        self.b_out.clear();
        self.r_out.clear();
        self.now = 0;
        self.served = 0;
    }
}
