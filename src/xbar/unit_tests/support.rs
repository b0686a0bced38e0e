use std::collections::VecDeque;

use crate::xbar::config::{InitiatorConfig, TargetConfig, XbarConfig};
use crate::xbar::interconnect::Interconnect;
use crate::xbar::ports::{InitiatorHandle, TargetHandle};
use crate::xbar::types::{AddrRequest, ReadBeat, Resp, WriteBeat, WriteResp};

pub const WINDOW: u64 = 0x1000;

/// `n` initiators with masks 0x100, 0x200, ... and `m` targets with 4 KiB windows back to back.
pub fn config(n: usize, m: usize) -> XbarConfig {
    XbarConfig {
        timeout_enable: false,
        initiators: (0..n)
            .map(|i| InitiatorConfig {
                id_mask: 0x100 << i,
                ..InitiatorConfig::default()
            })
            .collect(),
        targets: (0..m as u64)
            .map(|t| TargetConfig {
                start: t * WINDOW,
                end: (t + 1) * WINDOW - 1,
                ..TargetConfig::default()
            })
            .collect(),
        ..XbarConfig::default()
    }
}

pub struct Bench {
    pub xbar: Interconnect,
    pub drivers: Vec<Driver>,
    pub targets: Vec<HeldTarget>,
}

impl Bench {
    /// Build the interconnect and mark every port ready.
    pub fn new(cfg: XbarConfig) -> Self {
        let xbar = Interconnect::new(cfg).expect("valid config");
        let drivers = (0..xbar.num_initiators())
            .map(|i| {
                let h = xbar.initiator(i);
                h.signal_ready();
                Driver::new(h)
            })
            .collect();
        let targets = (0..xbar.num_targets())
            .map(|t| {
                let h = xbar.target(t);
                h.signal_ready();
                HeldTarget::new(h)
            })
            .collect();
        Self {
            xbar,
            drivers,
            targets,
        }
    }

    /// Adapters first, then one interconnect step.
    pub fn cycle(&mut self) {
        self.drivers.iter_mut().for_each(Driver::tick);
        self.targets.iter_mut().for_each(HeldTarget::tick);
        self.xbar.step().expect("no systemic error");
    }

    pub fn run(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.cycle();
        }
    }
}

/// Initiator adapter that pushes queued requests and collects every completion.
pub struct Driver {
    pub handle: InitiatorHandle,
    pub aw: VecDeque<AddrRequest>,
    pub w: VecDeque<WriteBeat>,
    pub ar: VecDeque<AddrRequest>,
    pub b: Vec<WriteResp>,
    pub r: Vec<ReadBeat>,
}

impl Driver {
    pub fn new(handle: InitiatorHandle) -> Self {
        Self {
            handle,
            aw: VecDeque::new(),
            w: VecDeque::new(),
            ar: VecDeque::new(),
            b: Vec::new(),
            r: Vec::new(),
        }
    }

    /// Queue a write burst of `len + 1` beats, data included.
    pub fn write(&mut self, id: u32, addr: u64, len: u8) {
        self.aw.push_back(AddrRequest::new(id, addr, len));
        self.data(addr, len);
    }

    /// Queue only the data of a burst.
    pub fn data(&mut self, addr: u64, len: u8) {
        for beat in 0..=len as u64 {
            self.w
                .push_back(WriteBeat::new(addr + beat, beat == len as u64));
        }
    }

    pub fn read(&mut self, id: u32, addr: u64, len: u8) {
        self.ar.push_back(AddrRequest::new(id, addr, len));
    }

    pub fn tick(&mut self) {
        if let Some(req) = self.aw.front() {
            if self.handle.send_aw(req) {
                self.aw.pop_front();
            }
        }
        if let Some(beat) = self.w.front() {
            if self.handle.send_w(beat) {
                self.w.pop_front();
            }
        }
        if let Some(req) = self.ar.front() {
            if self.handle.send_ar(req) {
                self.ar.pop_front();
            }
        }
        self.b.extend(self.handle.recv_b());
        self.r.extend(self.handle.recv_r());
    }
}

/// Target adapter that accepts everything and answers only when told to, unless `auto` is set.
pub struct HeldTarget {
    pub handle: TargetHandle,
    pub aw: Vec<AddrRequest>,
    pub w: Vec<WriteBeat>,
    pub ar: Vec<AddrRequest>,
    pub b_out: VecDeque<WriteResp>,
    pub r_out: VecDeque<ReadBeat>,
    /// Answer each burst as soon as it is complete.
    pub auto: bool,
    // bursts whose last data beat has not arrived yet
    open_writes: VecDeque<AddrRequest>,
}

impl HeldTarget {
    pub fn new(handle: TargetHandle) -> Self {
        Self {
            handle,
            aw: Vec::new(),
            w: Vec::new(),
            ar: Vec::new(),
            b_out: VecDeque::new(),
            r_out: VecDeque::new(),
            auto: false,
            open_writes: VecDeque::new(),
        }
    }

    pub fn respond_b(&mut self, id: u32, resp: Resp) {
        self.b_out.push_back(WriteResp { id, resp });
    }

    /// Queue every beat of a read burst; data is the beat address.
    pub fn respond_r(&mut self, req: &AddrRequest, resp: Resp) {
        for beat in 0..req.beats() {
            self.r_out.push_back(ReadBeat {
                id: req.id,
                data: req.beat_addr(beat),
                resp,
                last: beat + 1 == req.beats(),
            });
        }
    }

    pub fn tick(&mut self) {
        if let Some(req) = self.handle.recv_aw() {
            self.aw.push(req);
            self.open_writes.push_back(req);
        }
        if let Some(beat) = self.handle.recv_w() {
            self.w.push(beat);
            if beat.last {
                if let Some(req) = self.open_writes.pop_front() {
                    if self.auto {
                        self.respond_b(req.id, Resp::Okay);
                    }
                }
            }
        }
        if let Some(req) = self.handle.recv_ar() {
            self.ar.push(req);
            if self.auto {
                self.respond_r(&req, Resp::Okay);
            }
        }
        if let Some(resp) = self.b_out.front() {
            if self.handle.send_b(resp) {
                self.b_out.pop_front();
            }
        }
        if let Some(beat) = self.r_out.front() {
            if self.handle.send_r(beat) {
                self.r_out.pop_front();
            }
        }
    }
}
