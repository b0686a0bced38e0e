use crate::base::port::{link, InputPort, OutputPort, Port, ReadyFlag};

use super::types::{AddrRequest, ReadBeat, WriteBeat, WriteResp};

/// Adapter-facing end of an initiator port.  The adapter drives AW, W and AR and drains B and R.
/// Cloning yields another handle onto the same channels.
#[derive(Debug, Clone)]
pub struct InitiatorHandle {
    aw: Port<OutputPort, AddrRequest>,
    w: Port<OutputPort, WriteBeat>,
    ar: Port<OutputPort, AddrRequest>,
    b: Port<InputPort, WriteResp>,
    r: Port<InputPort, ReadBeat>,
    ready: ReadyFlag,
}

impl InitiatorHandle {
    /// Returns false while the previous write address is still waiting for a grant.
    pub fn send_aw(&self, req: &AddrRequest) -> bool {
        self.aw.put(req)
    }

    pub fn send_w(&self, beat: &WriteBeat) -> bool {
        self.w.put(beat)
    }

    pub fn send_ar(&self, req: &AddrRequest) -> bool {
        self.ar.put(req)
    }

    pub fn recv_b(&self) -> Option<WriteResp> {
        self.b.get()
    }

    pub fn recv_r(&self) -> Option<ReadBeat> {
        self.r.get()
    }

    pub fn aw_pending(&self) -> bool {
        self.aw.blocked()
    }

    pub fn ar_pending(&self) -> bool {
        self.ar.blocked()
    }

    pub fn signal_ready(&self) {
        self.ready.signal();
    }
}

/// Core-facing end of an initiator port.
#[derive(Debug, Clone)]
pub(crate) struct InitiatorSide {
    pub aw: Port<InputPort, AddrRequest>,
    pub w: Port<InputPort, WriteBeat>,
    pub ar: Port<InputPort, AddrRequest>,
    pub b: Port<OutputPort, WriteResp>,
    pub r: Port<OutputPort, ReadBeat>,
    pub ready: ReadyFlag,
}

pub(crate) fn initiator_port() -> (InitiatorSide, InitiatorHandle) {
    let (aw_tx, aw_rx) = link();
    let (w_tx, w_rx) = link();
    let (ar_tx, ar_rx) = link();
    let (b_tx, b_rx) = link();
    let (r_tx, r_rx) = link();
    let ready = ReadyFlag::default();
    let side = InitiatorSide {
        aw: aw_rx,
        w: w_rx,
        ar: ar_rx,
        b: b_tx,
        r: r_tx,
        ready: ready.clone(),
    };
    let handle = InitiatorHandle {
        aw: aw_tx,
        w: w_tx,
        ar: ar_tx,
        b: b_rx,
        r: r_rx,
        ready,
    };
    (side, handle)
}

/// Adapter-facing end of a target port.  The adapter drains AW, W and AR and drives B and R.
/// Identifiers seen here are tagged with the owning initiator's mask.
#[derive(Debug, Clone)]
pub struct TargetHandle {
    aw: Port<InputPort, AddrRequest>,
    w: Port<InputPort, WriteBeat>,
    ar: Port<InputPort, AddrRequest>,
    b: Port<OutputPort, WriteResp>,
    r: Port<OutputPort, ReadBeat>,
    ready: ReadyFlag,
}

impl TargetHandle {
    pub fn recv_aw(&self) -> Option<AddrRequest> {
        self.aw.get()
    }

    pub fn recv_ar(&self) -> Option<AddrRequest> {
        self.ar.get()
    }

    pub fn recv_w(&self) -> Option<WriteBeat> {
        self.w.get()
    }

    /// Returns false while the previous response is still waiting for delivery.
    pub fn send_b(&self, resp: &WriteResp) -> bool {
        self.b.put(resp)
    }

    pub fn send_r(&self, beat: &ReadBeat) -> bool {
        self.r.put(beat)
    }

    pub fn signal_ready(&self) {
        self.ready.signal();
    }
}

/// Core-facing end of a target port.
#[derive(Debug, Clone)]
pub(crate) struct TargetSide {
    pub aw: Port<OutputPort, AddrRequest>,
    pub w: Port<OutputPort, WriteBeat>,
    pub ar: Port<OutputPort, AddrRequest>,
    pub b: Port<InputPort, WriteResp>,
    pub r: Port<InputPort, ReadBeat>,
    pub ready: ReadyFlag,
}

pub(crate) fn target_port() -> (TargetSide, TargetHandle) {
    let (aw_tx, aw_rx) = link();
    let (w_tx, w_rx) = link();
    let (ar_tx, ar_rx) = link();
    let (b_tx, b_rx) = link();
    let (r_tx, r_rx) = link();
    let ready = ReadyFlag::default();
    let side = TargetSide {
        aw: aw_tx,
        w: w_tx,
        ar: ar_tx,
        b: b_rx,
        r: r_rx,
        ready: ready.clone(),
    };
    let handle = TargetHandle {
        aw: aw_rx,
        w: w_rx,
        ar: ar_rx,
        b: b_tx,
        r: r_tx,
        ready,
    };
    (side, handle)
}
