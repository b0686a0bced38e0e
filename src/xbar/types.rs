use serde::{Deserialize, Serialize};

pub type InitiatorId = usize;
pub type TargetId = usize;
/// Grant-order serial number of a transaction.  Monotonic across the whole interconnect.
pub type TxnSerial = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Write,
    Read,
}

impl ChannelKind {
    pub fn short(self) -> &'static str {
        match self {
            Self::Write => "w",
            Self::Read => "r",
        }
    }
}

/// Completion status carried by BRESP / RRESP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resp {
    #[default]
    Okay,
    ExOkay,
    SlvErr,
    DecErr,
}

impl Resp {
    pub fn is_error(self) -> bool {
        matches!(self, Self::SlvErr | Self::DecErr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Okay => "okay",
            Self::ExOkay => "exokay",
            Self::SlvErr => "slverr",
            Self::DecErr => "decerr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstKind {
    Fixed,
    #[default]
    Incr,
    Wrap,
}

/// Address-phase payload shared by AW and AR.  `len` is the AXI encoding: beats minus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrRequest {
    pub id: u32,
    pub addr: u64,
    pub len: u8,
    pub size: u8,
    pub burst: BurstKind,
}

impl AddrRequest {
    /// An INCR burst of `len + 1` eight-byte beats.
    pub fn new(id: u32, addr: u64, len: u8) -> Self {
        Self {
            id,
            addr,
            len,
            size: 3,
            burst: BurstKind::Incr,
        }
    }

    pub fn beats(&self) -> u32 {
        self.len as u32 + 1
    }

    pub fn beat_bytes(&self) -> u64 {
        1u64 << self.size.min(7)
    }

    /// Byte address of beat `beat` of this burst.
    pub fn beat_addr(&self, beat: u32) -> u64 {
        let bytes = self.beat_bytes();
        let aligned = self.addr & !(bytes - 1);
        match self.burst {
            BurstKind::Fixed => self.addr,
            BurstKind::Incr => {
                if beat == 0 {
                    self.addr
                } else {
                    aligned.wrapping_add(beat as u64 * bytes)
                }
            }
            BurstKind::Wrap => {
                let span = bytes * self.beats() as u64;
                let base = self.addr - self.addr % span;
                base + ((self.addr - base + beat as u64 * bytes) % span)
            }
        }
    }
}

/// One write-data beat.  `id` is optional: AXI4 dropped WID, but an adapter that still knows
/// which transaction a beat belongs to may supply it and have the binding checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBeat {
    pub data: u64,
    pub strb: u8,
    pub last: bool,
    pub id: Option<u32>,
}

impl Default for WriteBeat {
    fn default() -> Self {
        Self {
            data: 0,
            strb: 0xff,
            last: false,
            id: None,
        }
    }
}

impl WriteBeat {
    pub fn new(data: u64, last: bool) -> Self {
        Self {
            data,
            last,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResp {
    pub id: u32,
    pub resp: Resp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadBeat {
    pub id: u32,
    pub data: u64,
    pub resp: Resp,
    pub last: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_burst_addresses_are_aligned_after_first_beat() {
        let req = AddrRequest::new(0, 0x1004, 3);
        assert_eq!(req.beat_addr(0), 0x1004);
        assert_eq!(req.beat_addr(1), 0x1008);
        assert_eq!(req.beat_addr(3), 0x1018);
    }

    #[test]
    fn wrap_burst_stays_inside_window() {
        let mut req = AddrRequest::new(0, 0x1018, 3);
        req.burst = BurstKind::Wrap;
        let addrs: Vec<u64> = (0..4).map(|b| req.beat_addr(b)).collect();
        assert_eq!(addrs, vec![0x1018, 0x1000, 0x1008, 0x1010]);
    }

    #[test]
    fn fixed_burst_repeats_address() {
        let mut req = AddrRequest::new(0, 0x40, 7);
        req.burst = BurstKind::Fixed;
        assert_eq!(req.beat_addr(5), 0x40);
        assert_eq!(req.beats(), 8);
    }
}
