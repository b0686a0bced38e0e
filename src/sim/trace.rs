use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::timeq::Cycle;
use crate::xbar::types::{ChannelKind, InitiatorId, Resp};

/// One transaction as seen by the initiator that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRecord {
    pub initiator: InitiatorId,
    pub kind: ChannelKind,
    pub id: u32,
    pub addr: u64,
    pub beats: u32,
    pub resp: Resp,
    pub issued_at: Cycle,
    pub completed_at: Cycle,
}

pub struct TraceSink {
    writer: BufWriter<File>,
    wrote_header: bool,
}

impl TraceSink {
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            wrote_header: false,
        })
    }

    pub fn write_completion(&mut self, rec: &CompletionRecord) -> std::io::Result<()> {
        if !self.wrote_header {
            writeln!(
                self.writer,
                "cycle,initiator,kind,id,addr,beats,resp,issued_at,latency"
            )?;
            self.wrote_header = true;
        }
        writeln!(
            self.writer,
            "{},{},{},{},{:#x},{},{},{},{}",
            rec.completed_at,
            rec.initiator,
            rec.kind.short(),
            rec.id,
            rec.addr,
            rec.beats,
            rec.resp.as_str(),
            rec.issued_at,
            rec.completed_at.saturating_sub(rec.issued_at)
        )
    }
}

impl Drop for TraceSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
