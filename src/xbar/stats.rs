use std::ops::AddAssign;

use serde::Serialize;

use crate::timeq::Cycle;

use super::types::{ChannelKind, Resp};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InitiatorStats {
    writes_issued: u64,
    reads_issued: u64,
    writes_completed: u64,
    reads_completed: u64,
    write_beats: u64,
    read_beats: u64,
    decode_errors: u64,
    timeouts: u64,
    error_responses: u64,
    tracker_stalls: u64,
    order_stalls: u64,
    arbitration_losses: u64,
    total_latency: u64,
    max_latency: u64,
}

impl InitiatorStats {
    pub fn issued(&self, kind: ChannelKind) -> u64 {
        match kind {
            ChannelKind::Write => self.writes_issued,
            ChannelKind::Read => self.reads_issued,
        }
    }

    pub fn completed(&self, kind: ChannelKind) -> u64 {
        match kind {
            ChannelKind::Write => self.writes_completed,
            ChannelKind::Read => self.reads_completed,
        }
    }

    pub fn write_beats(&self) -> u64 {
        self.write_beats
    }

    pub fn read_beats(&self) -> u64 {
        self.read_beats
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn error_responses(&self) -> u64 {
        self.error_responses
    }

    pub fn tracker_stalls(&self) -> u64 {
        self.tracker_stalls
    }

    pub fn order_stalls(&self) -> u64 {
        self.order_stalls
    }

    pub fn arbitration_losses(&self) -> u64 {
        self.arbitration_losses
    }

    pub fn max_latency(&self) -> u64 {
        self.max_latency
    }

    pub fn mean_latency(&self) -> f64 {
        let done = self.writes_completed + self.reads_completed;
        if done == 0 {
            0.0
        } else {
            self.total_latency as f64 / done as f64
        }
    }

    pub fn record_issue(&mut self, kind: ChannelKind) {
        let counter = match kind {
            ChannelKind::Write => &mut self.writes_issued,
            ChannelKind::Read => &mut self.reads_issued,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors = self.decode_errors.saturating_add(1);
    }

    pub fn record_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
    }

    pub fn record_tracker_stall(&mut self) {
        self.tracker_stalls = self.tracker_stalls.saturating_add(1);
    }

    pub fn record_order_stall(&mut self) {
        self.order_stalls = self.order_stalls.saturating_add(1);
    }

    pub fn record_arbitration_loss(&mut self) {
        self.arbitration_losses = self.arbitration_losses.saturating_add(1);
    }

    pub fn record_write_beat(&mut self) {
        self.write_beats = self.write_beats.saturating_add(1);
    }

    pub fn record_read_beat(&mut self) {
        self.read_beats = self.read_beats.saturating_add(1);
    }

    /// A transaction's final completion reached the initiator.
    pub fn record_completion(&mut self, kind: ChannelKind, resp: Resp, admitted_at: Cycle, now: Cycle) {
        let counter = match kind {
            ChannelKind::Write => &mut self.writes_completed,
            ChannelKind::Read => &mut self.reads_completed,
        };
        *counter = counter.saturating_add(1);
        if resp.is_error() {
            self.error_responses = self.error_responses.saturating_add(1);
        }
        let latency = now.saturating_sub(admitted_at);
        self.total_latency = self.total_latency.saturating_add(latency);
        self.max_latency = self.max_latency.max(latency);
    }
}

impl AddAssign<&InitiatorStats> for InitiatorStats {
    fn add_assign(&mut self, other: &InitiatorStats) {
        self.writes_issued = self.writes_issued.saturating_add(other.writes_issued);
        self.reads_issued = self.reads_issued.saturating_add(other.reads_issued);
        self.writes_completed = self.writes_completed.saturating_add(other.writes_completed);
        self.reads_completed = self.reads_completed.saturating_add(other.reads_completed);
        self.write_beats = self.write_beats.saturating_add(other.write_beats);
        self.read_beats = self.read_beats.saturating_add(other.read_beats);
        self.decode_errors = self.decode_errors.saturating_add(other.decode_errors);
        self.timeouts = self.timeouts.saturating_add(other.timeouts);
        self.error_responses = self.error_responses.saturating_add(other.error_responses);
        self.tracker_stalls = self.tracker_stalls.saturating_add(other.tracker_stalls);
        self.order_stalls = self.order_stalls.saturating_add(other.order_stalls);
        self.arbitration_losses = self
            .arbitration_losses
            .saturating_add(other.arbitration_losses);
        self.total_latency = self.total_latency.saturating_add(other.total_latency);
        self.max_latency = self.max_latency.max(other.max_latency);
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TargetStats {
    aw_granted: u64,
    ar_granted: u64,
    write_beats: u64,
    read_beats: u64,
    responses: u64,
    late_discarded: u64,
}

impl TargetStats {
    pub fn granted(&self, kind: ChannelKind) -> u64 {
        match kind {
            ChannelKind::Write => self.aw_granted,
            ChannelKind::Read => self.ar_granted,
        }
    }

    pub fn write_beats(&self) -> u64 {
        self.write_beats
    }

    pub fn read_beats(&self) -> u64 {
        self.read_beats
    }

    pub fn responses(&self) -> u64 {
        self.responses
    }

    pub fn late_discarded(&self) -> u64 {
        self.late_discarded
    }

    pub fn record_grant(&mut self, kind: ChannelKind) {
        let counter = match kind {
            ChannelKind::Write => &mut self.aw_granted,
            ChannelKind::Read => &mut self.ar_granted,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn record_write_beat(&mut self) {
        self.write_beats = self.write_beats.saturating_add(1);
    }

    pub fn record_read_beat(&mut self) {
        self.read_beats = self.read_beats.saturating_add(1);
    }

    pub fn record_response(&mut self) {
        self.responses = self.responses.saturating_add(1);
    }

    pub fn record_late_discard(&mut self) {
        self.late_discarded = self.late_discarded.saturating_add(1);
    }
}

impl AddAssign<&TargetStats> for TargetStats {
    fn add_assign(&mut self, other: &TargetStats) {
        self.aw_granted = self.aw_granted.saturating_add(other.aw_granted);
        self.ar_granted = self.ar_granted.saturating_add(other.ar_granted);
        self.write_beats = self.write_beats.saturating_add(other.write_beats);
        self.read_beats = self.read_beats.saturating_add(other.read_beats);
        self.responses = self.responses.saturating_add(other.responses);
        self.late_discarded = self.late_discarded.saturating_add(other.late_discarded);
    }
}

/// Counters for one interconnect, serialized as-is for `--stats-json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct XbarStats {
    pub cycles: Cycle,
    pub initiators: Vec<InitiatorStats>,
    pub targets: Vec<TargetStats>,
}

impl XbarStats {
    pub fn new(num_initiators: usize, num_targets: usize) -> Self {
        Self {
            cycles: 0,
            initiators: vec![InitiatorStats::default(); num_initiators],
            targets: vec![TargetStats::default(); num_targets],
        }
    }

    pub fn initiator_totals(&self) -> InitiatorStats {
        self.initiators
            .iter()
            .fold(InitiatorStats::default(), |mut acc, s| {
                acc += s;
                acc
            })
    }

    pub fn target_totals(&self) -> TargetStats {
        self.targets.iter().fold(TargetStats::default(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_tracks_latency_and_errors() {
        let mut s = InitiatorStats::default();
        s.record_issue(ChannelKind::Read);
        s.record_completion(ChannelKind::Read, Resp::Okay, 10, 14);
        s.record_issue(ChannelKind::Write);
        s.record_completion(ChannelKind::Write, Resp::DecErr, 20, 30);
        assert_eq!(s.completed(ChannelKind::Read), 1);
        assert_eq!(s.error_responses(), 1);
        assert_eq!(s.max_latency(), 10);
        assert_eq!(s.mean_latency(), 7.0);
    }

    #[test]
    fn totals_sum_ports() {
        let mut stats = XbarStats::new(2, 1);
        stats.initiators[0].record_timeout();
        stats.initiators[1].record_timeout();
        stats.targets[0].record_late_discard();
        assert_eq!(stats.initiator_totals().timeouts(), 2);
        assert_eq!(stats.target_totals().late_discarded(), 1);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"late_discarded\":1"));
    }
}
