use serde::Deserialize;

use crate::sim::config::Config;
use crate::timeq::Cycle;

use super::error::ConfigError;
use super::route::RouteTable;
use super::types::{ChannelKind, InitiatorId, TargetId};

pub const MAX_PRIORITY: u8 = 3;
pub const MAX_TARGETS: usize = 32;

/// Which address channels an initiator may use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl Capability {
    pub fn allows(self, kind: ChannelKind) -> bool {
        match (self, kind) {
            (Self::ReadWrite, _) => true,
            (Self::ReadOnly, ChannelKind::Read) => true,
            (Self::WriteOnly, ChannelKind::Write) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Axi4,
    Axi4Lite,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InitiatorConfig {
    pub priority: u8,
    /// Bit `t` set means target `t` is reachable.
    pub routes: u32,
    /// Tag bits identifying this initiator in the identifiers targets see.
    pub id_mask: u32,
    pub mode: Capability,
    /// Outstanding transactions allowed toward each reachable target.
    pub outstanding: usize,
    /// Longest burst, in beats, the port buffering accepts.
    pub burst_capacity: u32,
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            priority: 0,
            routes: u32::MAX,
            id_mask: 0,
            mode: Capability::ReadWrite,
            outstanding: 4,
            burst_capacity: 256,
        }
    }
}

impl InitiatorConfig {
    pub fn reaches(&self, target: TargetId) -> bool {
        target < MAX_TARGETS && (self.routes >> target) & 1 == 1
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TargetConfig {
    /// Inclusive byte address range.
    pub start: u64,
    pub end: u64,
    /// Outstanding transactions allowed from each initiator.
    pub outstanding: usize,
    /// Forward the initiator-visible address unchanged; otherwise subtract `start`.
    pub keep_base_addr: bool,
    /// Priority of this target's completions when several compete for one initiator.
    pub priority: u8,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0xFFF,
            outstanding: 4,
            keep_base_addr: true,
            priority: 0,
        }
    }
}

impl TargetConfig {
    fn overlaps(&self, other: &TargetConfig) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct XbarConfig {
    pub protocol: Protocol,
    pub timeout_enable: bool,
    pub timeout_value: Cycle,
    pub initiators: Vec<InitiatorConfig>,
    pub targets: Vec<TargetConfig>,
}

impl Config for XbarConfig {}

impl Default for XbarConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Axi4,
            timeout_enable: true,
            timeout_value: 10000,
            initiators: Vec::new(),
            targets: Vec::new(),
        }
    }
}

impl XbarConfig {
    pub fn num_initiators(&self) -> usize {
        self.initiators.len()
    }

    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }

    /// Outstanding depth of an (initiator, target) pair: the tighter of the two port limits, or
    /// zero when the initiator cannot reach the target.
    pub fn pair_depth(&self, initiator: InitiatorId, target: TargetId) -> usize {
        let (Some(ini), Some(tgt)) = (self.initiators.get(initiator), self.targets.get(target))
        else {
            return 0;
        };
        if !ini.reaches(target) {
            return 0;
        }
        ini.outstanding.min(tgt.outstanding)
    }

    /// Reject configurations the core cannot run safely.  Must pass before an `Interconnect`
    /// is built from this config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initiators.is_empty() || self.targets.is_empty() {
            return Err(ConfigError::Empty);
        }
        if self.targets.len() > MAX_TARGETS {
            return Err(ConfigError::TooManyTargets {
                count: self.targets.len(),
            });
        }
        if self.timeout_enable && self.timeout_value == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        for (i, ini) in self.initiators.iter().enumerate() {
            if ini.priority > MAX_PRIORITY {
                return Err(ConfigError::Priority {
                    port: format!("initiator {i}"),
                    priority: ini.priority,
                });
            }
            if ini.id_mask == 0 {
                return Err(ConfigError::ZeroIdMask { initiator: i });
            }
            if ini.outstanding == 0 {
                return Err(ConfigError::ZeroOutstanding {
                    port: format!("initiator {i}"),
                });
            }
            if ini.burst_capacity == 0 {
                return Err(ConfigError::ZeroBurstCapacity {
                    initiator: i,
                    depth: ini.outstanding,
                });
            }
            // A completion tagged with mask A also carries every mask that is a subset of A.
            for (j, other) in self.initiators.iter().enumerate() {
                if i != j && other.id_mask != 0 && ini.id_mask & other.id_mask == ini.id_mask {
                    return Err(ConfigError::AmbiguousIdMask {
                        initiator: i,
                        mask: ini.id_mask,
                        other: j,
                        other_mask: other.id_mask,
                    });
                }
            }
        }

        for (t, tgt) in self.targets.iter().enumerate() {
            if tgt.priority > MAX_PRIORITY {
                return Err(ConfigError::Priority {
                    port: format!("target {t}"),
                    priority: tgt.priority,
                });
            }
            if tgt.outstanding == 0 {
                return Err(ConfigError::ZeroOutstanding {
                    port: format!("target {t}"),
                });
            }
            if tgt.start > tgt.end {
                return Err(ConfigError::InvertedRange {
                    target: t,
                    start: tgt.start,
                    end: tgt.end,
                });
            }
        }

        for (i, ini) in self.initiators.iter().enumerate() {
            let reachable: Vec<TargetId> = (0..self.targets.len())
                .filter(|&t| ini.reaches(t))
                .collect();
            for (n, &a) in reachable.iter().enumerate() {
                for &b in &reachable[n + 1..] {
                    if self.targets[a].overlaps(&self.targets[b]) {
                        return Err(ConfigError::OverlappingRanges { initiator: i, a, b });
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate and build the route table in one go.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        self.validate()?;
        Ok(RouteTable::new(self))
    }
}
