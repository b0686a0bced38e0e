use super::config::{Capability, XbarConfig};
use super::types::{ChannelKind, InitiatorId, TargetId};

/// Outcome of decoding one address-phase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    /// Forward to `target` with `addr` already rebased if the target asks for it.
    Target { target: TargetId, addr: u64 },
    Unmapped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    target: TargetId,
    start: u64,
    end: u64,
    keep_base_addr: bool,
}

/// Static address map, one sorted window list per initiator holding only the targets that
/// initiator may reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    windows: Vec<Vec<Window>>,
    modes: Vec<Capability>,
    num_targets: usize,
}

impl RouteTable {
    /// Build from a configuration that already passed `XbarConfig::validate`.
    pub fn new(config: &XbarConfig) -> Self {
        let windows = config
            .initiators
            .iter()
            .map(|ini| {
                let mut reachable: Vec<Window> = config
                    .targets
                    .iter()
                    .enumerate()
                    .filter(|(t, _)| ini.reaches(*t))
                    .map(|(target, tgt)| Window {
                        target,
                        start: tgt.start,
                        end: tgt.end,
                        keep_base_addr: tgt.keep_base_addr,
                    })
                    .collect();
                reachable.sort_by_key(|w| w.start);
                reachable
            })
            .collect();
        Self {
            windows,
            modes: config.initiators.iter().map(|ini| ini.mode).collect(),
            num_targets: config.num_targets(),
        }
    }

    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    pub fn reachable(&self, initiator: InitiatorId, target: TargetId) -> bool {
        self.windows
            .get(initiator)
            .is_some_and(|ws| ws.iter().any(|w| w.target == target))
    }

    /// Resolve `addr` against the windows `initiator` can reach.  Ranges are inclusive.
    pub fn resolve(&self, initiator: InitiatorId, addr: u64) -> Decode {
        let Some(windows) = self.windows.get(initiator) else {
            return Decode::Unmapped;
        };
        // windows are sorted and disjoint: the candidate is the last one starting at or below addr
        let idx = windows.partition_point(|w| w.start <= addr);
        if idx == 0 {
            return Decode::Unmapped;
        }
        let window = &windows[idx - 1];
        if addr > window.end {
            return Decode::Unmapped;
        }
        let addr = if window.keep_base_addr {
            addr
        } else {
            addr - window.start
        };
        Decode::Target {
            target: window.target,
            addr,
        }
    }

    /// Like `resolve`, but a channel the initiator's capability forbids never decodes.
    pub fn resolve_for(&self, initiator: InitiatorId, kind: ChannelKind, addr: u64) -> Decode {
        match self.modes.get(initiator) {
            Some(mode) if mode.allows(kind) => self.resolve(initiator, addr),
            _ => Decode::Unmapped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbar::config::{InitiatorConfig, TargetConfig};

    fn config() -> XbarConfig {
        XbarConfig {
            initiators: vec![
                InitiatorConfig {
                    id_mask: 0x1,
                    ..InitiatorConfig::default()
                },
                InitiatorConfig {
                    id_mask: 0x2,
                    routes: 0b10,
                    mode: Capability::ReadOnly,
                    ..InitiatorConfig::default()
                },
            ],
            targets: vec![
                TargetConfig {
                    start: 0x2000,
                    end: 0x2FFF,
                    ..TargetConfig::default()
                },
                TargetConfig {
                    start: 0x1000,
                    end: 0x1FFF,
                    keep_base_addr: false,
                    ..TargetConfig::default()
                },
            ],
            ..XbarConfig::default()
        }
    }

    #[test]
    fn resolves_inclusive_boundaries() {
        let table = config().route_table().unwrap();
        assert_eq!(
            table.resolve(0, 0x2000),
            Decode::Target { target: 0, addr: 0x2000 }
        );
        assert_eq!(
            table.resolve(0, 0x2FFF),
            Decode::Target { target: 0, addr: 0x2FFF }
        );
        assert_eq!(table.resolve(0, 0x3000), Decode::Unmapped);
        assert_eq!(table.resolve(0, 0x0FFF), Decode::Unmapped);
    }

    #[test]
    fn rebases_when_base_not_kept() {
        let table = config().route_table().unwrap();
        assert_eq!(
            table.resolve(0, 0x1010),
            Decode::Target { target: 1, addr: 0x10 }
        );
    }

    #[test]
    fn route_mask_hides_targets() {
        let table = config().route_table().unwrap();
        assert_eq!(table.resolve(1, 0x2000), Decode::Unmapped);
        assert!(!table.reachable(1, 0));
        assert!(table.reachable(1, 1));
    }

    #[test]
    fn capability_gates_channel() {
        let table = config().route_table().unwrap();
        assert_eq!(
            table.resolve_for(1, ChannelKind::Write, 0x1000),
            Decode::Unmapped
        );
        assert_eq!(
            table.resolve_for(1, ChannelKind::Read, 0x1000),
            Decode::Target { target: 1, addr: 0 }
        );
    }

    #[test]
    fn loading_twice_decodes_identically() {
        let a = config().route_table().unwrap();
        let b = config().route_table().unwrap();
        assert_eq!(a, b);
        for addr in (0..0x4000u64).step_by(0x7f) {
            for ini in 0..2 {
                assert_eq!(a.resolve(ini, addr), b.resolve(ini, addr));
            }
        }
    }
}
