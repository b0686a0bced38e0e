//! Errors raised by the switching core.
//!
//! Decode errors and timeout faults never show up here: they are local to one transaction and are
//! reported to the initiator as `DECERR` / `SLVERR` completions.  Everything in this module is
//! systemic and halts the interconnect.

use thiserror::Error;

use super::types::{InitiatorId, TargetId};

/// Convenience alias for results within the switching core.
pub type Result<T> = std::result::Result<T, XbarError>;

/// Static configuration rejected before the interconnect becomes operational.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("interconnect needs at least one initiator and one target")]
    Empty,

    #[error("{count} targets configured, route bitmasks address at most 32")]
    TooManyTargets { count: usize },

    #[error("initiator {initiator}: id_mask must be non-zero")]
    ZeroIdMask { initiator: InitiatorId },

    #[error("initiator {initiator}: id_mask {mask:#x} is covered by initiator {other}'s mask {other_mask:#x}")]
    AmbiguousIdMask {
        initiator: InitiatorId,
        mask: u32,
        other: InitiatorId,
        other_mask: u32,
    },

    #[error("{port}: priority {priority} out of range 0..=3")]
    Priority { port: String, priority: u8 },

    #[error("{port}: outstanding depth must be non-zero")]
    ZeroOutstanding { port: String },

    #[error("initiator {initiator}: outstanding depth {depth} requested with zero burst capacity")]
    ZeroBurstCapacity { initiator: InitiatorId, depth: usize },

    #[error("target {target}: start {start:#x} is above end {end:#x}")]
    InvertedRange { target: TargetId, start: u64, end: u64 },

    #[error("initiator {initiator}: targets {a} and {b} have overlapping address ranges")]
    OverlappingRanges {
        initiator: InitiatorId,
        a: TargetId,
        b: TargetId,
    },

    #[error("timeout is enabled with a zero timeout_value")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XbarError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("write data ordering violation on initiator {initiator}: {detail}")]
    OrderingViolation { initiator: InitiatorId, detail: String },

    #[error("protocol violation on {port}: {detail}")]
    ProtocolViolation { port: String, detail: String },

    #[error("initiator {initiator}: id {id:#x} overlaps another initiator's tag bits")]
    IdCollision { initiator: InitiatorId, id: u32 },

    #[error("target {target}: completion with id {id:#x} matches no outstanding transaction")]
    UnroutableCompletion { target: TargetId, id: u32 },
}

impl XbarError {
    pub(crate) fn ordering(initiator: InitiatorId, detail: impl Into<String>) -> Self {
        Self::OrderingViolation {
            initiator,
            detail: detail.into(),
        }
    }

    pub(crate) fn protocol(port: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            port: port.into(),
            detail: detail.into(),
        }
    }
}
