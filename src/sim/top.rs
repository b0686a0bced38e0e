use anyhow::{bail, Context};
use log::{info, warn};
use serde::Serialize;

use crate::base::behavior::ModuleBehaviors;
use crate::sim::config::SimConfig;
use crate::sim::target::{MemTarget, MemTargetConfig};
use crate::sim::trace::TraceSink;
use crate::sim::traffic::{DriverStats, TrafficDriver, TrafficPatternConfig};
use crate::timeq::Cycle;
use crate::xbar::config::XbarConfig;
use crate::xbar::interconnect::Interconnect;
use crate::xbar::stats::XbarStats;
use crate::xbar::types::InitiatorId;

#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub initiator: InitiatorId,
    #[serde(flatten)]
    pub stats: DriverStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimSummary {
    pub cycles: Cycle,
    /// Every driver ran out of work and the interconnect drained before `max_cycles`.
    pub finished: bool,
    pub drivers: Vec<DriverSummary>,
    pub xbar: XbarStats,
}

/// Traffic drivers and memories wired around one interconnect.
pub struct Sim {
    config: SimConfig,
    xbar: Interconnect,
    drivers: Vec<TrafficDriver>,
    memories: Vec<MemTarget>,
    trace: Option<TraceSink>,
}

impl Sim {
    pub fn new(
        config: SimConfig,
        xbar_config: XbarConfig,
        memories: Vec<MemTargetConfig>,
        traffic: Vec<TrafficPatternConfig>,
    ) -> anyhow::Result<Self> {
        let xbar = Interconnect::new(xbar_config).context("cannot build interconnect")?;
        if memories.len() > xbar.num_targets() {
            bail!(
                "{} memories configured for {} targets",
                memories.len(),
                xbar.num_targets()
            );
        }
        if let Some(bad) = traffic.iter().find(|p| p.initiator >= xbar.num_initiators()) {
            bail!(
                "traffic pattern names initiator {}, only {} configured",
                bad.initiator,
                xbar.num_initiators()
            );
        }

        let mut memories = memories.into_iter();
        let memories = (0..xbar.num_targets())
            .map(|t| MemTarget::new(t, xbar.target(t), memories.next().unwrap_or_default()))
            .collect();

        // patterns of the same initiator run back to back in file order
        let drivers = (0..xbar.num_initiators())
            .filter_map(|i| {
                let patterns: Vec<_> = traffic.iter().filter(|p| p.initiator == i).cloned().collect();
                (!patterns.is_empty()).then(|| TrafficDriver::new(i, xbar.initiator(i), patterns))
            })
            .collect::<Vec<_>>();

        let trace = config
            .trace
            .as_deref()
            .map(|path| {
                TraceSink::new(path)
                    .with_context(|| format!("cannot create trace file {}", path.display()))
            })
            .transpose()?;

        info!(
            "sim: {} drivers, {} memories, max {} cycles",
            drivers.len(),
            xbar.num_targets(),
            config.max_cycles
        );
        Ok(Self {
            config,
            xbar,
            drivers,
            memories,
            trace,
        })
    }

    pub fn xbar(&self) -> &Interconnect {
        &self.xbar
    }

    pub fn finished(&self) -> bool {
        self.drivers.iter().all(TrafficDriver::finished) && self.xbar.is_idle()
    }

    /// One cycle: drivers, then memories, then the interconnect.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        self.drivers.iter_mut().for_each(TrafficDriver::tick_one);
        self.memories.iter_mut().for_each(MemTarget::tick_one);
        self.xbar
            .step()
            .with_context(|| format!("interconnect failed at cycle {}", self.xbar.cycle()))?;

        if let Some(trace) = self.trace.as_mut() {
            for driver in self.drivers.iter_mut() {
                for rec in driver.drain_completions() {
                    trace.write_completion(&rec).context("cannot write trace")?;
                }
            }
        } else {
            self.drivers.iter_mut().for_each(|d| {
                d.drain_completions();
            });
        }
        Ok(())
    }

    pub fn simulate(&mut self) -> anyhow::Result<SimSummary> {
        while !self.finished() {
            if self.xbar.cycle() >= self.config.max_cycles {
                warn!(
                    "sim: stopped at max_cycles {} with work outstanding",
                    self.config.max_cycles
                );
                break;
            }
            self.tick()?;
        }
        let finished = self.finished();
        if finished {
            info!("sim: drained after {} cycles", self.xbar.cycle());
        }
        Ok(self.summary(finished))
    }

    fn summary(&self, finished: bool) -> SimSummary {
        SimSummary {
            cycles: self.xbar.cycle(),
            finished,
            drivers: self
                .drivers
                .iter()
                .map(|d| DriverSummary {
                    initiator: d.initiator(),
                    stats: d.stats(),
                })
                .collect(),
            xbar: self.xbar.stats().clone(),
        }
    }
}
