use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use axixbar::sim::config::{list_from_section, Config, SimConfig};
use axixbar::sim::top::Sim;
use axixbar::xbar::config::XbarConfig;
use clap::Parser;
use toml::Table;

#[derive(Parser)]
#[command(version, about)]
struct XbarArgs {
    #[arg(help = "Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help = "Override the cycle limit")]
    cycles: Option<u64>,
    #[arg(long, help = "Override the watchdog timeout; 0 disables it")]
    timeout: Option<u64>,
    #[arg(long, help = "Write statistics as JSON to this path")]
    stats_json: Option<PathBuf>,
    #[arg(long, help = "Write a CSV trace of completions to this path")]
    trace: Option<PathBuf>,
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = XbarArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;

    let mut sim_config = SimConfig::from_section(config_table.get("sim"))?;
    let mut xbar_config = XbarConfig::from_section(config_table.get("xbar"))?;
    let memories = list_from_section(config_table.get("memory"))?;
    let traffic = list_from_section(config_table.get("traffic"))?;

    // override toml configs with argv
    sim_config.max_cycles = argv.cycles.unwrap_or(sim_config.max_cycles);
    sim_config.stats_json = argv.stats_json.or(sim_config.stats_json);
    sim_config.trace = argv.trace.or(sim_config.trace);
    if let Some(timeout) = argv.timeout {
        xbar_config.timeout_enable = timeout > 0;
        xbar_config.timeout_value = timeout;
    }

    let stats_json = sim_config.stats_json.clone();
    let mut sim = Sim::new(sim_config, xbar_config, memories, traffic)?;
    let summary = sim.simulate()?;

    if let Some(path) = stats_json {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    }

    let totals = summary.xbar.initiator_totals();
    println!(
        "{} after {} cycles",
        if summary.finished { "drained" } else { "stopped" },
        summary.cycles
    );
    for driver in &summary.drivers {
        let s = &driver.stats;
        println!(
            "initiator {}: issued {} okay {} decerr {} slverr {} mismatches {}",
            driver.initiator, s.issued, s.okay, s.decerr, s.slverr, s.mismatches
        );
    }
    println!(
        "mean latency {:.1} max {} timeouts {} late responses discarded {}",
        totals.mean_latency(),
        totals.max_latency(),
        totals.timeouts(),
        summary.xbar.target_totals().late_discarded()
    );
    Ok(())
}
