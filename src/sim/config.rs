use std::path::PathBuf;

use anyhow::Context;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::timeq::Cycle;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> anyhow::Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .context("cannot deserialize config section"),
            None => {
                warn!("config section not found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Deserialize an array-of-tables section (`[[name]]`).  A missing section is an empty list.
pub fn list_from_section<T: DeserializeOwned>(section: Option<&Value>) -> anyhow::Result<Vec<T>> {
    match section {
        Some(value) => value
            .clone()
            .try_into()
            .context("cannot deserialize config list"),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Hard stop for the run, in interconnect steps.
    pub max_cycles: Cycle,
    /// Write the statistics as JSON to this path.
    pub stats_json: Option<PathBuf>,
    /// Write a CSV trace of every completion observed by the traffic drivers.
    pub trace: Option<PathBuf>,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_cycles: 1_000_000,
            stats_json: None,
            trace: None,
        }
    }
}
