//! Configuration file loading.
//!
//! The file has a `[driver]` table in the shape of [`CmosConfig`] and an
//! optional `[chip]` table with register values to preload into the
//! simulated chip:
//!
//! ```toml
//! [driver]
//! name = "cmos"
//! mode = "indexed"
//!
//! [[driver.banks]]
//! index_port = 0x70
//! data_port = 0x71
//! size = 128
//!
//! [[chip.preset]]
//! bank = 0
//! reg = 0x10
//! value = 0x42
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use cmos_driver::CmosConfig;
use serde::Deserialize;

/// One register value written into the chip before the driver loads.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    /// Bank index.
    pub bank: u32,
    /// Register within the bank.
    pub reg: u8,
    /// Value to store.
    pub value: u8,
}

/// Simulated chip contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipConfig {
    /// Registers to preload.
    #[serde(default)]
    pub preset: Vec<Preset>,
}

/// Everything `cmosctl` reads from its configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Driver configuration.
    #[serde(default)]
    pub driver: CmosConfig,
    /// Simulated chip contents.
    #[serde(default)]
    pub chip: ChipConfig,
}

impl Config {
    /// Loads `path`, or the default PC layout if no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parses and validates a configuration file's contents.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.driver.validate()?;
        for preset in &config.chip.preset {
            if preset.bank >= config.driver.bank_count() {
                bail!(
                    "preset for bank {} but only {} banks configured",
                    preset.bank,
                    config.driver.bank_count()
                );
            }
        }
        Ok(config)
    }
}
