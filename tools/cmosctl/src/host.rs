//! Simulated host the driver is loaded into.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use cmos_core::log::LogLevel;
use cmos_driver::CmosDriver;
use cmos_driver_api::OpenFlags;
use cmos_sim::{SimChip, SimFile, SimKernel};

use crate::config::Config;

/// Kernel log sink: everything goes to stderr.
fn stderr_log(level: LogLevel, args: fmt::Arguments<'_>) {
    eprintln!("[{}] {args}", level.name());
}

/// Routes driver logging to stderr at a verbosity picked by `-v` count.
pub fn init_logging(verbose: u8) {
    cmos_core::log::set_max_level(match verbose {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    });
    cmos_core::log::set_log_fn(stderr_log);
}

/// A simulated kernel with a chip matching the configured banks.
pub struct Host {
    /// The simulated kernel.
    pub kernel: Arc<SimKernel>,
    /// The driver, loaded or not.
    pub driver: CmosDriver,
}

impl Host {
    /// Builds the chip and kernel; the driver is created but not loaded.
    pub fn new(config: &Config) -> Self {
        let chip = SimChip::new();
        for bank in &config.driver.banks {
            chip.add_bank(bank.index_port);
        }
        for preset in &config.chip.preset {
            // Presets were checked against the bank count when loading.
            if let Some(bank) = usize::try_from(preset.bank)
                .ok()
                .and_then(|i| config.driver.banks.get(i))
            {
                chip.poke(bank.index_port, preset.reg, preset.value);
            }
        }

        let kernel = SimKernel::with_chip(Arc::new(chip));
        let driver = CmosDriver::new(kernel.clone(), config.driver.clone());
        Self { kernel, driver }
    }

    /// Builds the host and loads the driver.
    pub fn load(config: &Config) -> Result<Self> {
        let mut host = Self::new(config);
        host.driver.initialize().context("Failed to load driver")?;
        Ok(host)
    }

    /// Opens bank `index`'s node.
    pub fn open(&self, index: u32, flags: OpenFlags) -> Result<SimFile> {
        let bank = self.driver.bank(index).ok_or_else(|| {
            anyhow!(
                "no bank {index} ({} configured)",
                self.driver.config().bank_count()
            )
        })?;
        self.kernel
            .open(bank.name(), flags)
            .with_context(|| format!("Failed to open /dev/{}", bank.name()))
    }
}
