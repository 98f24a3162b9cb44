//! Driver configuration.
//!
//! Replaces the fixed global port tables of a classic CMOS driver with a
//! value supplied at load time. [`CmosConfig::default`] describes the usual
//! PC layout: two banks of 128 registers behind the `0x70/0x71` and
//! `0x72/0x73` index/data pairs.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use cmos_driver_api::IoPortRange;

use crate::error::ConfigError;

/// Largest number of banks one driver instance manages.
pub const MAX_BANKS: usize = 8;

/// Largest bank size: the index port is eight bits wide.
pub const MAX_BANK_SIZE: u16 = 256;

/// Longest accepted base name (the bank index is appended to it).
pub const MAX_NAME_LEN: usize = 16;

/// Ports claimed per bank: the index port and the data port after it.
pub const PORTS_PER_BANK: u16 = 2;

/// Base name used for the device range, the class and the nodes.
pub const DEFAULT_NAME: &str = "cmos";

/// Registers per bank in the default layout.
pub const DEFAULT_BANK_SIZE: u16 = 128;

/// How `read`/`write`/`llseek`/`ioctl` behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransferMode {
    /// Stub handlers that never touch the ports: a read yields one `'a'`
    /// byte and reports end of stream, a write swallows the whole buffer.
    Placeholder,
    /// Register access through the bank's index/data port pair.
    #[default]
    Indexed,
}

/// One bank's port pair and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct BankConfig {
    /// Port that selects the register.
    pub index_port: u16,
    /// Port that transfers the selected register's byte.
    pub data_port: u16,
    /// Number of addressable registers.
    pub size: u16,
}

impl BankConfig {
    /// Bank with the data port directly after `index_port`.
    #[must_use]
    pub const fn new(index_port: u16, size: u16) -> Self {
        Self {
            index_port,
            data_port: index_port.wrapping_add(1),
            size,
        }
    }

    /// The two-port region this bank reserves.
    #[must_use]
    pub const fn ports(&self) -> IoPortRange {
        IoPortRange::new(self.index_port, PORTS_PER_BANK)
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct CmosConfig {
    /// Base name; bank `i` is published as `<name><i>`.
    #[cfg_attr(feature = "serde", serde(default = "default_name"))]
    pub name: String,
    /// Transfer behaviour shared by every bank.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: TransferMode,
    /// Banks in minor-number order.
    #[cfg_attr(feature = "serde", serde(default = "default_banks"))]
    pub banks: Vec<BankConfig>,
}

fn default_name() -> String {
    String::from(DEFAULT_NAME)
}

fn default_banks() -> Vec<BankConfig> {
    vec![
        BankConfig::new(0x70, DEFAULT_BANK_SIZE),
        BankConfig::new(0x72, DEFAULT_BANK_SIZE),
    ]
}

impl Default for CmosConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            mode: TransferMode::default(),
            banks: default_banks(),
        }
    }
}

impl CmosConfig {
    /// Default layout with a different transfer mode.
    #[must_use]
    pub fn with_mode(mode: TransferMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Number of banks, as the `u32` device-number APIs expect.
    #[must_use]
    pub fn bank_count(&self) -> u32 {
        u32::try_from(self.banks.len()).unwrap_or(u32::MAX)
    }

    /// Checks every structural rule before any resource is acquired.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking the name, the bank
    /// count, then each bank in order, then pairwise port overlap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || self.name.len() > MAX_NAME_LEN
            || !self.name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ConfigError::BadName);
        }

        if self.banks.is_empty() {
            return Err(ConfigError::NoBanks);
        }
        if self.banks.len() > MAX_BANKS {
            return Err(ConfigError::TooManyBanks(self.banks.len()));
        }

        for (bank, cfg) in (0u32..).zip(&self.banks) {
            if cfg.index_port.checked_add(1) != Some(cfg.data_port) {
                return Err(ConfigError::DataPortNotAdjacent { bank });
            }
            if cfg.size == 0 || cfg.size > MAX_BANK_SIZE {
                return Err(ConfigError::BadSize {
                    bank,
                    size: cfg.size,
                });
            }
        }

        for (first, a) in (0u32..).zip(&self.banks) {
            for (second, b) in (0u32..).zip(&self.banks).skip(first as usize + 1) {
                if a.ports().overlaps(&b.ports()) {
                    return Err(ConfigError::PortsOverlap { first, second });
                }
            }
        }

        Ok(())
    }
}
