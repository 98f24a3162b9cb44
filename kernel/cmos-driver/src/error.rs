//! Configuration and initialization errors.

use core::fmt;

use cmos_driver_api::error::{EBUSY, EINVAL, ENOMEM};
use cmos_driver_api::{IoPortRange, KernelError};

use crate::driver::DriverState;

/// A structural problem in a [`CmosConfig`](crate::config::CmosConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The base name is empty, too long, or not `[A-Za-z0-9_]`.
    BadName,
    /// No banks were configured.
    NoBanks,
    /// More banks than [`MAX_BANKS`](crate::config::MAX_BANKS).
    TooManyBanks(usize),
    /// The data port does not directly follow the index port.
    DataPortNotAdjacent {
        /// Offending bank.
        bank: u32,
    },
    /// The size is zero or exceeds the eight-bit register index.
    BadSize {
        /// Offending bank.
        bank: u32,
        /// Configured size.
        size: u16,
    },
    /// Two banks share a port.
    PortsOverlap {
        /// Lower-numbered bank.
        first: u32,
        /// Higher-numbered bank.
        second: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadName => f.write_str("invalid device name"),
            Self::NoBanks => f.write_str("no banks configured"),
            Self::TooManyBanks(n) => write!(f, "{n} banks configured, at most 8 supported"),
            Self::DataPortNotAdjacent { bank } => {
                write!(f, "bank {bank}: data port must follow the index port")
            }
            Self::BadSize { bank, size } => {
                write!(f, "bank {bank}: size {size} outside 1..=256")
            }
            Self::PortsOverlap { first, second } => {
                write!(f, "banks {first} and {second} share I/O ports")
            }
        }
    }
}

impl core::error::Error for ConfigError {}

/// Why [`CmosDriver::initialize`](crate::driver::CmosDriver::initialize) failed.
///
/// Every variant is reported only after all resources acquired before the
/// failure were released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The configuration was rejected before anything was acquired.
    Config(ConfigError),
    /// The driver was not in the `Unregistered` state.
    InvalidState(DriverState),
    /// The rollback ledger could not be allocated.
    OutOfMemory,
    /// The device-number range could not be allocated.
    DeviceNumbers(KernelError),
    /// The device class could not be created.
    Class(KernelError),
    /// A bank descriptor could not be allocated.
    Descriptor {
        /// Bank being registered.
        bank: u32,
    },
    /// A bank's port pair is already reserved.
    PortRegion {
        /// Bank being registered.
        bank: u32,
        /// The pair that was requested.
        range: IoPortRange,
        /// Host error.
        source: KernelError,
    },
    /// The bank's character device could not be registered.
    Cdev {
        /// Bank being registered.
        bank: u32,
        /// Host error.
        source: KernelError,
    },
    /// The bank's device node could not be published.
    DeviceNode {
        /// Bank being registered.
        bank: u32,
        /// Host error.
        source: KernelError,
    },
}

impl InitError {
    /// The bank that was being registered, if the failure was bank-specific.
    #[must_use]
    pub const fn bank(&self) -> Option<u32> {
        match self {
            Self::Descriptor { bank }
            | Self::PortRegion { bank, .. }
            | Self::Cdev { bank, .. }
            | Self::DeviceNode { bank, .. } => Some(*bank),
            _ => None,
        }
    }

    /// Negative errno handed back to the host's module loader.
    #[must_use]
    pub const fn errno(&self) -> isize {
        match self {
            Self::Config(_) => -EINVAL,
            Self::InvalidState(_) => -EBUSY,
            Self::OutOfMemory | Self::Descriptor { .. } => -ENOMEM,
            Self::DeviceNumbers(source)
            | Self::Class(source)
            | Self::PortRegion { source, .. }
            | Self::Cdev { source, .. }
            | Self::DeviceNode { source, .. } => source.errno(),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "bad configuration: {err}"),
            Self::InvalidState(state) => write!(f, "cannot initialize while {state}"),
            Self::OutOfMemory => f.write_str("cannot allocate rollback ledger"),
            Self::DeviceNumbers(err) => write!(f, "cannot allocate device numbers: {err}"),
            Self::Class(err) => write!(f, "cannot create device class: {err}"),
            Self::Descriptor { bank } => write!(f, "bank {bank}: cannot allocate descriptor"),
            Self::PortRegion {
                bank,
                range,
                source,
            } => write!(f, "bank {bank}: cannot reserve ports {range}: {source}"),
            Self::Cdev { bank, source } => write!(f, "bank {bank}: cannot add cdev: {source}"),
            Self::DeviceNode { bank, source } => {
                write!(f, "bank {bank}: cannot create device node: {source}")
            }
        }
    }
}

impl core::error::Error for InitError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::DeviceNumbers(err)
            | Self::Class(err)
            | Self::PortRegion { source: err, .. }
            | Self::Cdev { source: err, .. }
            | Self::DeviceNode { source: err, .. } => Some(err),
            _ => None,
        }
    }
}
