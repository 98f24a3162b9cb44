//! Bank-indexed character-device driver for CMOS-style index/data port
//! devices.
//!
//! Each configured bank is an index port followed by a data port and is
//! published as its own device node (`cmos0`, `cmos1`, ...), with the bank
//! index as minor number. All banks share one [`FileOperations`] implementation,
//! [`CmosBank`], which either talks to the registers through the port pair
//! ([`TransferMode::Indexed`]) or behaves as the classic textbook stub
//! ([`TransferMode::Placeholder`]).
//!
//! The driver is host-agnostic: everything it needs from the runtime goes
//! through [`KernelServices`](cmos_driver_api::KernelServices), and
//! [`CmosDriver::initialize`] either registers every bank or leaves nothing
//! behind.
//!
//! [`FileOperations`]: cmos_driver_api::FileOperations

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod bank;
pub mod config;
pub mod driver;
pub mod error;
pub mod ioctl;
pub mod ledger;

pub use bank::CmosBank;
pub use config::{BankConfig, CmosConfig, TransferMode};
pub use driver::{CmosDriver, DriverState};
pub use error::{ConfigError, InitError};
pub use ioctl::ControlCommand;
