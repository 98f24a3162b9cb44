//! Character-device driver API traits and types.
//!
//! Defines the contract between a character-device driver and the host
//! runtime that loads it:
//!
//! - **Resources** -- [`IoPortRange`] claims and typed port I/O ([`PortIo`]).
//! - **Host services** -- [`KernelServices`], the registration APIs a driver
//!   calls at load and unload time (device numbers, classes, port regions,
//!   cdevs, device nodes).
//! - **File operations** -- [`FileOperations`], the handlers the host
//!   dispatches user-space `open`/`read`/`write`/`lseek`/`ioctl` calls to,
//!   with [`UserReader`]/[`UserWriter`] modelling the user copy boundary.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod error;
pub mod file;
pub mod port;
pub mod resource;
pub mod services;
pub mod user;

// Re-export all public types at the crate root for ergonomic imports.
pub use error::{FileError, KernelError};
pub use file::{File, FileOperations, OpenFlags, SEEK_CUR, SEEK_END, SEEK_SET, Whence};
pub use port::PortIo;
pub use resource::IoPortRange;
pub use services::KernelServices;
pub use user::{UserReader, UserSlice, UserSliceMut, UserWriter};
