//! Host runtime service contracts for character-device drivers.
//!
//! Drivers use [`KernelServices`] to register themselves with the host
//! (device numbers, classes, port regions, cdevs and device nodes) without
//! depending on the host crate directly, and to account the memory they keep.

use alloc::sync::Arc;

use cmos_core::id::{CdevId, ClassId, DevNum};

use crate::error::KernelError;
use crate::file::FileOperations;
use crate::port::PortIo;
use crate::resource::IoPortRange;

/// Trait providing host registration services to drivers.
///
/// Implemented by the host runtime and passed to a driver at load time.
/// Every acquisition returns `Result<_, KernelError>`; every release is
/// infallible and must only be called with a value a matching acquisition
/// returned.
pub trait KernelServices: Send + Sync {
    /// Allocates `count` consecutive device numbers with a dynamic major,
    /// starting at `first_minor`.
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevNum, KernelError>;

    /// Releases a range returned by [`alloc_chrdev_region`](Self::alloc_chrdev_region).
    fn unregister_chrdev_region(&self, first: DevNum, count: u32);

    /// Creates a device class under which device nodes are published.
    fn class_create(&self, name: &str) -> Result<ClassId, KernelError>;

    /// Destroys a class created by [`class_create`](Self::class_create).
    fn class_destroy(&self, class: ClassId);

    /// Reserves `range` exclusively for the caller, labelled `name`.
    ///
    /// Returns [`KernelError::Busy`] if any port is already reserved.
    fn request_region(&self, range: IoPortRange, name: &str) -> Result<(), KernelError>;

    /// Releases a range reserved by [`request_region`](Self::request_region).
    fn release_region(&self, range: IoPortRange);

    /// Registers `ops` for `count` device numbers starting at `dev`.
    ///
    /// Once this returns, user calls on those numbers may reach `ops`.
    fn cdev_add(
        &self,
        dev: DevNum,
        count: u32,
        ops: Arc<dyn FileOperations>,
    ) -> Result<CdevId, KernelError>;

    /// Deregisters a cdev added by [`cdev_add`](Self::cdev_add).
    fn cdev_del(&self, cdev: CdevId);

    /// Publishes a device node `name` for `dev` under `class`.
    fn device_create(&self, class: ClassId, dev: DevNum, name: &str) -> Result<(), KernelError>;

    /// Removes the node published for `dev` under `class`.
    fn device_destroy(&self, class: ClassId, dev: DevNum);

    /// Accounts `bytes` of driver-owned memory against the host's budget.
    ///
    /// Drivers call this before allocating a long-lived object so the host
    /// can refuse the allocation (and count what is outstanding).
    fn charge_memory(&self, bytes: usize) -> Result<(), KernelError>;

    /// Returns memory accounted by [`charge_memory`](Self::charge_memory).
    fn uncharge_memory(&self, bytes: usize);

    /// Returns the port accessor drivers use for reserved regions.
    fn port_io(&self) -> Arc<dyn PortIo>;
}
