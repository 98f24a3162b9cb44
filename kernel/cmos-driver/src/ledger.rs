//! Rollback ledger.
//!
//! Every resource the driver acquires is pushed onto a [`Ledger`] right
//! after the acquisition succeeds. Unwinding pops the entries newest first
//! and hands each to a release callback, so a failed `initialize` and a
//! normal `teardown` share one release path.

use alloc::collections::TryReserveError;
use alloc::vec::Vec;

use cmos_core::id::{CdevId, ClassId, DevNum};
use cmos_driver_api::IoPortRange;

/// A resource held by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A device-number range.
    DeviceNumbers {
        /// First number of the range.
        first: DevNum,
        /// Length of the range.
        count: u32,
    },
    /// The device class.
    Class(ClassId),
    /// A bank descriptor.
    Descriptor {
        /// Bank index.
        bank: u32,
    },
    /// A bank's reserved port pair.
    PortRegion {
        /// Bank index.
        bank: u32,
        /// Reserved ports.
        range: IoPortRange,
    },
    /// A bank's registered cdev.
    Cdev {
        /// Bank index.
        bank: u32,
        /// Host handle.
        cdev: CdevId,
    },
    /// A bank's published device node.
    DeviceNode {
        /// Bank index.
        bank: u32,
        /// Owning class.
        class: ClassId,
        /// Node's device number.
        dev: DevNum,
    },
}

impl Resource {
    /// Short label used in log messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DeviceNumbers { .. } => "device numbers",
            Self::Class(_) => "class",
            Self::Descriptor { .. } => "descriptor",
            Self::PortRegion { .. } => "port region",
            Self::Cdev { .. } => "cdev",
            Self::DeviceNode { .. } => "device node",
        }
    }
}

/// Acquired resources in acquisition order.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Resource>,
}

impl Ledger {
    /// Empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Ledger entries needed to register `banks` banks.
    #[must_use]
    pub const fn capacity_for(banks: usize) -> usize {
        2 + banks * 4
    }

    /// Pre-allocates room for `additional` entries so that [`record`](Self::record)
    /// never allocates in the middle of a registration.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the space cannot be reserved.
    pub fn reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.entries.try_reserve(additional)
    }

    /// Records a resource that was just acquired.
    pub fn record(&mut self, resource: Resource) {
        self.entries.push(resource);
    }

    /// Number of held resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases every entry, newest first, and leaves the ledger empty.
    ///
    /// Returns the number of entries released.
    pub fn unwind(&mut self, mut release: impl FnMut(Resource)) -> usize {
        let mut released = 0;
        while let Some(resource) = self.entries.pop() {
            release(resource);
            released += 1;
        }
        released
    }
}
