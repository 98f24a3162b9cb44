//! Driver lifecycle: registration of every bank and its mirror-image teardown.

use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use cmos_core::id::{ClassId, DevNum};
use cmos_core::{kdebug, kerr, kinfo, ktrace};
use cmos_driver_api::{FileOperations, KernelServices};

use crate::bank::CmosBank;
use crate::config::CmosConfig;
use crate::error::InitError;
use crate::ledger::{Ledger, Resource};

/// Bytes accounted with the host for each bank descriptor.
const DESCRIPTOR_BYTES: usize = core::mem::size_of::<CmosBank>();

/// Registration state of a [`CmosDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing is held.
    Unregistered,
    /// `initialize` is acquiring resources.
    Registering,
    /// Every bank is published.
    Registered,
    /// `teardown` is releasing resources.
    Unregistering,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unregistered => "unregistered",
            Self::Registering => "registering",
            Self::Registered => "registered",
            Self::Unregistering => "unregistering",
        })
    }
}

/// Exposes each configured bank as its own character device.
///
/// `initialize` either registers every bank or, on the first failure,
/// releases everything it acquired and reports which step failed. Dropping
/// the driver tears it down.
pub struct CmosDriver {
    kernel: Arc<dyn KernelServices>,
    config: CmosConfig,
    state: DriverState,
    ledger: Ledger,
    dev: Option<DevNum>,
    class: Option<ClassId>,
    banks: Vec<Arc<CmosBank>>,
}

impl CmosDriver {
    /// Creates an unregistered driver. Nothing is acquired yet.
    #[must_use]
    pub fn new(kernel: Arc<dyn KernelServices>, config: CmosConfig) -> Self {
        Self {
            kernel,
            config,
            state: DriverState::Unregistered,
            ledger: Ledger::new(),
            dev: None,
            class: None,
            banks: Vec::new(),
        }
    }

    /// Registers every bank.
    ///
    /// Acquires, in order: the device-number range, the class, then for each
    /// bank its descriptor, port pair, cdev and device node.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::InvalidState`] unless the driver is unregistered,
    /// [`InitError::Config`] for a rejected configuration, or the variant of
    /// the step that failed. In every error case nothing stays acquired.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        if self.state != DriverState::Unregistered {
            return Err(InitError::InvalidState(self.state));
        }
        self.config.validate().map_err(InitError::Config)?;

        self.state = DriverState::Registering;
        match self.register() {
            Ok(()) => {
                self.state = DriverState::Registered;
                kinfo!("{}: registered {} banks", self.config.name, self.banks.len());
                Ok(())
            }
            Err(err) => {
                kerr!("{}: {}", self.config.name, err);
                let released = self.unwind();
                self.state = DriverState::Unregistered;
                kinfo!("{}: rolled back {} resources", self.config.name, released);
                Err(err)
            }
        }
    }

    fn register(&mut self) -> Result<(), InitError> {
        let kernel = Arc::clone(&self.kernel);
        let name = self.config.name.as_str();
        let count = self.config.bank_count();

        self.ledger
            .reserve(Ledger::capacity_for(self.config.banks.len()))
            .map_err(|_| InitError::OutOfMemory)?;

        let first = kernel
            .alloc_chrdev_region(0, count, name)
            .map_err(InitError::DeviceNumbers)?;
        self.ledger.record(Resource::DeviceNumbers { first, count });
        self.dev = Some(first);

        let class = kernel.class_create(name).map_err(InitError::Class)?;
        self.ledger.record(Resource::Class(class));
        self.class = Some(class);

        for (bank, cfg) in (0u32..).zip(self.config.banks.iter().copied()) {
            let dev = first.offset(bank);

            kernel
                .charge_memory(DESCRIPTOR_BYTES)
                .map_err(|_| InitError::Descriptor { bank })?;
            if self.banks.try_reserve(1).is_err() {
                kernel.uncharge_memory(DESCRIPTOR_BYTES);
                return Err(InitError::Descriptor { bank });
            }
            let desc = Arc::new(CmosBank::new(
                bank,
                format!("{name}{bank}"),
                cfg,
                self.config.mode,
                kernel.port_io(),
            ));
            self.banks.push(Arc::clone(&desc));
            self.ledger.record(Resource::Descriptor { bank });

            let range = cfg.ports();
            kernel
                .request_region(range, desc.name())
                .map_err(|source| InitError::PortRegion {
                    bank,
                    range,
                    source,
                })?;
            self.ledger.record(Resource::PortRegion { bank, range });

            let ops: Arc<dyn FileOperations> = desc.clone();
            let cdev = kernel
                .cdev_add(dev, 1, ops)
                .map_err(|source| InitError::Cdev { bank, source })?;
            self.ledger.record(Resource::Cdev { bank, cdev });

            kernel
                .device_create(class, dev, desc.name())
                .map_err(|source| InitError::DeviceNode { bank, source })?;
            self.ledger.record(Resource::DeviceNode { bank, class, dev });

            kdebug!(
                "{}: {} at {}, {} registers",
                desc.name(),
                dev,
                range,
                desc.size()
            );
        }

        Ok(())
    }

    /// Releases everything the driver holds, newest first.
    ///
    /// Safe to call in any state: after a failed `initialize` or a previous
    /// teardown there is nothing left and this does nothing. The host must
    /// not call it while a bank node is still open.
    pub fn teardown(&mut self) {
        if self.ledger.is_empty() {
            return;
        }
        self.state = DriverState::Unregistering;
        let released = self.unwind();
        self.state = DriverState::Unregistered;
        kinfo!("{}: unregistered, {} resources released", self.config.name, released);
    }

    fn unwind(&mut self) -> usize {
        let kernel = &self.kernel;
        let banks = &mut self.banks;
        let name = self.config.name.as_str();
        let released = self.ledger.unwind(|resource| {
            ktrace!("{}: release {} {:?}", name, resource.kind(), resource);
            match resource {
                Resource::DeviceNode { class, dev, .. } => kernel.device_destroy(class, dev),
                Resource::Cdev { cdev, .. } => kernel.cdev_del(cdev),
                Resource::PortRegion { range, .. } => kernel.release_region(range),
                Resource::Descriptor { bank } => {
                    banks.retain(|desc| desc.index() != bank);
                    kernel.uncharge_memory(DESCRIPTOR_BYTES);
                }
                Resource::Class(class) => kernel.class_destroy(class),
                Resource::DeviceNumbers { first, count } => {
                    kernel.unregister_chrdev_region(first, count);
                }
            }
        });
        self.dev = None;
        self.class = None;
        released
    }

    /// Current registration state.
    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// The configuration this driver was created with.
    #[must_use]
    pub const fn config(&self) -> &CmosConfig {
        &self.config
    }

    /// First number of the allocated range (bank 0), while registered.
    #[must_use]
    pub const fn dev_num(&self) -> Option<DevNum> {
        self.dev
    }

    /// The device class, while registered.
    #[must_use]
    pub const fn class(&self) -> Option<ClassId> {
        self.class
    }

    /// Descriptor of bank `index`.
    #[must_use]
    pub fn bank(&self, index: u32) -> Option<&Arc<CmosBank>> {
        self.banks.iter().find(|desc| desc.index() == index)
    }

    /// All live descriptors in bank order.
    #[must_use]
    pub fn banks(&self) -> &[Arc<CmosBank>] {
        &self.banks
    }

    /// Names of the published device nodes in bank order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.banks.iter().map(|desc| desc.name())
    }

    /// Number of resources currently held.
    #[must_use]
    pub fn held(&self) -> usize {
        self.ledger.len()
    }
}

impl Drop for CmosDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for CmosDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmosDriver")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("dev", &self.dev)
            .field("banks", &self.banks)
            .field("held", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
