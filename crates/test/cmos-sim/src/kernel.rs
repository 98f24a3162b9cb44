//! In-memory host runtime.
//!
//! [`SimKernel`] keeps every object a driver registers in plain tables so
//! tests can count them ([`Census`]), fail any registration step on demand
//! ([`FaultPlan`]) and open the published nodes from the user side
//! ([`SimKernel::open`]). Releases that do not match an earlier acquisition
//! are recorded as violations instead of panicking inside driver code.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use cmos_core::id::{CdevId, ClassId, DevNum, MINOR_MASK};
use cmos_driver_api::{
    File, FileError, FileOperations, IoPortRange, KernelError, KernelServices, OpenFlags, PortIo,
};

use crate::chip::SimChip;
use crate::file::SimFile;

/// First dynamic major handed out; later ones count down from here.
pub const FIRST_DYNAMIC_MAJOR: u32 = 254;

/// Prefix accepted (and ignored) in front of node names.
pub const DEV_PREFIX: &str = "/dev/";

// ---------------------------------------------------------------------------
// Steps, faults and events
// ---------------------------------------------------------------------------

/// A fallible host service a [`FaultPlan`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimStep {
    /// `alloc_chrdev_region`.
    AllocRegion,
    /// `class_create`.
    ClassCreate,
    /// `charge_memory`.
    ChargeMemory,
    /// `request_region`.
    RequestRegion,
    /// `cdev_add`.
    CdevAdd,
    /// `device_create`.
    DeviceCreate,
}

impl SimStep {
    /// Every step, in the order a driver normally reaches them.
    pub const ALL: [Self; 6] = [
        Self::AllocRegion,
        Self::ClassCreate,
        Self::ChargeMemory,
        Self::RequestRegion,
        Self::CdevAdd,
        Self::DeviceCreate,
    ];

    /// Kebab-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllocRegion => "alloc-region",
            Self::ClassCreate => "class-create",
            Self::ChargeMemory => "charge-memory",
            Self::RequestRegion => "request-region",
            Self::CdevAdd => "cdev-add",
            Self::DeviceCreate => "device-create",
        }
    }

    /// The error a real host would most likely report for this step.
    #[must_use]
    pub const fn typical_error(self) -> KernelError {
        match self {
            Self::AllocRegion => KernelError::NoSpace,
            Self::RequestRegion => KernelError::Busy,
            Self::DeviceCreate => KernelError::Exists,
            Self::ClassCreate | Self::ChargeMemory | Self::CdevAdd => KernelError::NoMemory,
        }
    }
}

impl fmt::Display for SimStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|step| step.name()).collect();
                format!("unknown step `{s}`, expected one of: {}", names.join(", "))
            })
    }
}

/// Fails the `nth` call (1-based) of `step` made after the plan is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPlan {
    step: SimStep,
    nth: u32,
    error: KernelError,
}

impl FaultPlan {
    /// Fails the first call of `step` with its typical error.
    #[must_use]
    pub const fn new(step: SimStep) -> Self {
        Self {
            step,
            nth: 1,
            error: step.typical_error(),
        }
    }

    /// Fails the `nth` call instead of the first. `0` is treated as `1`.
    #[must_use]
    pub const fn nth(mut self, nth: u32) -> Self {
        self.nth = if nth == 0 { 1 } else { nth };
        self
    }

    /// Fails with `error` instead of the typical one.
    #[must_use]
    pub const fn with_error(mut self, error: KernelError) -> Self {
        self.error = error;
        self
    }

    /// Targeted step.
    #[must_use]
    pub const fn step(&self) -> SimStep {
        self.step
    }
}

/// One acquisition or release the kernel has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A step succeeded.
    Acquired(SimStep),
    /// A step's resource was given back.
    Released(SimStep),
    /// A step failed because of an injected fault.
    Injected(SimStep),
}

// ---------------------------------------------------------------------------
// Census
// ---------------------------------------------------------------------------

/// Live objects registered by drivers.
///
/// Port ranges claimed with [`SimKernel::claim_ports`] belong to a foreign
/// owner and are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    /// Device-number ranges.
    pub regions: usize,
    /// Device classes.
    pub classes: usize,
    /// Port reservations.
    pub port_regions: usize,
    /// Registered cdevs.
    pub cdevs: usize,
    /// Published device nodes.
    pub nodes: usize,
    /// Outstanding memory charges.
    pub charges: usize,
    /// Bytes those charges account for.
    pub charged_bytes: usize,
}

impl Census {
    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Census {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "regions={} classes={} ports={} cdevs={} nodes={} charges={} ({} bytes)",
            self.regions,
            self.classes,
            self.port_regions,
            self.cdevs,
            self.nodes,
            self.charges,
            self.charged_bytes
        )
    }
}

// ---------------------------------------------------------------------------
// SimKernel
// ---------------------------------------------------------------------------

struct Region {
    first_minor: u32,
    count: u32,
}

struct PortClaim {
    range: IoPortRange,
    owner: String,
    foreign: bool,
}

struct Cdev {
    dev: DevNum,
    count: u32,
    ops: Arc<dyn FileOperations>,
}

impl Cdev {
    fn covers(&self, dev: DevNum) -> bool {
        dev.major() == self.dev.major()
            && dev.minor() >= self.dev.minor()
            && dev.minor() - self.dev.minor() < self.count
    }
}

struct Node {
    class: ClassId,
    dev: DevNum,
}

struct Fault {
    plan: FaultPlan,
    seen: u32,
}

#[derive(Default)]
struct Inner {
    regions: BTreeMap<u32, Region>,
    classes: BTreeMap<ClassId, String>,
    next_class: u32,
    ports: Vec<PortClaim>,
    cdevs: BTreeMap<CdevId, Cdev>,
    next_cdev: u32,
    nodes: BTreeMap<String, Node>,
    charges: Vec<usize>,
    open: BTreeMap<DevNum, usize>,
    faults: Vec<Fault>,
    events: Vec<SimEvent>,
    violations: Vec<String>,
}

impl Inner {
    /// Consumes a matching fault plan, if this call is the one it targets.
    fn check_fault(&mut self, step: SimStep) -> Result<(), KernelError> {
        let hit = self.faults.iter_mut().position(|fault| {
            if fault.plan.step != step {
                return false;
            }
            fault.seen += 1;
            fault.seen == fault.plan.nth
        });
        match hit {
            Some(pos) => {
                let fault = self.faults.remove(pos);
                self.events.push(SimEvent::Injected(step));
                Err(fault.plan.error)
            }
            None => Ok(()),
        }
    }

    fn acquired(&mut self, step: SimStep) {
        self.events.push(SimEvent::Acquired(step));
    }

    fn released(&mut self, step: SimStep) {
        self.events.push(SimEvent::Released(step));
    }

    fn violation(&mut self, what: String) {
        self.violations.push(what);
    }
}

/// In-memory [`KernelServices`] implementation with fault injection.
pub struct SimKernel {
    inner: Mutex<Inner>,
    chip: Arc<SimChip>,
}

impl SimKernel {
    /// Kernel backed by [`SimChip::pc`].
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_chip(Arc::new(SimChip::pc()))
    }

    /// Kernel whose [`port_io`](KernelServices::port_io) is `chip`.
    #[must_use]
    pub fn with_chip(chip: Arc<SimChip>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            chip,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The simulated chip.
    #[must_use]
    pub fn chip(&self) -> &Arc<SimChip> {
        &self.chip
    }

    /// Arms a fault. Several plans may be armed at once.
    pub fn inject(&self, plan: FaultPlan) {
        self.lock().faults.push(Fault { plan, seen: 0 });
    }

    /// Reserves `range` for someone other than the driver under test.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Busy`] if part of `range` is already reserved.
    pub fn claim_ports(&self, range: IoPortRange, owner: &str) -> Result<(), KernelError> {
        let mut inner = self.lock();
        if inner.ports.iter().any(|claim| claim.range.overlaps(&range)) {
            return Err(KernelError::Busy);
        }
        inner.ports.push(PortClaim {
            range,
            owner: owner.to_owned(),
            foreign: true,
        });
        Ok(())
    }

    /// Owner of the reservation covering `port`, if any.
    #[must_use]
    pub fn port_owner(&self, port: u16) -> Option<String> {
        self.lock()
            .ports
            .iter()
            .find(|claim| claim.range.contains_port(port))
            .map(|claim| claim.owner.clone())
    }

    /// Counts what drivers currently hold.
    #[must_use]
    pub fn census(&self) -> Census {
        let inner = self.lock();
        Census {
            regions: inner.regions.len(),
            classes: inner.classes.len(),
            port_regions: inner.ports.iter().filter(|claim| !claim.foreign).count(),
            cdevs: inner.cdevs.len(),
            nodes: inner.nodes.len(),
            charges: inner.charges.len(),
            charged_bytes: inner.charges.iter().sum(),
        }
    }

    /// Published node names, sorted.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Device number behind node `name`.
    #[must_use]
    pub fn node_dev(&self, name: &str) -> Option<DevNum> {
        let name = name.strip_prefix(DEV_PREFIX).unwrap_or(name);
        self.lock().nodes.get(name).map(|node| node.dev)
    }

    /// Every acquisition, release and injected failure, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    /// Forgets the recorded events.
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Releases that matched no acquisition, or left dependants behind.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        self.lock().violations.clone()
    }

    /// Number of handles currently open on any node.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.lock().open.values().sum()
    }

    /// Number of handles currently open on `dev`.
    #[must_use]
    pub fn open_count(&self, dev: DevNum) -> usize {
        self.lock().open.get(&dev).copied().unwrap_or(0)
    }

    /// Opens a published node the way a user process would.
    ///
    /// `path` is a node name, optionally prefixed with `/dev/`.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::NoDevice`] if no node of that name exists or no
    /// cdev backs it, or whatever the driver's `open` reports.
    pub fn open(self: &Arc<Self>, path: &str, flags: OpenFlags) -> Result<SimFile, FileError> {
        let name = path.strip_prefix(DEV_PREFIX).unwrap_or(path);
        let (dev, ops) = {
            let inner = self.lock();
            let dev = inner.nodes.get(name).ok_or(FileError::NoDevice)?.dev;
            let ops = inner
                .cdevs
                .values()
                .find(|cdev| cdev.covers(dev))
                .map(|cdev| Arc::clone(&cdev.ops))
                .ok_or(FileError::NoDevice)?;
            (dev, ops)
        };

        let mut file = File::new(dev, flags);
        ops.open(&mut file)?;
        *self.lock().open.entry(dev).or_insert(0) += 1;
        Ok(SimFile::new(Arc::clone(self), ops, file, name.to_owned()))
    }

    /// Called by [`SimFile`] once its driver `release` has run.
    pub(crate) fn closed(&self, dev: DevNum) {
        let mut inner = self.lock();
        match inner.open.get(&dev).copied() {
            Some(count) if count > 1 => {
                inner.open.insert(dev, count - 1);
            }
            Some(_) => {
                inner.open.remove(&dev);
            }
            None => inner.violation(format!("close of {dev} with no open handle")),
        }
    }
}

impl fmt::Debug for SimKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimKernel")
            .field("census", &self.census())
            .field("nodes", &self.nodes())
            .finish_non_exhaustive()
    }
}

impl KernelServices for SimKernel {
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        _name: &str,
    ) -> Result<DevNum, KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::AllocRegion)?;
        if count == 0
            || first_minor
                .checked_add(count)
                .is_none_or(|end| end - 1 > MINOR_MASK)
        {
            return Err(KernelError::Invalid);
        }
        let major = (1..=FIRST_DYNAMIC_MAJOR)
            .rev()
            .find(|major| !inner.regions.contains_key(major))
            .ok_or(KernelError::NoSpace)?;
        inner.regions.insert(major, Region { first_minor, count });
        inner.acquired(SimStep::AllocRegion);
        Ok(DevNum::new(major, first_minor))
    }

    fn unregister_chrdev_region(&self, first: DevNum, count: u32) {
        let mut inner = self.lock();
        let matches = inner
            .regions
            .get(&first.major())
            .is_some_and(|region| region.first_minor == first.minor() && region.count == count);
        if !matches {
            inner.violation(format!("release of unknown region {first}+{count}"));
            return;
        }
        if inner.cdevs.values().any(|cdev| cdev.dev.major() == first.major()) {
            inner.violation(format!("region {first} released with cdevs still added"));
        }
        inner.regions.remove(&first.major());
        inner.released(SimStep::AllocRegion);
    }

    fn class_create(&self, name: &str) -> Result<ClassId, KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::ClassCreate)?;
        if inner.classes.values().any(|existing| existing == name) {
            return Err(KernelError::Exists);
        }
        let id = ClassId::new(inner.next_class);
        inner.next_class += 1;
        inner.classes.insert(id, name.to_owned());
        inner.acquired(SimStep::ClassCreate);
        Ok(id)
    }

    fn class_destroy(&self, class: ClassId) {
        let mut inner = self.lock();
        if inner.classes.remove(&class).is_none() {
            inner.violation(format!("destroy of unknown {class}"));
            return;
        }
        if inner.nodes.values().any(|node| node.class == class) {
            inner.violation(format!("{class} destroyed with nodes still published"));
        }
        inner.released(SimStep::ClassCreate);
    }

    fn request_region(&self, range: IoPortRange, name: &str) -> Result<(), KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::RequestRegion)?;
        if range.size() == 0 || range.end() > u32::from(u16::MAX) + 1 {
            return Err(KernelError::Invalid);
        }
        if inner.ports.iter().any(|claim| claim.range.overlaps(&range)) {
            return Err(KernelError::Busy);
        }
        inner.ports.push(PortClaim {
            range,
            owner: name.to_owned(),
            foreign: false,
        });
        inner.acquired(SimStep::RequestRegion);
        Ok(())
    }

    fn release_region(&self, range: IoPortRange) {
        let mut inner = self.lock();
        match inner
            .ports
            .iter()
            .position(|claim| !claim.foreign && claim.range == range)
        {
            Some(pos) => {
                inner.ports.remove(pos);
                inner.released(SimStep::RequestRegion);
            }
            None => inner.violation(format!("release of unreserved ports {range}")),
        }
    }

    fn cdev_add(
        &self,
        dev: DevNum,
        count: u32,
        ops: Arc<dyn FileOperations>,
    ) -> Result<CdevId, KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::CdevAdd)?;
        let in_region = inner.regions.get(&dev.major()).is_some_and(|region| {
            dev.minor() >= region.first_minor
                && dev.minor() + count <= region.first_minor + region.count
        });
        if count == 0 || !in_region {
            return Err(KernelError::Invalid);
        }
        if (0..count).any(|n| inner.cdevs.values().any(|cdev| cdev.covers(dev.offset(n)))) {
            return Err(KernelError::Exists);
        }
        let id = CdevId::new(inner.next_cdev);
        inner.next_cdev += 1;
        inner.cdevs.insert(id, Cdev { dev, count, ops });
        inner.acquired(SimStep::CdevAdd);
        Ok(id)
    }

    fn cdev_del(&self, cdev: CdevId) {
        let mut inner = self.lock();
        match inner.cdevs.remove(&cdev) {
            Some(entry) => {
                if inner.open.keys().any(|&dev| entry.covers(dev)) {
                    inner.violation(format!("{cdev} deleted while open"));
                }
                inner.released(SimStep::CdevAdd);
            }
            None => inner.violation(format!("delete of unknown {cdev}")),
        }
    }

    fn device_create(&self, class: ClassId, dev: DevNum, name: &str) -> Result<(), KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::DeviceCreate)?;
        if !inner.classes.contains_key(&class) {
            return Err(KernelError::NotFound);
        }
        if inner.nodes.contains_key(name) {
            return Err(KernelError::Exists);
        }
        inner.nodes.insert(name.to_owned(), Node { class, dev });
        inner.acquired(SimStep::DeviceCreate);
        Ok(())
    }

    fn device_destroy(&self, class: ClassId, dev: DevNum) {
        let mut inner = self.lock();
        let name = inner
            .nodes
            .iter()
            .find(|(_, node)| node.class == class && node.dev == dev)
            .map(|(name, _)| name.clone());
        match name {
            Some(name) => {
                inner.nodes.remove(&name);
                inner.released(SimStep::DeviceCreate);
            }
            None => inner.violation(format!("destroy of unknown node {dev} in {class}")),
        }
    }

    fn charge_memory(&self, bytes: usize) -> Result<(), KernelError> {
        let mut inner = self.lock();
        inner.check_fault(SimStep::ChargeMemory)?;
        inner.charges.push(bytes);
        inner.acquired(SimStep::ChargeMemory);
        Ok(())
    }

    fn uncharge_memory(&self, bytes: usize) {
        let mut inner = self.lock();
        match inner.charges.iter().position(|&charged| charged == bytes) {
            Some(pos) => {
                inner.charges.remove(pos);
                inner.released(SimStep::ChargeMemory);
            }
            None => inner.violation(format!("uncharge of {bytes} bytes never charged")),
        }
    }

    fn port_io(&self) -> Arc<dyn PortIo> {
        self.chip.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majors_count_down() {
        let kernel = SimKernel::new();
        let a = kernel.alloc_chrdev_region(0, 2, "a").unwrap();
        let b = kernel.alloc_chrdev_region(0, 1, "b").unwrap();
        assert_eq!(a, DevNum::new(254, 0));
        assert_eq!(b, DevNum::new(253, 0));
        kernel.unregister_chrdev_region(a, 2);
        assert_eq!(
            kernel.alloc_chrdev_region(0, 1, "c").unwrap(),
            DevNum::new(254, 0)
        );
        assert!(kernel.violations().is_empty());
    }

    #[test]
    fn overlapping_ports_are_busy() {
        let kernel = SimKernel::new();
        kernel.request_region(IoPortRange::new(0x70, 2), "cmos0").unwrap();
        assert_eq!(
            kernel.request_region(IoPortRange::new(0x71, 2), "x"),
            Err(KernelError::Busy)
        );
        kernel.claim_ports(IoPortRange::new(0x72, 2), "rtc").unwrap();
        assert_eq!(
            kernel.request_region(IoPortRange::new(0x72, 2), "cmos1"),
            Err(KernelError::Busy)
        );
        assert_eq!(kernel.port_owner(0x73).as_deref(), Some("rtc"));
        assert_eq!(kernel.census().port_regions, 1);
    }

    #[test]
    fn fault_fires_on_nth_call_only() {
        let kernel = SimKernel::new();
        kernel.inject(FaultPlan::new(SimStep::ChargeMemory).nth(2));
        assert!(kernel.charge_memory(8).is_ok());
        assert_eq!(kernel.charge_memory(8), Err(KernelError::NoMemory));
        assert!(kernel.charge_memory(8).is_ok());
        assert_eq!(kernel.census().charges, 2);
        assert_eq!(
            kernel.events(),
            [
                SimEvent::Acquired(SimStep::ChargeMemory),
                SimEvent::Injected(SimStep::ChargeMemory),
                SimEvent::Acquired(SimStep::ChargeMemory),
            ]
        );
    }

    #[test]
    fn fault_error_can_be_overridden() {
        let kernel = SimKernel::new();
        kernel.inject(FaultPlan::new(SimStep::ClassCreate).with_error(KernelError::Invalid));
        assert_eq!(kernel.class_create("c"), Err(KernelError::Invalid));
    }

    #[test]
    fn unmatched_releases_are_violations() {
        let kernel = SimKernel::new();
        kernel.release_region(IoPortRange::new(0x70, 2));
        kernel.class_destroy(ClassId::new(9));
        kernel.uncharge_memory(4);
        assert_eq!(kernel.violations().len(), 3);
    }

    #[test]
    fn cdev_must_sit_inside_a_region() {
        struct Null;
        impl FileOperations for Null {
            fn read(
                &self,
                _: &mut File,
                _: &mut dyn cmos_driver_api::UserWriter,
            ) -> Result<usize, FileError> {
                Ok(0)
            }
            fn write(
                &self,
                _: &mut File,
                buf: &dyn cmos_driver_api::UserReader,
            ) -> Result<usize, FileError> {
                Ok(buf.len())
            }
        }

        let kernel = SimKernel::new();
        let ops: Arc<dyn FileOperations> = Arc::new(Null);
        assert_eq!(
            kernel.cdev_add(DevNum::new(254, 0), 1, ops.clone()),
            Err(KernelError::Invalid)
        );
        let first = kernel.alloc_chrdev_region(0, 2, "n").unwrap();
        let id = kernel.cdev_add(first, 1, ops.clone()).unwrap();
        assert_eq!(kernel.cdev_add(first, 1, ops), Err(KernelError::Exists));

        let class = kernel.class_create("n").unwrap();
        kernel.device_create(class, first, "n0").unwrap();
        let file = kernel.open("/dev/n0", OpenFlags::READ).unwrap();
        assert_eq!(kernel.open_count(first), 1);
        drop(file);
        assert_eq!(kernel.open_handles(), 0);
        assert_eq!(
            kernel.open("n1", OpenFlags::READ).err(),
            Some(FileError::NoDevice)
        );

        kernel.device_destroy(class, first);
        kernel.cdev_del(id);
        kernel.class_destroy(class);
        kernel.unregister_chrdev_region(first, 2);
        assert!(kernel.census().is_empty());
        assert!(kernel.violations().is_empty());
    }

    #[test]
    fn step_names_parse() {
        for step in SimStep::ALL {
            assert_eq!(step.name().parse::<SimStep>(), Ok(step));
        }
        assert!("bogus".parse::<SimStep>().is_err());
    }
}
