//! Type-safe identifiers for character-device resources.
//!
//! These newtypes keep device numbers, class handles and cdev handles from
//! being mixed up at compile time.

use core::fmt;

/// Number of bits reserved for the minor part of a [`DevNum`].
pub const MINOR_BITS: u32 = 20;

/// Mask selecting the minor part of a [`DevNum`].
pub const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Largest major number that fits in a [`DevNum`].
pub const MAX_MAJOR: u32 = (1 << (32 - MINOR_BITS)) - 1;

/// Packed character-device number (`major << 20 | minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DevNum(u32);

impl DevNum {
    /// Creates a device number from its major and minor parts.
    ///
    /// Bits outside the respective fields are discarded.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self(((major & MAX_MAJOR) << MINOR_BITS) | (minor & MINOR_MASK))
    }

    /// Returns the major number.
    #[must_use]
    pub const fn major(self) -> u32 {
        self.0 >> MINOR_BITS
    }

    /// Returns the minor number.
    #[must_use]
    pub const fn minor(self) -> u32 {
        self.0 & MINOR_MASK
    }

    /// Returns the device number `n` minors after this one, same major.
    #[must_use]
    pub const fn offset(self, n: u32) -> Self {
        Self::new(self.major(), self.minor() + n)
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Handle to a device class created by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClassId(u32);

impl ClassId {
    /// Creates a new `ClassId`.
    #[must_use]
    pub const fn new(val: u32) -> Self {
        Self(val)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Handle to a registered character-device entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CdevId(u32);

impl CdevId {
    /// Creates a new `CdevId`.
    #[must_use]
    pub const fn new(val: u32) -> Self {
        Self(val)
    }
}

impl fmt::Display for CdevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cdev#{}", self.0)
    }
}
