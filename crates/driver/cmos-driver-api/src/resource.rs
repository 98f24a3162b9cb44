//! Hardware resource descriptions for x86 I/O port claims.

use core::fmt;

/// A contiguous range of x86 I/O ports.
///
/// Describing a range does not claim it; drivers pass the range to
/// [`KernelServices::request_region`](crate::KernelServices::request_region)
/// to reserve it exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoPortRange {
    base: u16,
    size: u16,
}

impl IoPortRange {
    /// Creates a new I/O port range `[base, base + size)`.
    #[must_use]
    pub const fn new(base: u16, size: u16) -> Self {
        Self { base, size }
    }

    /// Returns the base I/O port address.
    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    /// Returns the number of ports in this range.
    #[must_use]
    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Returns one past the last port, widened so `0xFFFF + 1` cannot wrap.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.base as u32 + self.size as u32
    }

    /// Returns `true` if the absolute `port` falls inside this range.
    #[must_use]
    pub const fn contains_port(&self, port: u16) -> bool {
        port >= self.base && (port as u32) < self.end()
    }

    /// Returns `true` if the two ranges share at least one port.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        (self.base as u32) < other.end() && (other.base as u32) < self.end()
    }
}

impl fmt::Display for IoPortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 0 {
            write!(f, "{:#06x} (empty)", self.base)
        } else {
            write!(f, "{:#06x}-{:#06x}", self.base, self.end() - 1)
        }
    }
}
