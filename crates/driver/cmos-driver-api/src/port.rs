//! Port I/O access.
//!
//! Drivers talk to port-mapped hardware through the [`PortIo`] trait so the
//! same driver code runs against real ports ([`RawPortIo`], x86_64 only) or
//! a simulated device on the host.

/// Byte-wide access to the I/O port space.
///
/// Implementations must be safe to call for any port the caller has
/// reserved with [`KernelServices::request_region`](crate::KernelServices::request_region).
pub trait PortIo: Send + Sync {
    /// Reads a byte from `port`.
    fn inb(&self, port: u16) -> u8;

    /// Writes `value` to `port`.
    fn outb(&self, port: u16, value: u8);
}

#[cfg(target_arch = "x86_64")]
pub use raw::{Port, PortRead, PortWrite, RawPortIo};

#[cfg(target_arch = "x86_64")]
mod raw {
    use core::marker::PhantomData;

    use super::PortIo;

    /// Trait for types that can be read from an I/O port.
    ///
    /// # Safety
    ///
    /// Implementations must use the correct `in` instruction variant for the type
    /// size.
    pub unsafe trait PortRead {
        /// Reads a value from the given I/O port.
        ///
        /// # Safety
        ///
        /// The caller must ensure `port` is a valid I/O port that is safe to read.
        unsafe fn read_from_port(port: u16) -> Self;
    }

    /// Trait for types that can be written to an I/O port.
    ///
    /// # Safety
    ///
    /// Implementations must use the correct `out` instruction variant for the type
    /// size.
    pub unsafe trait PortWrite {
        /// Writes a value to the given I/O port.
        ///
        /// # Safety
        ///
        /// The caller must ensure `port` is a valid I/O port that is safe to write.
        unsafe fn write_to_port(port: u16, value: Self);
    }

    // SAFETY: Uses `in al, dx` which reads a single byte.
    unsafe impl PortRead for u8 {
        #[inline]
        unsafe fn read_from_port(port: u16) -> Self {
            let val: u8;
            unsafe {
                core::arch::asm!(
                    "in al, dx",
                    in("dx") port,
                    out("al") val,
                    options(nomem, nostack, preserves_flags),
                );
            }
            val
        }
    }

    // SAFETY: Uses `out dx, al` which writes a single byte.
    unsafe impl PortWrite for u8 {
        #[inline]
        unsafe fn write_to_port(port: u16, value: Self) {
            unsafe {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") port,
                    in("al") value,
                    options(nomem, nostack, preserves_flags),
                );
            }
        }
    }

    /// A read-write I/O port at a fixed address, generic over the value type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Port<T: PortRead + PortWrite> {
        port: u16,
        _phantom: PhantomData<T>,
    }

    impl<T: PortRead + PortWrite> Port<T> {
        /// Creates a new port handle. Does **not** perform any I/O.
        #[inline]
        #[must_use]
        pub const fn new(port: u16) -> Self {
            Self {
                port,
                _phantom: PhantomData,
            }
        }

        /// Returns the port number.
        #[inline]
        #[must_use]
        pub const fn port(&self) -> u16 {
            self.port
        }

        /// Reads a value from this port.
        ///
        /// # Safety
        ///
        /// The caller must ensure this port is valid and safe to read.
        #[inline]
        pub unsafe fn read(&self) -> T {
            unsafe { T::read_from_port(self.port) }
        }

        /// Writes a value to this port.
        ///
        /// # Safety
        ///
        /// The caller must ensure this port is valid and safe to write.
        #[inline]
        pub unsafe fn write(&self, value: T) {
            unsafe { T::write_to_port(self.port, value) }
        }
    }

    /// [`PortIo`] backed by the `in`/`out` instructions.
    ///
    /// Only usable at a privilege level that permits port I/O (ring 0, or a
    /// process granted access via `ioperm`). Constructing it is `unsafe` for
    /// that reason.
    #[derive(Debug)]
    pub struct RawPortIo {
        _private: (),
    }

    impl RawPortIo {
        /// Creates a raw port accessor.
        ///
        /// # Safety
        ///
        /// The caller must be running with I/O privilege for every port that
        /// will be accessed through this value.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl PortIo for RawPortIo {
        fn inb(&self, port: u16) -> u8 {
            // SAFETY: I/O privilege was asserted by the caller of `RawPortIo::new`,
            // and drivers only access ports they reserved.
            unsafe { Port::<u8>::new(port).read() }
        }

        fn outb(&self, port: u16, value: u8) {
            // SAFETY: As for `inb`.
            unsafe { Port::<u8>::new(port).write(value) }
        }
    }
}
