//! Host and file-operation error types.

use core::fmt;

// ── Error numbers ────────────────────────────────────────────────────

/// `ENOENT`: no such file or directory.
pub const ENOENT: isize = 2;
/// `EIO`: I/O error.
pub const EIO: isize = 5;
/// `EBADF`: bad file descriptor.
pub const EBADF: isize = 9;
/// `ENOMEM`: out of memory.
pub const ENOMEM: isize = 12;
/// `EFAULT`: bad address.
pub const EFAULT: isize = 14;
/// `EBUSY`: device or resource busy.
pub const EBUSY: isize = 16;
/// `EEXIST`: file exists.
pub const EEXIST: isize = 17;
/// `ENODEV`: no such device.
pub const ENODEV: isize = 19;
/// `EINVAL`: invalid argument.
pub const EINVAL: isize = 22;
/// `ENOTTY`: inappropriate ioctl for device.
pub const ENOTTY: isize = 25;
/// `ENOSPC`: no space left on device.
pub const ENOSPC: isize = 28;

/// Failures reported by the host runtime's registration services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The resource is already claimed by someone else.
    Busy,
    /// The host could not allocate memory for the request.
    NoMemory,
    /// No free device numbers remain.
    NoSpace,
    /// The request was malformed.
    Invalid,
    /// The referenced object does not exist.
    NotFound,
    /// An object with the same identity already exists.
    Exists,
}

impl KernelError {
    /// Returns the negative errno for this error.
    #[must_use]
    pub const fn errno(self) -> isize {
        match self {
            Self::Busy => -EBUSY,
            Self::NoMemory => -ENOMEM,
            Self::NoSpace => -ENOSPC,
            Self::Invalid => -EINVAL,
            Self::NotFound => -ENOENT,
            Self::Exists => -EEXIST,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("resource busy"),
            Self::NoMemory => f.write_str("out of memory"),
            Self::NoSpace => f.write_str("no device numbers left"),
            Self::Invalid => f.write_str("invalid request"),
            Self::NotFound => f.write_str("not found"),
            Self::Exists => f.write_str("already exists"),
        }
    }
}

/// Errors surfaced to user-space callers of file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// Copying across the user/kernel boundary failed.
    Fault,
    /// An argument (offset, whence) was out of range.
    InvalidArgument,
    /// A write started at or past the end of the device.
    NoSpace,
    /// The control command is not recognised by this device.
    NotTty,
    /// The handle was not opened with the access the call needs.
    BadDescriptor,
    /// The device node exists but no driver backs it.
    NoDevice,
    /// A hardware access failed.
    Io,
}

impl FileError {
    /// Returns the negative errno for this error.
    #[must_use]
    pub const fn errno(self) -> isize {
        match self {
            Self::Fault => -EFAULT,
            Self::InvalidArgument => -EINVAL,
            Self::NoSpace => -ENOSPC,
            Self::NotTty => -ENOTTY,
            Self::BadDescriptor => -EBADF,
            Self::NoDevice => -ENODEV,
            Self::Io => -EIO,
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault => f.write_str("bad address"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::NoSpace => f.write_str("no space left on device"),
            Self::NotTty => f.write_str("inappropriate ioctl for device"),
            Self::BadDescriptor => f.write_str("bad file descriptor"),
            Self::NoDevice => f.write_str("no such device"),
            Self::Io => f.write_str("I/O error"),
        }
    }
}

impl core::error::Error for KernelError {}
impl core::error::Error for FileError {}
