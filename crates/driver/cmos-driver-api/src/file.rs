//! Open files and the character-device file-operations contract.

use core::fmt;

use bitflags::bitflags;
use cmos_core::id::DevNum;

use crate::error::FileError;
use crate::user::{UserReader, UserWriter};

bitflags! {
    /// Flags for opening a device node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ     = 0b0001;
        /// Open for writing.
        const WRITE    = 0b0010;
        /// Fail instead of waiting when the device is busy.
        const NONBLOCK = 0b0100;
    }
}

impl OpenFlags {
    /// Read and write access.
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
}

/// `lseek` whence: absolute offset.
pub const SEEK_SET: u32 = 0;
/// `lseek` whence: relative to the current position.
pub const SEEK_CUR: u32 = 1;
/// `lseek` whence: relative to the end.
pub const SEEK_END: u32 = 2;

/// Reference point for [`FileOperations::llseek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset is absolute (`SEEK_SET`).
    Set,
    /// Offset is relative to the current position (`SEEK_CUR`).
    Current,
    /// Offset is relative to the end of the device (`SEEK_END`).
    End,
}

impl Whence {
    /// Decodes a POSIX `whence` value.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::InvalidArgument`] for anything but `SEEK_SET`,
    /// `SEEK_CUR` or `SEEK_END`.
    pub const fn from_raw(raw: u32) -> Result<Self, FileError> {
        match raw {
            SEEK_SET => Ok(Self::Set),
            SEEK_CUR => Ok(Self::Current),
            SEEK_END => Ok(Self::End),
            _ => Err(FileError::InvalidArgument),
        }
    }
}

/// Per-open state the host passes to every file operation.
#[derive(Debug, Clone)]
pub struct File {
    dev: DevNum,
    flags: OpenFlags,
    pos: u64,
}

impl File {
    /// Creates the state for a freshly opened node.
    #[must_use]
    pub const fn new(dev: DevNum, flags: OpenFlags) -> Self {
        Self { dev, flags, pos: 0 }
    }

    /// Device number of the opened node.
    #[must_use]
    pub const fn dev(&self) -> DevNum {
        self.dev
    }

    /// Minor number of the opened node.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.dev.minor()
    }

    /// Flags given at open time.
    #[must_use]
    pub const fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Current file position.
    #[must_use]
    pub const fn pos(&self) -> u64 {
        self.pos
    }

    /// Updates the file position.
    pub fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file({}, pos={})", self.dev, self.pos)
    }
}

/// Handlers the host dispatches user-space calls on a device node to.
///
/// One implementation is registered per cdev. All handlers run
/// synchronously on the caller's context and must not block indefinitely.
pub trait FileOperations: Send + Sync {
    /// Called when the node is opened.
    ///
    /// # Errors
    ///
    /// An error aborts the open; the host does not call [`release`](Self::release).
    fn open(&self, file: &mut File) -> Result<(), FileError> {
        let _ = file;
        Ok(())
    }

    /// Called when the last reference to an open file is dropped.
    fn release(&self, file: &mut File) {
        let _ = file;
    }

    /// Reads up to `buf.len()` bytes. `Ok(0)` means end of stream.
    ///
    /// # Errors
    ///
    /// Implementation-defined; [`FileError::Fault`] for a failed user copy.
    fn read(&self, file: &mut File, buf: &mut dyn UserWriter) -> Result<usize, FileError>;

    /// Writes up to `buf.len()` bytes and returns how many were consumed.
    ///
    /// # Errors
    ///
    /// Implementation-defined; [`FileError::Fault`] for a failed user copy.
    fn write(&self, file: &mut File, buf: &dyn UserReader) -> Result<usize, FileError>;

    /// Repositions the file and returns the new position.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::InvalidArgument`] by default.
    fn llseek(&self, file: &mut File, offset: i64, whence: Whence) -> Result<u64, FileError> {
        let _ = (file, offset, whence);
        Err(FileError::InvalidArgument)
    }

    /// Executes a device-specific control command.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::NotTty`] by default.
    fn ioctl(&self, file: &mut File, cmd: u32, arg: usize) -> Result<usize, FileError> {
        let _ = (file, cmd, arg);
        Err(FileError::NotTty)
    }
}
