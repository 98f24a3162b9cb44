//! The user/kernel copy boundary.
//!
//! File operations never see raw user pointers. The host runtime hands them a
//! [`UserWriter`] (destination of a `read`) or a [`UserReader`] (source of a
//! `write`); either may fail with [`FileError::Fault`], which the driver must
//! propagate without having changed any device state.

use crate::error::FileError;

/// Destination buffer of a `read` call.
pub trait UserWriter {
    /// Number of bytes the caller asked for.
    fn len(&self) -> usize;

    /// Returns `true` if the caller asked for zero bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `data` to the start of the user buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Fault`] if any byte cannot be written. A failed
    /// copy may have written a prefix of `data`.
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), FileError>;
}

/// Source buffer of a `write` call.
pub trait UserReader {
    /// Number of bytes the caller supplied.
    fn len(&self) -> usize;

    /// Returns `true` if the caller supplied zero bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the first `dst.len()` user bytes into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Fault`] if any byte cannot be read or if
    /// `dst` is longer than the user buffer.
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), FileError>;
}

/// A read-only byte slice already validated as accessible.
#[derive(Debug, Clone, Copy)]
pub struct UserSlice<'a> {
    data: &'a [u8],
}

impl<'a> UserSlice<'a> {
    /// Wraps a validated byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl UserReader for UserSlice<'_> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), FileError> {
        let src = self.data.get(..dst.len()).ok_or(FileError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// A writable byte slice already validated as accessible.
#[derive(Debug)]
pub struct UserSliceMut<'a> {
    data: &'a mut [u8],
}

impl<'a> UserSliceMut<'a> {
    /// Wraps a validated mutable byte slice.
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }
}

impl UserWriter for UserSliceMut<'_> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), FileError> {
        let dst = self.data.get_mut(..data.len()).ok_or(FileError::Fault)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}
