//! Bank descriptor and the file operations shared by every bank node.
//!
//! A [`CmosBank`] owns one index/data port pair. Register `r` is accessed by
//! writing `r` to the index port and then reading or writing the data port.
//! The two steps must not interleave with another caller's, so the cursor
//! lock is held across the whole sequence for every register touched. User
//! copies can fault and are never made with the lock held.

use alloc::string::String;
use alloc::sync::Arc;

use cmos_core::sync::SpinLock;
use cmos_core::{kdebug, ktrace};
use cmos_driver_api::{
    File, FileError, FileOperations, IoPortRange, PortIo, UserReader, UserWriter, Whence,
};

use crate::config::{BankConfig, MAX_BANK_SIZE, TransferMode};
use crate::ioctl::ControlCommand;

/// Byte handed out by a placeholder read.
pub const PLACEHOLDER_BYTE: u8 = b'a';

const SCRATCH_LEN: usize = MAX_BANK_SIZE as usize;

// ---------------------------------------------------------------------------
// CmosBank
// ---------------------------------------------------------------------------

/// One bank: its identity, its port pair and its cursor.
pub struct CmosBank {
    index: u32,
    name: String,
    ports: BankConfig,
    mode: TransferMode,
    io: Arc<dyn PortIo>,
    /// Next register to transfer, in `0..=size`.
    cursor: SpinLock<u16>,
}

impl CmosBank {
    /// Creates the descriptor for bank `index` published as `name`.
    #[must_use]
    pub fn new(
        index: u32,
        name: String,
        ports: BankConfig,
        mode: TransferMode,
        io: Arc<dyn PortIo>,
    ) -> Self {
        Self {
            index,
            name,
            ports,
            mode,
            io,
            cursor: SpinLock::new(0),
        }
    }

    /// Bank index, equal to the node's minor number.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Device node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reserved port pair.
    #[must_use]
    pub const fn ports(&self) -> IoPortRange {
        self.ports.ports()
    }

    /// Number of addressable registers.
    #[must_use]
    pub const fn size(&self) -> u16 {
        self.ports.size
    }

    /// Transfer mode.
    #[must_use]
    pub const fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Current cursor.
    #[must_use]
    pub fn cursor(&self) -> u16 {
        *self.cursor.lock()
    }

    /// Selects `reg` and reads it. Caller holds the cursor lock.
    fn read_register(&self, reg: u16) -> Result<u8, FileError> {
        let index = u8::try_from(reg).map_err(|_| FileError::Io)?;
        self.io.outb(self.ports.index_port, index);
        Ok(self.io.inb(self.ports.data_port))
    }

    /// Selects `reg` and writes `value` to it. Caller holds the cursor lock.
    fn write_register(&self, reg: u16, value: u8) -> Result<(), FileError> {
        let index = u8::try_from(reg).map_err(|_| FileError::Io)?;
        self.io.outb(self.ports.index_port, index);
        self.io.outb(self.ports.data_port, value);
        Ok(())
    }

    // -- Indexed mode -----------------------------------------------------

    fn indexed_read(&self, file: &mut File, buf: &mut dyn UserWriter) -> Result<usize, FileError> {
        let wanted = u16::try_from(buf.len()).unwrap_or(u16::MAX);
        let mut scratch = [0u8; SCRATCH_LEN];

        let (start, count) = {
            let cursor = self.cursor.lock();
            let start = *cursor;
            let count = (self.size() - start).min(wanted);
            for (reg, slot) in (start..).zip(scratch[..usize::from(count)].iter_mut()) {
                *slot = self.read_register(reg)?;
            }
            (start, count)
        };
        if count == 0 {
            file.set_pos(u64::from(start));
            return Ok(0);
        }

        // The copy may fault, so it runs with the cursor unlocked.
        buf.copy_to_user(&scratch[..usize::from(count)])?;

        let mut cursor = self.cursor.lock();
        if *cursor == start {
            *cursor = start + count;
        }
        file.set_pos(u64::from(*cursor));
        ktrace!("{}: read {} bytes at {}", self.name, count, start);
        Ok(usize::from(count))
    }

    fn indexed_write(&self, file: &mut File, buf: &dyn UserReader) -> Result<usize, FileError> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Fetch the source before locking: the copy may fault, and nothing
        // reaches the ports until it is all in hand.
        let fetched = buf.len().min(usize::from(self.size()));
        let mut scratch = [0u8; SCRATCH_LEN];
        buf.copy_from_user(&mut scratch[..fetched])?;

        let mut cursor = self.cursor.lock();
        let start = *cursor;
        let room = self.size() - start;
        if room == 0 {
            return Err(FileError::NoSpace);
        }
        let count = room.min(u16::try_from(fetched).unwrap_or(u16::MAX));
        for (reg, &byte) in (start..).zip(scratch[..usize::from(count)].iter()) {
            self.write_register(reg, byte)?;
        }

        *cursor = start + count;
        file.set_pos(u64::from(*cursor));
        ktrace!("{}: wrote {} bytes at {}", self.name, count, start);
        Ok(usize::from(count))
    }

    fn indexed_seek(&self, file: &mut File, offset: i64, whence: Whence) -> Result<u64, FileError> {
        let mut cursor = self.cursor.lock();
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => i64::from(*cursor),
            Whence::End => i64::from(self.size()),
        };
        let target = base
            .checked_add(offset)
            .and_then(|pos| u16::try_from(pos).ok())
            .filter(|&pos| pos <= self.size())
            .ok_or(FileError::InvalidArgument)?;

        *cursor = target;
        file.set_pos(u64::from(target));
        Ok(u64::from(target))
    }

    fn indexed_control(&self, file: &mut File, cmd: u32) -> Result<usize, FileError> {
        let command = ControlCommand::from_raw(cmd).ok_or(FileError::NotTty)?;
        let mut cursor = self.cursor.lock();
        match command {
            ControlCommand::Reset => {
                *cursor = 0;
                file.set_pos(0);
                Ok(0)
            }
            ControlCommand::GetCursor => Ok(usize::from(*cursor)),
            ControlCommand::GetSize => Ok(usize::from(self.size())),
            ControlCommand::GetBank => Ok(self.index as usize),
        }
    }

    // -- Placeholder mode -------------------------------------------------

    fn placeholder_read(&self, file: &mut File, buf: &mut dyn UserWriter) -> Result<usize, FileError> {
        if !buf.is_empty() {
            buf.copy_to_user(&[PLACEHOLDER_BYTE])?;
        }
        advance(file, buf.len());
        kdebug!("{}: read data end", self.name);
        Ok(0)
    }

    fn placeholder_write(&self, file: &mut File, buf: &dyn UserReader) -> Result<usize, FileError> {
        if !buf.is_empty() {
            let mut byte = [0u8; 1];
            buf.copy_from_user(&mut byte)?;
        }
        advance(file, buf.len());
        kdebug!("{}: write data", self.name);
        Ok(buf.len())
    }
}

/// Moves the file position forward by `count` without touching the cursor.
fn advance(file: &mut File, count: usize) {
    let count = u64::try_from(count).unwrap_or(u64::MAX);
    file.set_pos(file.pos().saturating_add(count));
}

impl core::fmt::Debug for CmosBank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CmosBank")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("ports", &self.ports())
            .field("size", &self.size())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl FileOperations for CmosBank {
    fn open(&self, file: &mut File) -> Result<(), FileError> {
        if self.mode == TransferMode::Indexed {
            file.set_pos(u64::from(self.cursor()));
        }
        kdebug!("{}: open {}", self.name, file);
        Ok(())
    }

    fn release(&self, file: &mut File) {
        kdebug!("{}: release {}", self.name, file);
    }

    fn read(&self, file: &mut File, buf: &mut dyn UserWriter) -> Result<usize, FileError> {
        match self.mode {
            TransferMode::Indexed => self.indexed_read(file, buf),
            TransferMode::Placeholder => self.placeholder_read(file, buf),
        }
    }

    fn write(&self, file: &mut File, buf: &dyn UserReader) -> Result<usize, FileError> {
        match self.mode {
            TransferMode::Indexed => self.indexed_write(file, buf),
            TransferMode::Placeholder => self.placeholder_write(file, buf),
        }
    }

    fn llseek(&self, file: &mut File, offset: i64, whence: Whence) -> Result<u64, FileError> {
        match self.mode {
            TransferMode::Indexed => self.indexed_seek(file, offset, whence),
            TransferMode::Placeholder => Ok(0),
        }
    }

    fn ioctl(&self, file: &mut File, cmd: u32, _arg: usize) -> Result<usize, FileError> {
        match self.mode {
            TransferMode::Indexed => self.indexed_control(file, cmd),
            TransferMode::Placeholder => Ok(0),
        }
    }
}
