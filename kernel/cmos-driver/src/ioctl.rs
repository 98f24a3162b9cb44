//! Control commands understood by an indexed bank.
//!
//! Command numbers follow the `_IO('c', nr)` layout: the magic byte in bits
//! 8..16 and the command number in bits 0..8.

/// Magic byte shared by every command.
pub const CMOS_IOC_MAGIC: u8 = b'c';

const fn io(nr: u8) -> u32 {
    ((CMOS_IOC_MAGIC as u32) << 8) | nr as u32
}

/// Moves the cursor back to register 0. Returns 0.
pub const CMOS_IOC_RESET: u32 = io(1);
/// Returns the current cursor.
pub const CMOS_IOC_GET_CURSOR: u32 = io(2);
/// Returns the number of registers in the bank.
pub const CMOS_IOC_GET_SIZE: u32 = io(3);
/// Returns the bank index (the node's minor number).
pub const CMOS_IOC_GET_BANK: u32 = io(4);

/// Decoded control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// [`CMOS_IOC_RESET`].
    Reset,
    /// [`CMOS_IOC_GET_CURSOR`].
    GetCursor,
    /// [`CMOS_IOC_GET_SIZE`].
    GetSize,
    /// [`CMOS_IOC_GET_BANK`].
    GetBank,
}

impl ControlCommand {
    /// Decodes a raw command number, or `None` if it is not ours.
    #[must_use]
    pub const fn from_raw(cmd: u32) -> Option<Self> {
        match cmd {
            CMOS_IOC_RESET => Some(Self::Reset),
            CMOS_IOC_GET_CURSOR => Some(Self::GetCursor),
            CMOS_IOC_GET_SIZE => Some(Self::GetSize),
            CMOS_IOC_GET_BANK => Some(Self::GetBank),
            _ => None,
        }
    }

    /// The raw command number.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Reset => CMOS_IOC_RESET,
            Self::GetCursor => CMOS_IOC_GET_CURSOR,
            Self::GetSize => CMOS_IOC_GET_SIZE,
            Self::GetBank => CMOS_IOC_GET_BANK,
        }
    }
}
