//! Registration status codes.
//!
//! Each registration-type syscall writes one of these (1 byte) back into its
//! syscall data. Values are fixed: user space compares against the raw byte.

/// Result of `SYS_REGISTER_IRQ_HANDLER`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterIrqHandlerStatus {
    Successful = 0,
    /// Caller is below driver privilege
    NotPermitted = 1,
}

/// Result of `SYS_REGISTER_SIGNAL_HANDLER`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterSignalHandlerStatus {
    Successful = 0,
    /// Signal number outside `0..SIG_COUNT`
    InvalidSignal = 1,
}

/// Result of `SYS_RAISE_SIGNAL`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RaiseSignalStatus {
    Successful = 0,
    InvalidSignal = 1,
    /// No live thread with the target id
    InvalidTarget = 2,
}

impl RegisterIrqHandlerStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::NotPermitted),
            _ => None,
        }
    }
}

impl RegisterSignalHandlerStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::InvalidSignal),
            _ => None,
        }
    }
}

impl RaiseSignalStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::InvalidSignal),
            2 => Some(Self::InvalidTarget),
            _ => None,
        }
    }
}
