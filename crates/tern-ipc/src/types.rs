//! Shared identifier and record types.
//!
//! These are the values that appear inside syscall data and wire messages.
//! All of them are plain `Copy` data with an explicit on-wire width.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Thread identifier (4 bytes on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process identifier (4 bytes on the wire).
///
/// A process is identified by the id of its main thread.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The "no process" value carried by failed spawn responses.
    pub const NONE: ProcessId = ProcessId(0);

    /// The main thread that represents this process.
    pub fn main_thread(self) -> ThreadId {
        ThreadId(self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ThreadId> for ProcessId {
    fn from(main: ThreadId) -> Self {
        ProcessId(main.0)
    }
}

/// File descriptor (signed, 4 bytes on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fd(pub i32);

impl Fd {
    /// Placeholder for "no descriptor"
    pub const NONE: Fd = Fd(-1);

    /// Whether this value can reference an open descriptor.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for Fd {
    fn default() -> Self {
        Fd::NONE
    }
}

/// Privilege level of a process (1 byte on the wire).
///
/// Lower values are more privileged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SecurityLevel {
    /// Kernel-level tasks
    Kernel = 0,
    /// Drivers: may claim interrupt lines
    Driver = 1,
    /// Regular applications
    Application = 2,
}

impl SecurityLevel {
    /// Convert from u8 value.
    ///
    /// Returns `None` for invalid/unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SecurityLevel::Kernel),
            1 => Some(SecurityLevel::Driver),
            2 => Some(SecurityLevel::Application),
            _ => None,
        }
    }

    /// Whether this level may claim interrupt lines.
    pub fn is_driver_or_above(self) -> bool {
        self <= SecurityLevel::Driver
    }
}

/// Execution type of a thread (1 byte on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThreadType {
    /// The main thread of a process
    Main = 0,
    /// An additional thread of a process
    Sub = 1,
    /// A virtual-8086 helper thread
    Vm86 = 2,
}

impl ThreadType {
    /// Convert from u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ThreadType::Main),
            1 => Some(ThreadType::Sub),
            2 => Some(ThreadType::Vm86),
            _ => None,
        }
    }
}

/// One bus-enumerated PCI device.
///
/// Field order matches the `PCI_GET` output layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciDevice {
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u8,
    pub subclass_code: u8,
    pub prog_if: u8,
}
