//! Kernquery protocol: read-only kernel introspection.
//!
//! A query names a 16-bit command, carries an opaque input region and a
//! caller-owned output region of fixed capacity. The kernel side writes with
//! the `encode_*` functions, which check the full layout against the
//! capacity before touching a single byte. The user side reads with the
//! `decode_*` functions.
//!
//! # Output layouts (little-endian, packed)
//!
//! `PCI_COUNT` / `TASK_COUNT`: `count: u32`
//!
//! `PCI_GET`:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 1 | found |
//! | 1  | 1 | bus |
//! | 2  | 1 | slot |
//! | 3  | 1 | function |
//! | 4  | 2 | vendor id |
//! | 6  | 2 | device id |
//! | 8  | 1 | class code |
//! | 9  | 1 | subclass code |
//! | 10 | 1 | programming interface |
//!
//! `TASK_GET_BY_POS`:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0   | 1    | found |
//! | 1   | 4    | thread id |
//! | 5   | 4    | parent process id |
//! | 9   | 1    | thread type |
//! | 10  | 4    | memory used (bytes) |
//! | 14  | 512  | identifier (NUL-terminated) |
//! | 526 | 1024 | source path (NUL-terminated) |
//!
//! When `found` is 0 no other field is written.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{PciDevice, ProcessId, ThreadId, ThreadType};
use crate::wire::{
    copy_bounded, decode_u16, decode_u32, decode_u8, ensure_capacity, put_u16, put_u32, put_u8,
    take, terminated,
};

// =============================================================================
// Commands and status
// =============================================================================

/// Number of enumerated PCI devices
pub const KERNQUERY_PCI_COUNT: u16 = 0x500;
/// PCI device at an ordinal position
pub const KERNQUERY_PCI_GET: u16 = 0x501;
/// Number of live threads
pub const KERNQUERY_TASK_COUNT: u16 = 0x600;
/// Thread snapshot at an ordinal position
pub const KERNQUERY_TASK_GET_BY_POS: u16 = 0x601;

/// Known kernquery commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum KernqueryCommand {
    PciCount = KERNQUERY_PCI_COUNT,
    PciGet = KERNQUERY_PCI_GET,
    TaskCount = KERNQUERY_TASK_COUNT,
    TaskGetByPos = KERNQUERY_TASK_GET_BY_POS,
}

impl KernqueryCommand {
    /// Convert from the raw command identifier.
    ///
    /// Returns `None` for identifiers outside the command space.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            KERNQUERY_PCI_COUNT => Some(KernqueryCommand::PciCount),
            KERNQUERY_PCI_GET => Some(KernqueryCommand::PciGet),
            KERNQUERY_TASK_COUNT => Some(KernqueryCommand::TaskCount),
            KERNQUERY_TASK_GET_BY_POS => Some(KernqueryCommand::TaskGetByPos),
            _ => None,
        }
    }
}

/// Status written by every kernquery (1 byte)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KernqueryStatus {
    /// Output region holds a result
    Successful = 0,
    /// Command identifier not recognized; output untouched
    UnknownId = 1,
    /// Query input too short or output region too small; output untouched
    MalformedBuffer = 2,
}

impl KernqueryStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KernqueryStatus::Successful),
            1 => Some(KernqueryStatus::UnknownId),
            2 => Some(KernqueryStatus::MalformedBuffer),
            _ => None,
        }
    }
}

// =============================================================================
// Layout sizes
// =============================================================================

/// `count: u32`
pub const COUNT_OUT_SIZE: usize = 4;
/// `position: u32`
pub const POSITION_IN_SIZE: usize = 4;
/// See the `PCI_GET` table above
pub const PCI_GET_OUT_SIZE: usize = 11;
/// Capacity of the identifier field, terminator included
pub const TASK_IDENTIFIER_CAPACITY: usize = 512;
/// Capacity of the source path field, terminator included
pub const TASK_SOURCE_PATH_CAPACITY: usize = 1024;

const TASK_IDENTIFIER_OFFSET: usize = 14;
const TASK_SOURCE_PATH_OFFSET: usize = TASK_IDENTIFIER_OFFSET + TASK_IDENTIFIER_CAPACITY;

/// See the `TASK_GET_BY_POS` table above
pub const TASK_GET_OUT_SIZE: usize = TASK_SOURCE_PATH_OFFSET + TASK_SOURCE_PATH_CAPACITY;

// =============================================================================
// Query input
// =============================================================================

/// Encode a positional query input (user side).
pub fn encode_position(position: u32) -> [u8; POSITION_IN_SIZE] {
    position.to_le_bytes()
}

/// Decode a positional query input.
pub fn decode_position(query: &[u8]) -> Result<u32, ProtocolError> {
    let mut cursor = 0;
    decode_u32(query, &mut cursor)
}

// =============================================================================
// Counts
// =============================================================================

pub fn encode_count(out: &mut [u8], count: usize) -> Result<(), ProtocolError> {
    ensure_capacity(out, COUNT_OUT_SIZE)?;
    put_u32(out, 0, u32::try_from(count).unwrap_or(u32::MAX))
}

pub fn decode_count(out: &[u8]) -> Result<u32, ProtocolError> {
    let mut cursor = 0;
    decode_u32(out, &mut cursor)
}

// =============================================================================
// PCI_GET
// =============================================================================

/// Write a `PCI_GET` result; `None` writes only `found = 0`.
pub fn encode_pci_get(out: &mut [u8], device: Option<&PciDevice>) -> Result<(), ProtocolError> {
    ensure_capacity(out, PCI_GET_OUT_SIZE)?;

    let Some(device) = device else {
        return put_u8(out, 0, 0);
    };

    put_u8(out, 0, 1)?;
    put_u8(out, 1, device.bus)?;
    put_u8(out, 2, device.slot)?;
    put_u8(out, 3, device.function)?;
    put_u16(out, 4, device.vendor_id)?;
    put_u16(out, 6, device.device_id)?;
    put_u8(out, 8, device.class_code)?;
    put_u8(out, 9, device.subclass_code)?;
    put_u8(out, 10, device.prog_if)
}

/// Read a `PCI_GET` result; `None` means no device at that position.
pub fn decode_pci_get(out: &[u8]) -> Result<Option<PciDevice>, ProtocolError> {
    let mut cursor = 0;
    if decode_u8(out, &mut cursor)? == 0 {
        return Ok(None);
    }

    Ok(Some(PciDevice {
        bus: decode_u8(out, &mut cursor)?,
        slot: decode_u8(out, &mut cursor)?,
        function: decode_u8(out, &mut cursor)?,
        vendor_id: decode_u16(out, &mut cursor)?,
        device_id: decode_u16(out, &mut cursor)?,
        class_code: decode_u8(out, &mut cursor)?,
        subclass_code: decode_u8(out, &mut cursor)?,
        prog_if: decode_u8(out, &mut cursor)?,
    }))
}

// =============================================================================
// TASK_GET_BY_POS
// =============================================================================

/// Kernel-side view of one thread for `TASK_GET_BY_POS`.
///
/// Strings are borrowed from the task manager for the duration of the write.
#[derive(Clone, Copy, Debug)]
pub struct TaskRecord<'a> {
    pub id: ThreadId,
    pub parent: ProcessId,
    pub task_type: ThreadType,
    pub memory_used: usize,
    pub identifier: Option<&'a str>,
    pub source_path: Option<&'a str>,
}

impl TaskRecord<'_> {
    /// Write this record with `found = 1`.
    ///
    /// Strings are truncated to their field capacity and always terminated.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        ensure_capacity(out, TASK_GET_OUT_SIZE)?;

        put_u8(out, 0, 1)?;
        put_u32(out, 1, self.id.0)?;
        put_u32(out, 5, self.parent.0)?;
        put_u8(out, 9, self.task_type as u8)?;
        put_u32(out, 10, u32::try_from(self.memory_used).unwrap_or(u32::MAX))?;

        copy_bounded(
            &mut out[TASK_IDENTIFIER_OFFSET..TASK_SOURCE_PATH_OFFSET],
            self.identifier.map(str::as_bytes),
        );
        copy_bounded(
            &mut out[TASK_SOURCE_PATH_OFFSET..TASK_GET_OUT_SIZE],
            self.source_path.map(str::as_bytes),
        );
        Ok(())
    }
}

/// Write a `TASK_GET_BY_POS` miss (`found = 0`).
pub fn encode_task_not_found(out: &mut [u8]) -> Result<(), ProtocolError> {
    ensure_capacity(out, TASK_GET_OUT_SIZE)?;
    put_u8(out, 0, 0)
}

/// User-side copy of a `TASK_GET_BY_POS` result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: ThreadId,
    pub parent: ProcessId,
    pub task_type: ThreadType,
    pub memory_used: u32,
    /// Empty when the thread has no identifier
    pub identifier: String,
    /// Empty when the process has no source path
    pub source_path: String,
}

impl TaskSnapshot {
    /// Read a `TASK_GET_BY_POS` result; `None` means no thread at that position.
    pub fn decode(out: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let mut cursor = 0;
        if decode_u8(out, &mut cursor)? == 0 {
            return Ok(None);
        }

        let id = ThreadId(decode_u32(out, &mut cursor)?);
        let parent = ProcessId(decode_u32(out, &mut cursor)?);
        let raw_type = decode_u8(out, &mut cursor)?;
        let task_type = ThreadType::from_u8(raw_type).ok_or(ProtocolError::InvalidValue {
            field: "task_type",
            value: raw_type as u32,
        })?;
        let memory_used = decode_u32(out, &mut cursor)?;
        let identifier = take(out, &mut cursor, TASK_IDENTIFIER_CAPACITY)?;
        let source_path = take(out, &mut cursor, TASK_SOURCE_PATH_CAPACITY)?;

        Ok(Some(Self {
            id,
            parent,
            task_type,
            memory_used,
            identifier: String::from_utf8_lossy(terminated(identifier)).into_owned(),
            source_path: String::from_utf8_lossy(terminated(source_path)).into_owned(),
        }))
    }
}
