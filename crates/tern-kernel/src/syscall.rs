//! Syscall definitions and types
//!
//! This module contains:
//! - The syscall identifier enum decoded from the trap number (ABI)
//! - Per-syscall data records, shared in/out with the caller
//! - The trap frame handed to dispatch and the resumption it returns

use alloc::vec;
use alloc::vec::Vec;

use tern_ipc::{
    Fd, KernqueryStatus, ProcessId, RaiseSignalStatus, RegisterIrqHandlerStatus,
    RegisterSignalHandlerStatus, SecurityLevel, SpawnResponse, SpawnStatus, ThreadId,
};

use crate::error::KernelError;
use crate::ipc::TransactionId;

// ============================================================================
// Canonical Syscall Numbers (re-exported from tern-ipc)
// ============================================================================
// tern-ipc is the single source of truth for all syscall numbers.

pub use tern_ipc::syscall::*;

/// Syscall identifier, one per entry in the dispatch table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SyscallId {
    Log = SYS_LOG,
    SetVideoLog = SYS_SET_VIDEO_LOG,
    Test = SYS_TEST,
    Kernquery = SYS_KERNQUERY,
    Spawn = SYS_SPAWN,
    RegisterIrqHandler = SYS_REGISTER_IRQ_HANDLER,
    RegisterSignalHandler = SYS_REGISTER_SIGNAL_HANDLER,
    RaiseSignal = SYS_RAISE_SIGNAL,
}

impl TryFrom<u32> for SyscallId {
    type Error = KernelError;

    fn try_from(number: u32) -> Result<Self, Self::Error> {
        match number {
            SYS_LOG => Ok(SyscallId::Log),
            SYS_SET_VIDEO_LOG => Ok(SyscallId::SetVideoLog),
            SYS_TEST => Ok(SyscallId::Test),
            SYS_KERNQUERY => Ok(SyscallId::Kernquery),
            SYS_SPAWN => Ok(SyscallId::Spawn),
            SYS_REGISTER_IRQ_HANDLER => Ok(SyscallId::RegisterIrqHandler),
            SYS_REGISTER_SIGNAL_HANDLER => Ok(SyscallId::RegisterSignalHandler),
            SYS_RAISE_SIGNAL => Ok(SyscallId::RaiseSignal),
            _ => Err(KernelError::UnknownSyscall(number)),
        }
    }
}

// ============================================================================
// Syscall data
// ============================================================================

/// `SYS_LOG`: message bytes, sanitized in place
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogData {
    pub message: Vec<u8>,
}

/// `SYS_SET_VIDEO_LOG`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetVideoLogData {
    pub enabled: bool,
}

/// `SYS_TEST`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestData {
    pub test: u32,
    /// out
    pub result: u32,
}

/// `SYS_KERNQUERY`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernqueryData {
    pub command: u16,
    /// Command-specific input
    pub query: Vec<u8>,
    /// Caller-owned output region; its length is the capacity
    pub outbuffer: Vec<u8>,
    /// out
    pub status: KernqueryStatus,
}

impl KernqueryData {
    /// A query with a zeroed output region of `capacity` bytes.
    pub fn new(command: u16, query: &[u8], capacity: usize) -> Self {
        Self {
            command,
            query: query.to_vec(),
            outbuffer: vec![0; capacity],
            status: KernqueryStatus::Successful,
        }
    }
}

/// `SYS_SPAWN`
///
/// Inputs mirror the user-side call: raw security level, three declared
/// lengths over one string region, three stdio descriptors. Outputs are
/// written when the spawner's reply resumes the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnData {
    pub security_level: u8,
    pub path_bytes: u32,
    pub args_bytes: u32,
    pub workdir_bytes: u32,
    /// Path, args and workdir, concatenated
    pub strings: Vec<u8>,
    pub stdin: Fd,
    pub stdout: Fd,
    pub stderr: Fd,

    // out
    pub status: SpawnStatus,
    pub spawned_process_id: ProcessId,
    pub stdin_write: Fd,
    pub stdout_read: Fd,
    pub stderr_read: Fd,
}

impl SpawnData {
    /// Build a request from its parts.
    ///
    /// A part of 4 GiB or more is declared as `u32::MAX` bytes, which the
    /// dispatcher rejects as `FORMAT_ERROR`.
    pub fn new(
        security_level: SecurityLevel,
        path: &str,
        args: &str,
        workdir: &str,
        stdio: [Fd; 3],
    ) -> Self {
        let mut strings = Vec::with_capacity(path.len() + args.len() + workdir.len());
        strings.extend_from_slice(path.as_bytes());
        strings.extend_from_slice(args.as_bytes());
        strings.extend_from_slice(workdir.as_bytes());

        Self {
            security_level: security_level as u8,
            path_bytes: declared_len(path.len()),
            args_bytes: declared_len(args.len()),
            workdir_bytes: declared_len(workdir.len()),
            strings,
            stdin: stdio[0],
            stdout: stdio[1],
            stderr: stdio[2],
            status: SpawnStatus::Unknown,
            spawned_process_id: ProcessId::NONE,
            stdin_write: Fd::NONE,
            stdout_read: Fd::NONE,
            stderr_read: Fd::NONE,
        }
    }

    pub fn lengths(&self) -> [u32; 3] {
        [self.path_bytes, self.args_bytes, self.workdir_bytes]
    }

    pub fn stdio(&self) -> [Fd; 3] {
        [self.stdin, self.stdout, self.stderr]
    }

    /// Copy a response into the output fields.
    ///
    /// Process id and descriptors are cleared unless the status is successful.
    pub fn complete(&mut self, response: &SpawnResponse) {
        let response = if response.status.is_successful() {
            *response
        } else {
            SpawnResponse::failed(response.status)
        };
        self.status = response.status;
        self.spawned_process_id = response.spawned_process_id;
        self.stdin_write = response.stdin_write;
        self.stdout_read = response.stdout_read;
        self.stderr_read = response.stderr_read;
    }
}

/// Length field for a spawn region, saturated at `u32::MAX`
fn declared_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// `SYS_REGISTER_IRQ_HANDLER`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterIrqHandlerData {
    pub irq: u8,
    /// Handler entry address in the caller's address space
    pub handler: usize,
    /// out
    pub status: RegisterIrqHandlerStatus,
}

/// `SYS_REGISTER_SIGNAL_HANDLER`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterSignalHandlerData {
    pub signal: u32,
    /// Handler entry address; 0 removes the handler
    pub handler: usize,
    /// out: previously installed handler, 0 if none
    pub previous: usize,
    /// out
    pub status: RegisterSignalHandlerStatus,
}

/// `SYS_RAISE_SIGNAL`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaiseSignalData {
    pub target: ThreadId,
    pub signal: u32,
    /// out
    pub status: RaiseSignalStatus,
}

/// Syscall data for one trap, typed by syscall
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyscallData {
    Log(LogData),
    SetVideoLog(SetVideoLogData),
    Test(TestData),
    Kernquery(KernqueryData),
    Spawn(SpawnData),
    RegisterIrqHandler(RegisterIrqHandlerData),
    RegisterSignalHandler(RegisterSignalHandlerData),
    RaiseSignal(RaiseSignalData),
}

impl SyscallData {
    /// The dispatch table entry this data belongs to
    pub fn id(&self) -> SyscallId {
        match self {
            SyscallData::Log(_) => SyscallId::Log,
            SyscallData::SetVideoLog(_) => SyscallId::SetVideoLog,
            SyscallData::Test(_) => SyscallId::Test,
            SyscallData::Kernquery(_) => SyscallId::Kernquery,
            SyscallData::Spawn(_) => SyscallId::Spawn,
            SyscallData::RegisterIrqHandler(_) => SyscallId::RegisterIrqHandler,
            SyscallData::RegisterSignalHandler(_) => SyscallId::RegisterSignalHandler,
            SyscallData::RaiseSignal(_) => SyscallId::RaiseSignal,
        }
    }

    pub fn as_spawn(&self) -> Option<&SpawnData> {
        match self {
            SyscallData::Spawn(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_spawn_mut(&mut self) -> Option<&mut SpawnData> {
        match self {
            SyscallData::Spawn(data) => Some(data),
            _ => None,
        }
    }
}

// ============================================================================
// Trap frame
// ============================================================================

/// A trapped syscall: the calling thread and its syscall data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrapFrame {
    pub thread: ThreadId,
    pub data: SyscallData,
}

impl TrapFrame {
    pub fn new(thread: ThreadId, data: SyscallData) -> Self {
        Self { thread, data }
    }

    /// Validate a raw trap number against the decoded data.
    ///
    /// Unknown numbers never reach the dispatch table.
    pub fn decode(thread: ThreadId, number: u32, data: SyscallData) -> Result<Self, KernelError> {
        let id = SyscallId::try_from(number)?;
        if data.id() != id {
            return Err(KernelError::SyscallMismatch {
                number,
                data: data.id(),
            });
        }
        Ok(Self { thread, data })
    }

    pub fn number(&self) -> u32 {
        self.data.id() as u32
    }
}

/// What the scheduler runs after a dispatch step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resumption {
    /// Resume the caller; its outputs are written into the frame
    Resume(TrapFrame),
    /// Caller is parked on a transaction; schedule something else
    Suspended {
        thread: ThreadId,
        transaction: TransactionId,
    },
}

impl Resumption {
    /// The frame to resume, if the caller was not parked
    pub fn into_frame(self) -> Option<TrapFrame> {
        match self {
            Resumption::Resume(frame) => Some(frame),
            Resumption::Suspended { .. } => None,
        }
    }
}
