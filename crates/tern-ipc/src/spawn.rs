//! Spawner wire protocol.
//!
//! # Request layout (little-endian, packed)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 4 | command (`SPAWN_COMMAND_SPAWN_REQUEST`) |
//! | 4  | 1 | security level |
//! | 5  | 4 | path length |
//! | 9  | 4 | argument-string length |
//! | 13 | 4 | working-directory length |
//! | 17 | 4 | stdin descriptor |
//! | 21 | 4 | stdout descriptor |
//! | 25 | 4 | stderr descriptor |
//! | 29 | … | path, args, workdir (concatenated, no separators) |
//!
//! # Response layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 4 | status |
//! | 4  | 4 | spawned process id |
//! | 8  | 4 | stdin write end |
//! | 12 | 4 | stdout read end |
//! | 16 | 4 | stderr read end |
//!
//! The variable regions are opaque bytes. They are not terminated on the
//! wire; [`crate::wire::terminated`] is the decoder's tool for C-style input.

use alloc::vec::Vec;

use crate::error::ProtocolError;
use crate::spawner::SPAWN_COMMAND_SPAWN_REQUEST;
use crate::types::{Fd, ProcessId, SecurityLevel};
use crate::wire::{decode_i32, decode_u32, decode_u8, take, terminated};

/// Size of the fixed request header preceding the variable regions.
pub const SPAWN_REQUEST_HEADER_SIZE: usize = 29;

/// Size of the fixed response record.
pub const SPAWN_RESPONSE_SIZE: usize = 20;

/// Outcome of a spawn attempt (4 bytes on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SpawnStatus {
    /// Process created; pid and descriptors are valid
    Successful = 0,
    /// Path or target unreachable/unreadable
    IoError = 1,
    /// Resource exhaustion while preparing the process
    MemoryError = 2,
    /// Malformed executable or malformed request
    FormatError = 3,
    /// Anything not otherwise classified
    Unknown = 4,
}

impl SpawnStatus {
    /// Convert from the wire value. Unrecognized values map to `Unknown`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => SpawnStatus::Successful,
            1 => SpawnStatus::IoError,
            2 => SpawnStatus::MemoryError,
            3 => SpawnStatus::FormatError,
            _ => SpawnStatus::Unknown,
        }
    }

    pub fn is_successful(self) -> bool {
        self == SpawnStatus::Successful
    }
}

/// A spawn request, borrowing its three variable regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnRequest<'a> {
    pub security_level: SecurityLevel,
    pub path: &'a [u8],
    pub args: &'a [u8],
    pub workdir: &'a [u8],
    pub stdin: Fd,
    pub stdout: Fd,
    pub stderr: Fd,
}

impl<'a> SpawnRequest<'a> {
    /// Build a request from caller-declared lengths over one string region.
    ///
    /// The region is split at the declared boundaries. Fails if the level is
    /// unknown or the declared lengths do not add up to exactly the region.
    pub fn from_declared(
        security_level: u8,
        lengths: [u32; 3],
        strings: &'a [u8],
        stdio: [Fd; 3],
    ) -> Result<Self, ProtocolError> {
        let security_level =
            SecurityLevel::from_u8(security_level).ok_or(ProtocolError::InvalidValue {
                field: "security_level",
                value: security_level as u32,
            })?;

        let declared = lengths
            .iter()
            .try_fold(0usize, |acc, &len| acc.checked_add(len as usize))
            .unwrap_or(usize::MAX);
        if declared != strings.len() {
            return Err(ProtocolError::LengthMismatch {
                declared,
                available: strings.len(),
            });
        }

        let (path, rest) = strings.split_at(lengths[0] as usize);
        let (args, workdir) = rest.split_at(lengths[1] as usize);

        Ok(Self {
            security_level,
            path,
            args,
            workdir,
            stdin: stdio[0],
            stdout: stdio[1],
            stderr: stdio[2],
        })
    }

    /// Total size of the variable regions.
    pub fn regions_len(&self) -> usize {
        self.path.len() + self.args.len() + self.workdir.len()
    }

    /// Total encoded size: fixed header plus the three regions.
    pub fn encoded_len(&self) -> usize {
        SPAWN_REQUEST_HEADER_SIZE + self.regions_len()
    }

    /// Encode to one contiguous message.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::with_capacity(self.encoded_len());

        bytes.extend_from_slice(&SPAWN_COMMAND_SPAWN_REQUEST.to_le_bytes());
        bytes.push(self.security_level as u8);
        for region in [self.path, self.args, self.workdir] {
            let len = u32::try_from(region.len()).map_err(|_| ProtocolError::InvalidValue {
                field: "region_length",
                value: u32::MAX,
            })?;
            bytes.extend_from_slice(&len.to_le_bytes());
        }
        for fd in [self.stdin, self.stdout, self.stderr] {
            bytes.extend_from_slice(&fd.0.to_le_bytes());
        }
        bytes.extend_from_slice(self.path);
        bytes.extend_from_slice(self.args);
        bytes.extend_from_slice(self.workdir);

        Ok(bytes)
    }

    /// Decode a request (spawner side).
    pub fn decode(data: &'a [u8]) -> Result<Self, ProtocolError> {
        if data.len() < SPAWN_REQUEST_HEADER_SIZE {
            return Err(ProtocolError::TooShort {
                needed: SPAWN_REQUEST_HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut cursor = 0;
        let command = decode_u32(data, &mut cursor)?;
        if command != SPAWN_COMMAND_SPAWN_REQUEST {
            return Err(ProtocolError::UnexpectedCommand {
                expected: SPAWN_COMMAND_SPAWN_REQUEST,
                got: command,
            });
        }

        let level = decode_u8(data, &mut cursor)?;
        let lengths = [
            decode_u32(data, &mut cursor)?,
            decode_u32(data, &mut cursor)?,
            decode_u32(data, &mut cursor)?,
        ];
        let stdio = [
            Fd(decode_i32(data, &mut cursor)?),
            Fd(decode_i32(data, &mut cursor)?),
            Fd(decode_i32(data, &mut cursor)?),
        ];

        let strings = take(data, &mut cursor, data.len() - SPAWN_REQUEST_HEADER_SIZE)?;
        Self::from_declared(level, lengths, strings, stdio)
    }

    /// The path as text, cut at the first NUL if the sender included one.
    pub fn path_str(&self) -> Option<&'a str> {
        core::str::from_utf8(terminated(self.path)).ok()
    }

    /// The argument string as text, cut at the first NUL.
    pub fn args_str(&self) -> Option<&'a str> {
        core::str::from_utf8(terminated(self.args)).ok()
    }

    /// The working directory as text, cut at the first NUL.
    pub fn workdir_str(&self) -> Option<&'a str> {
        core::str::from_utf8(terminated(self.workdir)).ok()
    }
}

/// Spawner reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnResponse {
    pub status: SpawnStatus,
    pub spawned_process_id: ProcessId,
    pub stdin_write: Fd,
    pub stdout_read: Fd,
    pub stderr_read: Fd,
}

impl SpawnResponse {
    /// A response carrying only a failure status.
    pub fn failed(status: SpawnStatus) -> Self {
        Self {
            status,
            spawned_process_id: ProcessId::NONE,
            stdin_write: Fd::NONE,
            stdout_read: Fd::NONE,
            stderr_read: Fd::NONE,
        }
    }

    /// The three redirected descriptors, in stdin/stdout/stderr order.
    pub fn descriptors(&self) -> [Fd; 3] {
        [self.stdin_write, self.stdout_read, self.stderr_read]
    }

    pub fn encode(&self) -> [u8; SPAWN_RESPONSE_SIZE] {
        let mut bytes = [0u8; SPAWN_RESPONSE_SIZE];
        bytes[0..4].copy_from_slice(&(self.status as u32).to_le_bytes());
        bytes[4..8].copy_from_slice(&self.spawned_process_id.0.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.stdin_write.0.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.stdout_read.0.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.stderr_read.0.to_le_bytes());
        bytes
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > SPAWN_RESPONSE_SIZE {
            return Err(ProtocolError::LengthMismatch {
                declared: SPAWN_RESPONSE_SIZE,
                available: data.len(),
            });
        }

        let mut cursor = 0;
        Ok(Self {
            status: SpawnStatus::from_u32(decode_u32(data, &mut cursor)?),
            spawned_process_id: ProcessId(decode_u32(data, &mut cursor)?),
            stdin_write: Fd(decode_i32(data, &mut cursor)?),
            stdout_read: Fd(decode_i32(data, &mut cursor)?),
            stderr_read: Fd(decode_i32(data, &mut cursor)?),
        })
    }
}
