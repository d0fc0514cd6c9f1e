//! IPC Protocol & Syscall Constants for Tern OS
//!
//! This crate defines:
//! - **Syscall numbers** (Thread → Kernel operations)
//! - **Spawner protocol** tags and wire layout (Kernel ↔ Spawner)
//! - **Kernquery** command identifiers and fixed-size output layouts
//! - **Shared identifiers** (thread/process ids, descriptors, PCI records)
//!
//! It is the **single source of truth** for every byte exchanged between the
//! kernel and independently built user components.
//!
//! # Syscall Number Ranges
//!
//! | Range | Category |
//! |-------|----------|
//! | 0x01-0x0F | Misc (log, video log, test, kernquery) |
//! | 0x10-0x1F | Process (spawn) |
//! | 0x20-0x2F | Registration (irq handler, signal handler, raise) |
//!
//! # Kernquery Command Ranges
//!
//! | Range | Subsystem |
//! |-------|-----------|
//! | 0x500-0x5FF | PCI enumeration |
//! | 0x600-0x6FF | Task enumeration |
//!
//! # Wire Encoding
//!
//! Every structure is a packed, fixed-field-order, little-endian record.
//! Nothing is ever read by aliasing memory as a typed struct: see [`wire`]
//! for the bounds-checked cursor helpers.

#![no_std]

extern crate alloc;

pub mod error;
pub mod kernquery;
pub mod spawn;
pub mod status;
pub mod types;
pub mod wire;

pub use error::ProtocolError;
pub use kernquery::{KernqueryCommand, KernqueryStatus, TaskSnapshot};
pub use spawn::{SpawnRequest, SpawnResponse, SpawnStatus};
pub use status::{RaiseSignalStatus, RegisterIrqHandlerStatus, RegisterSignalHandlerStatus};
pub use types::{Fd, PciDevice, ProcessId, SecurityLevel, ThreadId, ThreadType};

// =============================================================================
// Syscall Numbers (Thread → Kernel operations)
// =============================================================================

/// Syscall numbers - these are placed in the trap frame by user space.
pub mod syscall {
    // === Misc (0x01 - 0x0F) ===
    /// Write a message to the system log
    pub const SYS_LOG: u32 = 0x01;
    /// Toggle mirroring of the log to the screen
    pub const SYS_SET_VIDEO_LOG: u32 = 0x02;
    /// Diagnostic hook (code 1 = free physical pages)
    pub const SYS_TEST: u32 = 0x03;
    /// Read-only kernel introspection
    pub const SYS_KERNQUERY: u32 = 0x04;

    // === Process (0x10 - 0x1F) ===
    /// Spawn a process through the registered spawner (suspends the caller)
    pub const SYS_SPAWN: u32 = 0x10;

    // === Registration (0x20 - 0x2F) ===
    /// Claim an interrupt line (driver privilege required)
    pub const SYS_REGISTER_IRQ_HANDLER: u32 = 0x20;
    /// Install a signal handler for the calling process
    pub const SYS_REGISTER_SIGNAL_HANDLER: u32 = 0x21;
    /// Raise a signal on another thread
    pub const SYS_RAISE_SIGNAL: u32 = 0x22;
}

// Re-export syscall constants at crate root for convenience
pub use syscall::*;

// =============================================================================
// Spawner Protocol
// =============================================================================

/// Spawner protocol messages.
///
/// The spawning process registers itself under [`spawner::SPAWNER_IDENTIFIER`]
/// so the kernel can address spawn requests to it.
pub mod spawner {
    /// Well-known identity of the process that performs process creation.
    pub const SPAWNER_IDENTIFIER: &str = "spawner";

    /// Kernel → Spawner: spawn request.
    /// Payload: see [`crate::spawn::SpawnRequest`]
    pub const SPAWN_COMMAND_SPAWN_REQUEST: u32 = 1;

    /// Spawner → Kernel: spawn response.
    /// Payload: see [`crate::spawn::SpawnResponse`]
    pub const SPAWN_COMMAND_SPAWN_RESPONSE: u32 = 2;
}

pub use spawner::{SPAWNER_IDENTIFIER, SPAWN_COMMAND_SPAWN_REQUEST, SPAWN_COMMAND_SPAWN_RESPONSE};

// =============================================================================
// Signals
// =============================================================================

/// Signal numbering.
pub mod signal {
    /// Number of recognized signals; valid signals are `0..SIG_COUNT`.
    pub const SIG_COUNT: u32 = 32;

    /// Check whether a signal number is in the recognized set.
    pub const fn is_valid(signal: u32) -> bool {
        signal < SIG_COUNT
    }
}
