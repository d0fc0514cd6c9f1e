//! Tern OS Kernel: syscall boundary
//!
//! This crate implements the layer between a trapped user-mode request and
//! the kernel services behind it:
//! - Syscall dispatch (one handler per [`SyscallId`])
//! - Spawn delegation to the registered spawner over IPC
//! - Kernquery introspection into caller-owned output regions
//! - IRQ and signal handler registration, signal raising
//!
//! # Control flow
//!
//! ```text
//! trap ──► TrapFrame::decode ──► Kernel::handle_syscall ──► handler
//!                                        │
//!                     Resumption::Resume(frame)  (caller runs again)
//!                     Resumption::Suspended      (spawn parked on a transaction)
//!
//! spawner ──► Kernel::receive_message ... Kernel::reply ──► parked frame resumes
//! ```
//!
//! Every dispatch is recorded in the [`SysLog`] audit trail.

#![no_std]
extern crate alloc;

pub mod config;
pub mod error;
mod handlers;
pub mod ipc;
pub mod pci;
pub mod syscall;
pub mod syslog;
pub mod tasking;


use alloc::collections::BTreeMap;

use tern_hal::{TaskManager, HAL};
use tern_ipc::{ProcessId, ThreadId};

pub use config::KernelConfig;
pub use error::{IpcError, KernelError};
pub use handlers::spawn::SpawnPhase;
pub use ipc::{Message, TransactionId};
pub use pci::PciTable;
pub use syscall::{
    KernqueryData, LogData, RaiseSignalData, RegisterIrqHandlerData, RegisterSignalHandlerData,
    Resumption, SetVideoLogData, SpawnData, SyscallData, SyscallId, TestData, TrapFrame,
};
pub use syslog::{EventId, SysEvent, SysEventType, SysLog, SyscallOutcome};
pub use tasking::TaskRegistry;

// Re-export HAL types
pub use tern_hal::{HalError, PciBus, ThreadView, HAL as HalTrait};

/// Installed interrupt handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqHandler {
    /// Process that claimed the line
    pub process: ProcessId,
    /// Entry address in that process
    pub handler: usize,
}

/// The syscall boundary of one kernel instance.
pub struct Kernel<H: HAL> {
    hal: H,
    config: KernelConfig,
    ipc: ipc::Ipc,
    pending_spawns: BTreeMap<TransactionId, handlers::spawn::PendingSpawn>,
    irq_handlers: BTreeMap<u8, IrqHandler>,
    signal_handlers: BTreeMap<(ProcessId, u32), usize>,
    pending_signals: BTreeMap<ThreadId, u32>,
    syslog: SysLog,
}

impl<H: HAL> Kernel<H> {
    /// Create a kernel with the default configuration.
    pub fn new(hal: H) -> Self {
        Self::with_config(hal, KernelConfig::default())
    }

    pub fn with_config(hal: H, config: KernelConfig) -> Self {
        Self {
            ipc: ipc::Ipc::new(config.mailbox_depth, config.max_message_size),
            syslog: SysLog::new(config.syslog_capacity),
            hal,
            config,
            pending_spawns: BTreeMap::new(),
            irq_handlers: BTreeMap::new(),
            signal_handlers: BTreeMap::new(),
            pending_signals: BTreeMap::new(),
        }
    }

    /// Get reference to HAL.
    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Syscall audit trail
    pub fn syslog(&self) -> &SysLog {
        &self.syslog
    }

    // ========================================================================
    // IPC
    // ========================================================================

    /// Bind a well-known name to a live thread.
    ///
    /// A name held by a thread that no longer exists is taken over. When the
    /// spawner identity is registered, spawn requests parked while it was
    /// absent are delivered to it.
    pub fn register_identity(&mut self, thread: ThreadId, name: &str) -> Result<(), KernelError> {
        let tasks = self.hal.tasks();
        if !tasks.thread_exists(thread) {
            return Err(KernelError::UnknownThread(thread));
        }
        let stale = self
            .ipc
            .resolve(name)
            .is_some_and(|holder| !tasks.thread_exists(holder));

        self.ipc.register_identity(thread, name, stale)?;
        log::debug!("thread {} registered as '{}'", thread, name);

        if name == self.config.spawner_identifier {
            self.deliver_waiting_spawns(thread);
        }
        Ok(())
    }

    pub fn resolve_identity(&self, name: &str) -> Option<ThreadId> {
        self.ipc.resolve(name)
    }

    /// Take the oldest message queued for `thread`.
    ///
    /// When `thread` is the spawner, the freed slot goes to the oldest spawn
    /// still waiting for delivery.
    pub fn receive_message(&mut self, thread: ThreadId) -> Option<Message> {
        let message = self.ipc.receive(thread)?;
        if self.ipc.resolve(&self.config.spawner_identifier) == Some(thread) {
            self.deliver_waiting_spawns(thread);
        }
        Some(message)
    }

    pub fn pending_messages(&self, thread: ThreadId) -> usize {
        self.ipc.pending(thread)
    }

    /// Release kernel state held for a thread that has exited.
    ///
    /// Its mailbox, identities and pending signals are dropped. A spawn it
    /// was parked on is abandoned; spawns delivered to it wait for the next
    /// spawner.
    pub fn thread_exited(&mut self, thread: ThreadId) {
        let released = self.ipc.remove_thread(thread);
        if !released.is_empty() {
            log::debug!("thread {} exited, released {:?}", thread, released);
        }
        self.pending_signals.remove(&thread);
        self.release_spawns_of(thread);
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    /// Handler installed by `process` for `signal`
    pub fn signal_handler(&self, process: ProcessId, signal: u32) -> Option<usize> {
        self.signal_handlers.get(&(process, signal)).copied()
    }

    /// Handler installed for an interrupt line
    pub fn irq_handler(&self, irq: u8) -> Option<IrqHandler> {
        self.irq_handlers.get(&irq).copied()
    }

    /// Bitmask of signals raised on `thread` and not yet taken
    pub fn pending_signals(&self, thread: ThreadId) -> u32 {
        self.pending_signals.get(&thread).copied().unwrap_or(0)
    }

    /// Take and clear the pending signal bitmask of `thread`
    pub fn take_pending_signals(&mut self, thread: ThreadId) -> u32 {
        self.pending_signals.remove(&thread).unwrap_or(0)
    }
}
