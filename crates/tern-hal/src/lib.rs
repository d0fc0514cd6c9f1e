//! Hardware Abstraction Layer traits for Tern OS
//!
//! The syscall boundary consumes only narrow query/enumeration contracts from
//! the rest of the system. This crate defines those contracts so the kernel can
//! run against real subsystems on hardware and against mocks on the host.
//!
//! # Collaborators
//!
//! - [`PciBus`]: enumerated PCI devices, by ordinal position
//! - [`TaskManager`]: live threads and their processes, by position or id
//! - [`HAL`]: the logging sink, video log toggle, physical page counter and clock
//!
//! Enumerable tables are mutated concurrently by unrelated kernel activity.
//! Implementations must run every `*_at(position)` lookup under the table's
//! lock and bounds-check it against the table as it is at that moment.

#![no_std]

use tern_ipc::{Fd, PciDevice, ProcessId, SecurityLevel, ThreadId, ThreadType};

/// Hardware Abstraction Layer trait
///
/// # Associated Types
///
/// - `Pci`: PCI enumerator the kernquery handler reads from
/// - `Tasks`: task manager that owns thread and process records
pub trait HAL: Send + Sync + 'static {
    /// PCI device enumerator
    type Pci: PciBus;
    /// Thread/process manager
    type Tasks: TaskManager;

    fn pci(&self) -> &Self::Pci;

    fn tasks(&self) -> &Self::Tasks;

    // === Logging ===

    /// Write one complete line to the system log
    fn log_write(&self, line: &str);

    /// Toggle mirroring of the system log to the display
    fn set_video_log(&self, enabled: bool);

    // === Memory & Time ===

    /// Number of free physical pages
    fn free_page_count(&self) -> usize;

    /// Get current time in nanoseconds (monotonic)
    fn now_nanos(&self) -> u64;
}

/// Read-only view of the PCI enumeration.
pub trait PciBus: Send + Sync {
    /// Number of enumerated devices
    fn device_count(&self) -> usize;

    /// Device at a zero-based ordinal position, `None` past the end
    fn device_at(&self, position: usize) -> Option<PciDevice>;
}

/// Borrowed view of one live thread, valid for the duration of a lookup.
#[derive(Clone, Copy, Debug)]
pub struct ThreadView<'a> {
    pub id: ThreadId,
    /// Owning process (the id of its main thread)
    pub process: ProcessId,
    pub thread_type: ThreadType,
    /// Security level of the owning process
    pub security_level: SecurityLevel,
    /// Memory used by the thread, in bytes
    pub memory_used: usize,
    /// Identifier set on this thread
    pub identifier: Option<&'a str>,
    /// Identifier set on the owning process's main thread
    pub process_identifier: Option<&'a str>,
    /// Path of the binary the owning process was loaded from
    pub source_path: Option<&'a str>,
}

impl<'a> ThreadView<'a> {
    /// The thread's own identifier, else its process's.
    pub fn display_identifier(&self) -> Option<&'a str> {
        self.identifier.or(self.process_identifier)
    }
}

/// Thread and process manager contract.
///
/// Lookups hand a [`ThreadView`] to a closure instead of returning it so the
/// implementation can keep its lock held while the caller reads.
pub trait TaskManager: Send + Sync {
    /// Number of live threads
    fn thread_count(&self) -> usize;

    /// Run `f` on the thread at a zero-based ordinal position.
    ///
    /// Returns `None` without calling `f` if no thread is at that position.
    fn with_thread_at<R>(&self, position: usize, f: impl FnOnce(&ThreadView<'_>) -> R)
        -> Option<R>;

    /// Run `f` on the thread with the given id.
    fn with_thread<R>(&self, id: ThreadId, f: impl FnOnce(&ThreadView<'_>) -> R) -> Option<R>;

    /// Whether a live thread with this id exists
    fn thread_exists(&self, id: ThreadId) -> bool {
        self.with_thread(id, |_| ()).is_some()
    }

    /// Transfer ownership of descriptors to a process.
    ///
    /// Either every descriptor is adopted or none is.
    fn adopt_descriptors(&self, process: ProcessId, descriptors: &[Fd]) -> Result<(), HalError>;
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// Process not found or already terminated
    #[error("process not found")]
    ProcessNotFound,
    /// Thread not found or already terminated
    #[error("thread not found")]
    ThreadNotFound,
    /// Descriptor value cannot reference an open stream
    #[error("invalid descriptor {0}")]
    InvalidDescriptor(i32),
    /// Descriptor is already owned by the target process
    #[error("descriptor {0} already open")]
    DescriptorInUse(i32),
}
