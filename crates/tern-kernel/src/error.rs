//! Kernel error types
//!
//! These are returned to the embedding platform and to in-kernel
//! collaborators. Failures caused by a syscall's own arguments never show up
//! here: they are written back into the syscall data as a status.

use alloc::string::String;

use tern_hal::HalError;
use tern_ipc::ThreadId;

use crate::ipc::TransactionId;
use crate::syscall::SyscallId;

/// Inter-process messaging errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IpcError {
    /// Name is registered to another live thread
    #[error("identity '{name}' is held by thread {holder}")]
    IdentityTaken { name: String, holder: ThreadId },

    /// Target mailbox reached its configured depth
    #[error("mailbox of thread {thread} is full ({depth} messages)")]
    MailboxFull { thread: ThreadId, depth: usize },

    /// Payload exceeds the configured message size
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },
}

/// Kernel API errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// Trap carried a number outside the syscall table
    #[error("unknown syscall number {0:#x}")]
    UnknownSyscall(u32),

    /// Trap number and decoded syscall data disagree
    #[error("syscall number {number:#x} does not match {data:?} data")]
    SyscallMismatch { number: u32, data: SyscallId },

    /// Trapping thread is not known to the task manager
    #[error("thread {0} not found")]
    UnknownThread(ThreadId),

    /// No parked caller waits on this transaction
    #[error("no pending transaction {0}")]
    UnknownTransaction(TransactionId),

    /// Reply came from a thread the request was not delivered to
    #[error("transaction {transaction} answered by thread {got}, expected {expected:?}")]
    UnexpectedReplier {
        transaction: TransactionId,
        expected: Option<ThreadId>,
        got: ThreadId,
    },

    #[error("ipc: {0}")]
    Ipc(#[from] IpcError),

    #[error("hal: {0}")]
    Hal(#[from] HalError),
}
