//! Syscall handling for Kernel.
//!
//! This module contains the main syscall dispatcher and category-specific
//! handlers. Handlers write their results into the syscall data; only the
//! dispatcher decides which thread runs next.

mod kernquery;
mod misc;
mod signal;
pub(crate) mod spawn;

use tern_hal::{TaskManager, HAL};
use tern_ipc::{ProcessId, SecurityLevel, ThreadId};

use crate::error::KernelError;
use crate::syscall::{Resumption, SyscallData, TrapFrame};
use crate::syslog::SyscallOutcome;
use crate::Kernel;

use spawn::SpawnDelegation;

/// The trapping thread, resolved once per dispatch
#[derive(Clone, Copy, Debug)]
pub(crate) struct Caller {
    pub thread: ThreadId,
    pub process: ProcessId,
    pub security_level: SecurityLevel,
}

/// Handler outcome as seen by the dispatcher
pub(crate) enum Handled {
    Complete,
    Suspend(SpawnDelegation),
}

impl<H: HAL> Kernel<H> {
    /// Handle a syscall trap.
    ///
    /// Returns the frame to resume with its outputs written, or
    /// [`Resumption::Suspended`] when the caller is parked on a spawn
    /// transaction. Errors mean the trap itself was unusable; per-call
    /// failures are statuses inside the frame.
    pub fn handle_syscall(&mut self, mut frame: TrapFrame) -> Result<Resumption, KernelError> {
        let caller = self.caller(frame.thread)?;
        let request_id = self
            .syslog
            .log_request(caller.thread, frame.number(), self.hal.now_nanos());

        let handled = match &mut frame.data {
            // Misc syscalls
            SyscallData::Log(data) => {
                self.handle_log(&caller, data);
                Handled::Complete
            }
            SyscallData::SetVideoLog(data) => {
                self.handle_set_video_log(&caller, data);
                Handled::Complete
            }
            SyscallData::Test(data) => {
                self.handle_test(data);
                Handled::Complete
            }
            SyscallData::Kernquery(data) => {
                self.handle_kernquery(&caller, data);
                Handled::Complete
            }

            // Process syscalls
            SyscallData::Spawn(data) => self.handle_spawn(&caller, data),

            // Registration syscalls
            SyscallData::RegisterIrqHandler(data) => {
                self.handle_register_irq_handler(&caller, data);
                Handled::Complete
            }
            SyscallData::RegisterSignalHandler(data) => {
                self.handle_register_signal_handler(&caller, data);
                Handled::Complete
            }
            SyscallData::RaiseSignal(data) => {
                self.handle_raise_signal(&caller, data);
                Handled::Complete
            }
        };

        match handled {
            Handled::Complete => {
                self.syslog.log_response(
                    caller.thread,
                    request_id,
                    SyscallOutcome::Completed,
                    self.hal.now_nanos(),
                );
                Ok(Resumption::Resume(frame))
            }
            Handled::Suspend(delegation) => {
                let transaction = delegation.transaction;
                self.syslog.log_response(
                    caller.thread,
                    request_id,
                    SyscallOutcome::Suspended {
                        transaction: transaction.0,
                    },
                    self.hal.now_nanos(),
                );
                self.park_spawn(frame, &caller, request_id, delegation);
                Ok(Resumption::Suspended {
                    thread: caller.thread,
                    transaction,
                })
            }
        }
    }

    fn caller(&self, thread: ThreadId) -> Result<Caller, KernelError> {
        self.hal
            .tasks()
            .with_thread(thread, |view| Caller {
                thread: view.id,
                process: view.process,
                security_level: view.security_level,
            })
            .ok_or(KernelError::UnknownThread(thread))
    }
}
