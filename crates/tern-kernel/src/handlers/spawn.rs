//! Spawn delegation.
//!
//! The kernel never creates processes itself. A spawn request is encoded and
//! sent to whichever thread holds the spawner identity, and the caller parks
//! on the request's transaction:
//!
//! ```text
//! handle_spawn ── malformed ──────────────────────────► FORMAT_ERROR, resume
//!      │          send fails ─────────────────────────► IO_ERROR, resume
//!      │          no spawner ──► AwaitingSpawner ──┐ (register_identity)
//!      └────────────────────────► AwaitingReply ◄──┘
//!                                       │ reply()
//!                                       ▼
//!                            decoded, descriptors adopted, resume
//! ```
//!
//! Requests parked while no spawner is registered, or while its mailbox is
//! full, are delivered in transaction order when a spawner registers and
//! each time it takes a message. There is no timeout. An absent or silent
//! spawner leaves the caller parked until one answers or the caller exits.

use alloc::vec::Vec;

use log::{debug, warn};
use tern_hal::{TaskManager, HAL};
use tern_ipc::{
    Fd, ProcessId, SpawnRequest, SpawnResponse, SpawnStatus, ThreadId,
    SPAWN_COMMAND_SPAWN_REQUEST, SPAWN_COMMAND_SPAWN_RESPONSE,
};

use super::{Caller, Handled};
use crate::error::{IpcError, KernelError};
use crate::ipc::{Message, TransactionId};
use crate::syscall::{SpawnData, TrapFrame};
use crate::syslog::{EventId, SyscallOutcome};
use crate::Kernel;

/// Where a parked spawn stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnPhase {
    /// No spawner registered; the request is held by the kernel
    AwaitingSpawner { transaction: TransactionId },
    /// Request delivered; waiting for the spawner's reply
    AwaitingReply {
        transaction: TransactionId,
        spawner: ThreadId,
    },
}

/// An encoded request handed back to the dispatcher for parking
pub(crate) struct SpawnDelegation {
    pub transaction: TransactionId,
    pub delivered_to: Option<ThreadId>,
    pub request: Vec<u8>,
}

/// A caller parked on a spawn transaction
pub(crate) struct PendingSpawn {
    frame: TrapFrame,
    process: ProcessId,
    request_id: EventId,
    request: Vec<u8>,
    delivered_to: Option<ThreadId>,
}

impl<H: HAL> Kernel<H> {
    pub(crate) fn handle_spawn(&mut self, caller: &Caller, data: &mut SpawnData) -> Handled {
        let encoded = SpawnRequest::from_declared(
            data.security_level,
            data.lengths(),
            &data.strings,
            data.stdio(),
        )
        .and_then(|request| request.encode());

        let request = match encoded {
            Ok(request) => request,
            Err(e) => {
                debug!("spawn from thread {}: {}", caller.thread, e);
                data.complete(&SpawnResponse::failed(SpawnStatus::FormatError));
                return Handled::Complete;
            }
        };

        if request.len() > self.config.max_message_size {
            warn!(
                "spawn from thread {}: request of {} bytes exceeds {}",
                caller.thread,
                request.len(),
                self.config.max_message_size
            );
            data.complete(&SpawnResponse::failed(SpawnStatus::IoError));
            return Handled::Complete;
        }

        let transaction = self.ipc.next_transaction();
        let Some(spawner) = self.live_spawner() else {
            warn!(
                "spawn from thread {}: no '{}' registered, parking transaction {}",
                caller.thread, self.config.spawner_identifier, transaction
            );
            return Handled::Suspend(SpawnDelegation {
                transaction,
                delivered_to: None,
                request,
            });
        };

        let message = Message {
            from: caller.thread,
            tag: SPAWN_COMMAND_SPAWN_REQUEST,
            transaction: Some(transaction),
            data: request.clone(),
        };
        if let Err(e) = self.ipc.send(spawner, message) {
            warn!("spawn from thread {}: {}", caller.thread, e);
            data.complete(&SpawnResponse::failed(SpawnStatus::IoError));
            return Handled::Complete;
        }

        debug!(
            "spawn from thread {} sent to spawner {} as transaction {}",
            caller.thread, spawner, transaction
        );
        Handled::Suspend(SpawnDelegation {
            transaction,
            delivered_to: Some(spawner),
            request,
        })
    }

    pub(crate) fn park_spawn(
        &mut self,
        frame: TrapFrame,
        caller: &Caller,
        request_id: EventId,
        delegation: SpawnDelegation,
    ) {
        self.pending_spawns.insert(
            delegation.transaction,
            PendingSpawn {
                frame,
                process: caller.process,
                request_id,
                request: delegation.request,
                delivered_to: delegation.delivered_to,
            },
        );
    }

    /// Answer a spawn transaction on behalf of the spawner thread `from`.
    ///
    /// Returns the caller's frame with the spawn outputs written; the caller
    /// is runnable again. A reply from any thread other than the one the
    /// request was delivered to is rejected and the caller stays parked.
    pub fn reply(
        &mut self,
        from: ThreadId,
        transaction: TransactionId,
        tag: u32,
        data: &[u8],
    ) -> Result<TrapFrame, KernelError> {
        let expected = self
            .pending_spawns
            .get(&transaction)
            .ok_or(KernelError::UnknownTransaction(transaction))?
            .delivered_to;
        if expected != Some(from) {
            return Err(KernelError::UnexpectedReplier {
                transaction,
                expected,
                got: from,
            });
        }
        let mut pending = self
            .pending_spawns
            .remove(&transaction)
            .ok_or(KernelError::UnknownTransaction(transaction))?;

        let caller = pending.frame.thread;
        let mut response = decode_response(tag, data);
        if response.status.is_successful() {
            if let Err(e) = self
                .hal
                .tasks()
                .adopt_descriptors(pending.process, &response.descriptors())
            {
                warn!(
                    "spawn for thread {}: descriptors of process {} not adopted by process {}: {}",
                    caller, response.spawned_process_id, pending.process, e
                );
                response = SpawnResponse::failed(SpawnStatus::Unknown);
            }
        }

        if let Some(spawn) = pending.frame.data.as_spawn_mut() {
            spawn.complete(&response);
        }
        self.syslog.log_response(
            caller,
            pending.request_id,
            SyscallOutcome::SpawnCompleted {
                status: response.status as u32,
            },
            self.hal.now_nanos(),
        );
        debug!(
            "spawn for thread {} completed: {:?} pid {}",
            caller, response.status, response.spawned_process_id
        );
        Ok(pending.frame)
    }

    /// Phase of the spawn `thread` is parked on, if any
    pub fn spawn_phase(&self, thread: ThreadId) -> Option<SpawnPhase> {
        self.pending_spawns
            .iter()
            .find(|(_, pending)| pending.frame.thread == thread)
            .map(|(&transaction, pending)| match pending.delivered_to {
                Some(spawner) => SpawnPhase::AwaitingReply {
                    transaction,
                    spawner,
                },
                None => SpawnPhase::AwaitingSpawner { transaction },
            })
    }

    /// Hand requests parked without a spawner to `spawner`, oldest first.
    ///
    /// Stops at the first full mailbox; the rest go out as the spawner
    /// drains it.
    pub(crate) fn deliver_waiting_spawns(&mut self, spawner: ThreadId) {
        for (&transaction, pending) in self
            .pending_spawns
            .iter_mut()
            .filter(|(_, pending)| pending.delivered_to.is_none())
        {
            let message = Message {
                from: pending.frame.thread,
                tag: SPAWN_COMMAND_SPAWN_REQUEST,
                transaction: Some(transaction),
                data: pending.request.clone(),
            };
            match self.ipc.send(spawner, message) {
                Ok(()) => pending.delivered_to = Some(spawner),
                Err(e @ IpcError::MailboxFull { .. }) => {
                    debug!("transaction {} waits for mailbox space: {}", transaction, e);
                    break;
                }
                Err(e) => warn!("transaction {} not delivered: {}", transaction, e),
            }
        }
    }

    /// Drop spawns parked by `thread` and detach those delivered to it.
    pub(crate) fn release_spawns_of(&mut self, thread: ThreadId) {
        let abandoned: Vec<TransactionId> = self
            .pending_spawns
            .iter()
            .filter(|(_, pending)| pending.frame.thread == thread)
            .map(|(&transaction, _)| transaction)
            .collect();
        for transaction in abandoned {
            if let Some(pending) = self.pending_spawns.remove(&transaction) {
                self.syslog.log_response(
                    thread,
                    pending.request_id,
                    SyscallOutcome::Abandoned,
                    self.hal.now_nanos(),
                );
            }
        }

        for pending in self.pending_spawns.values_mut() {
            if pending.delivered_to == Some(thread) {
                pending.delivered_to = None;
            }
        }
    }

    fn live_spawner(&self) -> Option<ThreadId> {
        self.ipc
            .resolve(&self.config.spawner_identifier)
            .filter(|&spawner| self.hal.tasks().thread_exists(spawner))
    }
}

/// Decode a spawner reply, folding anything inconsistent into `UNKNOWN`.
fn decode_response(tag: u32, data: &[u8]) -> SpawnResponse {
    if tag != SPAWN_COMMAND_SPAWN_RESPONSE {
        warn!("spawn reply with tag {}", tag);
        return SpawnResponse::failed(SpawnStatus::Unknown);
    }

    match SpawnResponse::decode(data) {
        Ok(response) if !response.status.is_successful() => response,
        Ok(response)
            if response.spawned_process_id == ProcessId::NONE
                || !response.descriptors().iter().all(|fd| Fd::is_valid(*fd)) =>
        {
            warn!("spawn reply claims success without a process or descriptors");
            SpawnResponse::failed(SpawnStatus::Unknown)
        }
        Ok(response) => response,
        Err(e) => {
            warn!("spawn reply: {}", e);
            SpawnResponse::failed(SpawnStatus::Unknown)
        }
    }
}
