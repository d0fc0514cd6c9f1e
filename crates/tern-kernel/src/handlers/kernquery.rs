//! Kernquery dispatcher.
//!
//! Reads kernel state into the caller's fixed-capacity output region. Nothing
//! here allocates, and every path sets an explicit status. Positional lookups
//! run under the table's lock, so a position that was valid at the last
//! `*_COUNT` but is past the end now reads as "not found".

use log::debug;
use tern_hal::{PciBus, TaskManager, HAL};
use tern_ipc::kernquery::{
    decode_position, encode_count, encode_pci_get, encode_task_not_found, TaskRecord,
};
use tern_ipc::{KernqueryCommand, KernqueryStatus, ProtocolError};

use super::Caller;
use crate::syscall::KernqueryData;
use crate::Kernel;

impl<H: HAL> Kernel<H> {
    pub(crate) fn handle_kernquery(&self, caller: &Caller, data: &mut KernqueryData) {
        data.status = match KernqueryCommand::from_u16(data.command) {
            None => KernqueryStatus::UnknownId,
            Some(command) => match self.kernquery(command, &data.query, &mut data.outbuffer) {
                Ok(()) => KernqueryStatus::Successful,
                Err(e) => {
                    debug!(
                        "kernquery {:?} from thread {}: {}",
                        command, caller.thread, e
                    );
                    KernqueryStatus::MalformedBuffer
                }
            },
        };
    }

    fn kernquery(
        &self,
        command: KernqueryCommand,
        query: &[u8],
        out: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let pci = self.hal.pci();
        let tasks = self.hal.tasks();

        match command {
            KernqueryCommand::PciCount => encode_count(out, pci.device_count()),
            KernqueryCommand::PciGet => {
                let position = decode_position(query)? as usize;
                encode_pci_get(out, pci.device_at(position).as_ref())
            }
            KernqueryCommand::TaskCount => encode_count(out, tasks.thread_count()),
            KernqueryCommand::TaskGetByPos => {
                let position = decode_position(query)? as usize;
                let found = tasks.with_thread_at(position, |view| {
                    TaskRecord {
                        id: view.id,
                        parent: view.process,
                        task_type: view.thread_type,
                        memory_used: view.memory_used,
                        identifier: view.identifier,
                        source_path: view.source_path,
                    }
                    .encode_into(out)
                });
                match found {
                    Some(written) => written,
                    None => encode_task_not_found(out),
                }
            }
        }
    }
}
