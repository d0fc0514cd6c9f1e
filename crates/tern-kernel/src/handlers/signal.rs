//! IRQ and signal registration syscalls.
//!
//! All three are synchronous and leave no state behind when they fail.

use log::{debug, info};
use tern_hal::{TaskManager, HAL};
use tern_ipc::signal;
use tern_ipc::{RaiseSignalStatus, RegisterIrqHandlerStatus, RegisterSignalHandlerStatus};

use super::Caller;
use crate::syscall::{RaiseSignalData, RegisterIrqHandlerData, RegisterSignalHandlerData};
use crate::{IrqHandler, Kernel};

impl<H: HAL> Kernel<H> {
    pub(crate) fn handle_register_irq_handler(
        &mut self,
        caller: &Caller,
        data: &mut RegisterIrqHandlerData,
    ) {
        if !caller.security_level.is_driver_or_above() {
            debug!(
                "thread {} ({:?}) may not claim irq {}",
                caller.thread, caller.security_level, data.irq
            );
            data.status = RegisterIrqHandlerStatus::NotPermitted;
            return;
        }

        let handler = IrqHandler {
            process: caller.process,
            handler: data.handler,
        };
        if let Some(previous) = self.irq_handlers.insert(data.irq, handler) {
            if previous.process != caller.process {
                info!(
                    "irq {} moved from process {} to {}",
                    data.irq, previous.process, caller.process
                );
            }
        }
        data.status = RegisterIrqHandlerStatus::Successful;
    }

    pub(crate) fn handle_register_signal_handler(
        &mut self,
        caller: &Caller,
        data: &mut RegisterSignalHandlerData,
    ) {
        data.previous = 0;
        if !signal::is_valid(data.signal) {
            data.status = RegisterSignalHandlerStatus::InvalidSignal;
            return;
        }

        let key = (caller.process, data.signal);
        let previous = if data.handler == 0 {
            self.signal_handlers.remove(&key)
        } else {
            self.signal_handlers.insert(key, data.handler)
        };
        data.previous = previous.unwrap_or(0);
        data.status = RegisterSignalHandlerStatus::Successful;
    }

    pub(crate) fn handle_raise_signal(&mut self, caller: &Caller, data: &mut RaiseSignalData) {
        if !signal::is_valid(data.signal) {
            data.status = RaiseSignalStatus::InvalidSignal;
            return;
        }
        if !self.hal.tasks().thread_exists(data.target) {
            data.status = RaiseSignalStatus::InvalidTarget;
            return;
        }

        *self.pending_signals.entry(data.target).or_insert(0) |= 1 << data.signal;
        debug!(
            "thread {} raised signal {} on thread {}",
            caller.thread, data.signal, data.target
        );
        data.status = RaiseSignalStatus::Successful;
    }
}
