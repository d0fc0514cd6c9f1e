//! Syscall audit trail.
//!
//! Records every dispatched syscall (request + response) for the audit trail.
//! A suspended syscall gets two responses: one when it parks, one when it
//! completes.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use tern_ipc::ThreadId;

/// Monotonic event identifier
pub type EventId = u64;

/// One audited dispatch step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysEvent {
    /// Monotonic id, never reused
    pub id: EventId,
    /// Thread that made the syscall
    pub sender: ThreadId,
    /// `HAL::now_nanos` at the time of the event
    pub timestamp: u64,
    /// Request or response
    pub event_type: SysEventType,
}

/// Type of system event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysEventType {
    /// Syscall request from a thread
    Request {
        /// Syscall number
        syscall_num: u32,
    },
    /// Syscall response to a thread
    Response {
        /// Event id of the matching request
        request_id: EventId,
        outcome: SyscallOutcome,
    },
}

/// How a syscall left its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallOutcome {
    /// Handler ran to completion; caller resumed immediately
    Completed,
    /// Caller parked on a transaction
    Suspended { transaction: u64 },
    /// Parked spawn resolved with this status
    SpawnCompleted { status: u32 },
    /// Caller exited while parked
    Abandoned,
}

/// Bounded log of dispatched syscalls.
///
/// Events are append-only with monotonic IDs. Once `capacity` is exceeded
/// the oldest events are dropped.
pub struct SysLog {
    /// Oldest first
    events: Vec<SysEvent>,
    next_id: EventId,
    capacity: usize,
}

impl SysLog {
    /// Empty log keeping at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Record a trap; the returned id tags every response to it.
    pub fn log_request(&mut self, sender: ThreadId, syscall_num: u32, timestamp: u64) -> EventId {
        self.push(sender, timestamp, SysEventType::Request { syscall_num })
    }

    /// Record how a trap left its caller.
    pub fn log_response(
        &mut self,
        sender: ThreadId,
        request_id: EventId,
        outcome: SyscallOutcome,
        timestamp: u64,
    ) {
        self.push(
            sender,
            timestamp,
            SysEventType::Response {
                request_id,
                outcome,
            },
        );
    }

    fn push(&mut self, sender: ThreadId, timestamp: u64, event_type: SysEventType) -> EventId {
        let id = self.next_id;
        self.next_id += 1;

        self.events.push(SysEvent {
            id,
            sender,
            timestamp,
            event_type,
        });

        self.trim();
        id
    }

    /// Get all events.
    pub fn events(&self) -> &[SysEvent] {
        &self.events
    }

    /// Get the most recent N events, newest first.
    pub fn get_recent(&self, count: usize) -> Vec<&SysEvent> {
        self.events.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    fn trim(&mut self) {
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
        }
    }
}
