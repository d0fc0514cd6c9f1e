//! Inter-process messaging
//!
//! This module contains:
//! - Named identities (a well-known name resolves to one thread)
//! - Per-thread mailboxes with bounded depth and payload size
//! - Transaction tokens correlating a request with its reply

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use tern_ipc::ThreadId;

use crate::error::IpcError;

/// Correlation token linking a request message to its reply
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IPC message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Sending thread
    pub from: ThreadId,
    /// Message tag (protocol-defined)
    pub tag: u32,
    /// Set when the sender expects a reply
    pub transaction: Option<TransactionId>,
    /// Message payload
    pub data: Vec<u8>,
}

/// Per-thread message queue
#[derive(Debug, Default)]
pub struct Mailbox {
    /// Queue of pending messages
    pub pending_messages: VecDeque<Message>,
    /// Total messages ever delivered to this mailbox
    pub total_messages: u64,
}

/// Identity registry and mailboxes.
pub struct Ipc {
    identities: BTreeMap<String, ThreadId>,
    mailboxes: BTreeMap<ThreadId, Mailbox>,
    next_transaction: u64,
    mailbox_depth: usize,
    max_message_size: usize,
}

impl Ipc {
    pub fn new(mailbox_depth: usize, max_message_size: usize) -> Self {
        Self {
            identities: BTreeMap::new(),
            mailboxes: BTreeMap::new(),
            next_transaction: 1,
            mailbox_depth,
            max_message_size,
        }
    }

    /// Bind `name` to `thread`.
    ///
    /// Re-registering a name already held by the same thread is a no-op. The
    /// caller decides whether a different holder is still live: pass
    /// `replace_stale = true` to take the name over from a dead holder.
    pub fn register_identity(
        &mut self,
        thread: ThreadId,
        name: &str,
        replace_stale: bool,
    ) -> Result<(), IpcError> {
        if let Some(&holder) = self.identities.get(name) {
            if holder != thread && !replace_stale {
                return Err(IpcError::IdentityTaken {
                    name: name.to_string(),
                    holder,
                });
            }
        }
        self.identities.insert(name.to_string(), thread);
        Ok(())
    }

    /// Thread currently holding `name`
    pub fn resolve(&self, name: &str) -> Option<ThreadId> {
        self.identities.get(name).copied()
    }

    /// Allocate a fresh transaction token
    pub fn next_transaction(&mut self) -> TransactionId {
        let id = TransactionId(self.next_transaction);
        self.next_transaction += 1;
        id
    }

    /// Queue `message` on the mailbox of `to`.
    pub fn send(&mut self, to: ThreadId, message: Message) -> Result<(), IpcError> {
        if message.data.len() > self.max_message_size {
            return Err(IpcError::MessageTooLarge {
                size: message.data.len(),
                max: self.max_message_size,
            });
        }

        let mailbox = self.mailboxes.entry(to).or_default();
        if mailbox.pending_messages.len() >= self.mailbox_depth {
            return Err(IpcError::MailboxFull {
                thread: to,
                depth: self.mailbox_depth,
            });
        }

        mailbox.pending_messages.push_back(message);
        mailbox.total_messages += 1;
        Ok(())
    }

    /// Take the oldest message queued for `thread`
    pub fn receive(&mut self, thread: ThreadId) -> Option<Message> {
        self.mailboxes
            .get_mut(&thread)
            .and_then(|mailbox| mailbox.pending_messages.pop_front())
    }

    /// Number of messages waiting for `thread`
    pub fn pending(&self, thread: ThreadId) -> usize {
        self.mailboxes
            .get(&thread)
            .map(|mailbox| mailbox.pending_messages.len())
            .unwrap_or(0)
    }

    pub fn mailbox(&self, thread: ThreadId) -> Option<&Mailbox> {
        self.mailboxes.get(&thread)
    }

    /// Drop the mailbox and every identity held by `thread`.
    ///
    /// Returns the names it held.
    pub fn remove_thread(&mut self, thread: ThreadId) -> Vec<String> {
        self.mailboxes.remove(&thread);
        let released: Vec<String> = self
            .identities
            .iter()
            .filter(|&(_, &holder)| holder == thread)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &released {
            self.identities.remove(name);
        }
        released
    }
}
