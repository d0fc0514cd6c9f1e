//! Kernel configuration.

use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};

use tern_ipc::SPAWNER_IDENTIFIER;

/// Maximum message payload size in bytes
pub const MAX_MESSAGE_SIZE: usize = 16384;

/// Tunables for one kernel instance.
///
/// Platforms usually take [`KernelConfig::default`] and override a field or
/// two; the struct also deserializes from a boot configuration blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Identity the spawner process registers under
    pub spawner_identifier: String,
    /// Longest message text, in bytes, carried into one log line
    pub max_log_message: usize,
    /// Messages a mailbox holds before sends fail
    pub mailbox_depth: usize,
    /// Largest message payload accepted by IPC
    pub max_message_size: usize,
    /// Audit events kept before the oldest are trimmed
    pub syslog_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            spawner_identifier: SPAWNER_IDENTIFIER.to_string(),
            max_log_message: 1024,
            mailbox_depth: 64,
            max_message_size: MAX_MESSAGE_SIZE,
            syslog_capacity: 1024,
        }
    }
}
