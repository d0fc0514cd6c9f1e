//! Thread and process table
//!
//! [`TaskRegistry`] is the in-kernel task manager the syscall boundary reads
//! through the [`TaskManager`] contract. Threads are kept in creation order;
//! that order is what kernquery positions index.
//!
//! A process is identified by its main thread: creating a process creates
//! that thread, and removing it removes the whole process.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use spin::RwLock;

use tern_hal::{HalError, TaskManager, ThreadView};
use tern_ipc::{Fd, ProcessId, SecurityLevel, ThreadId, ThreadType};

struct ThreadRecord {
    id: ThreadId,
    process: ProcessId,
    thread_type: ThreadType,
    identifier: Option<String>,
    memory_used: usize,
}

struct ProcessRecord {
    security_level: SecurityLevel,
    source_path: Option<String>,
    descriptors: BTreeSet<Fd>,
}

struct Tables {
    threads: Vec<ThreadRecord>,
    processes: BTreeMap<ProcessId, ProcessRecord>,
    next_id: u32,
}

impl Tables {
    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut ThreadRecord, HalError> {
        self.threads
            .iter_mut()
            .find(|thread| thread.id == id)
            .ok_or(HalError::ThreadNotFound)
    }

    fn process_mut(&mut self, id: ProcessId) -> Result<&mut ProcessRecord, HalError> {
        self.processes
            .get_mut(&id)
            .ok_or(HalError::ProcessNotFound)
    }

    fn allocate_id(&mut self) -> ThreadId {
        let id = ThreadId(self.next_id);
        self.next_id += 1;
        id
    }

    fn view<'a>(&'a self, thread: &'a ThreadRecord) -> ThreadView<'a> {
        let process = self.processes.get(&thread.process);
        let process_identifier = self
            .threads
            .iter()
            .find(|t| t.id == thread.process.main_thread())
            .and_then(|main| main.identifier.as_deref());

        ThreadView {
            id: thread.id,
            process: thread.process,
            thread_type: thread.thread_type,
            security_level: process
                .map(|p| p.security_level)
                .unwrap_or(SecurityLevel::Application),
            memory_used: thread.memory_used,
            identifier: thread.identifier.as_deref(),
            process_identifier,
            source_path: process.and_then(|p| p.source_path.as_deref()),
        }
    }
}

/// Live threads and their processes, behind a read/write lock.
pub struct TaskRegistry {
    tables: RwLock<Tables>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                threads: Vec::new(),
                processes: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Create a process and its main thread.
    pub fn create_process(
        &self,
        security_level: SecurityLevel,
        source_path: Option<&str>,
    ) -> ProcessId {
        let mut tables = self.tables.write();
        let main = tables.allocate_id();
        let pid = ProcessId::from(main);

        tables.threads.push(ThreadRecord {
            id: main,
            process: pid,
            thread_type: ThreadType::Main,
            identifier: None,
            memory_used: 0,
        });
        tables.processes.insert(
            pid,
            ProcessRecord {
                security_level,
                source_path: source_path.map(str::to_string),
                descriptors: BTreeSet::new(),
            },
        );
        pid
    }

    /// Add a thread to an existing process.
    pub fn create_thread(
        &self,
        process: ProcessId,
        thread_type: ThreadType,
    ) -> Result<ThreadId, HalError> {
        let mut tables = self.tables.write();
        if !tables.processes.contains_key(&process) {
            return Err(HalError::ProcessNotFound);
        }

        let id = tables.allocate_id();
        tables.threads.push(ThreadRecord {
            id,
            process,
            thread_type,
            identifier: None,
            memory_used: 0,
        });
        Ok(id)
    }

    pub fn set_identifier(&self, thread: ThreadId, identifier: &str) -> Result<(), HalError> {
        self.tables.write().thread_mut(thread)?.identifier = Some(identifier.to_string());
        Ok(())
    }

    pub fn set_memory_used(&self, thread: ThreadId, bytes: usize) -> Result<(), HalError> {
        self.tables.write().thread_mut(thread)?.memory_used = bytes;
        Ok(())
    }

    /// Remove a thread. Removing a main thread removes its whole process.
    ///
    /// Returns `false` if the thread did not exist.
    pub fn remove_thread(&self, thread: ThreadId) -> bool {
        let mut tables = self.tables.write();
        let Some(position) = tables.threads.iter().position(|t| t.id == thread) else {
            return false;
        };

        let removed = tables.threads.remove(position);
        if removed.thread_type == ThreadType::Main {
            tables.threads.retain(|t| t.process != removed.process);
            tables.processes.remove(&removed.process);
        }
        true
    }

    /// Open a fresh descriptor in `process` (lowest free number).
    pub fn open_descriptor(&self, process: ProcessId) -> Result<Fd, HalError> {
        let mut tables = self.tables.write();
        let record = tables.process_mut(process)?;
        let fd = (0..)
            .map(Fd)
            .find(|fd| !record.descriptors.contains(fd))
            .ok_or(HalError::InvalidDescriptor(i32::MAX))?;
        record.descriptors.insert(fd);
        Ok(fd)
    }

    /// Descriptors currently owned by `process`, ascending
    pub fn descriptors(&self, process: ProcessId) -> Vec<Fd> {
        self.tables
            .read()
            .processes
            .get(&process)
            .map(|record| record.descriptors.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager for TaskRegistry {
    fn thread_count(&self) -> usize {
        self.tables.read().threads.len()
    }

    fn with_thread_at<R>(
        &self,
        position: usize,
        f: impl FnOnce(&ThreadView<'_>) -> R,
    ) -> Option<R> {
        let tables = self.tables.read();
        let thread = tables.threads.get(position)?;
        Some(f(&tables.view(thread)))
    }

    fn with_thread<R>(&self, id: ThreadId, f: impl FnOnce(&ThreadView<'_>) -> R) -> Option<R> {
        let tables = self.tables.read();
        let thread = tables.threads.iter().find(|t| t.id == id)?;
        Some(f(&tables.view(thread)))
    }

    fn adopt_descriptors(&self, process: ProcessId, descriptors: &[Fd]) -> Result<(), HalError> {
        let mut tables = self.tables.write();
        let record = tables.process_mut(process)?;

        for (i, fd) in descriptors.iter().enumerate() {
            if !fd.is_valid() {
                return Err(HalError::InvalidDescriptor(fd.0));
            }
            if record.descriptors.contains(fd) || descriptors[..i].contains(fd) {
                return Err(HalError::DescriptorInUse(fd.0));
            }
        }

        record.descriptors.extend(descriptors.iter().copied());
        Ok(())
    }
}
