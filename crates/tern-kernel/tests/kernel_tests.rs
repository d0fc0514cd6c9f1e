//! Kernel integration tests
//!
//! Drive the syscall boundary end to end through a mock HAL that owns real
//! task and PCI tables.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tern_hal::{TaskManager, HAL};
use tern_ipc::kernquery::{decode_count, decode_pci_get, encode_position, TASK_GET_OUT_SIZE};
use tern_ipc::{
    Fd, KernqueryStatus, PciDevice, ProcessId, RaiseSignalStatus, RegisterIrqHandlerStatus,
    RegisterSignalHandlerStatus, SecurityLevel, SpawnRequest, SpawnResponse, SpawnStatus,
    TaskSnapshot, ThreadId, ThreadType, SPAWN_COMMAND_SPAWN_REQUEST, SPAWN_COMMAND_SPAWN_RESPONSE,
};
use tern_kernel::syscall::{SYS_LOG, SYS_SPAWN};
use tern_kernel::{
    IpcError, IrqHandler, Kernel, KernelConfig, KernelError, KernqueryData, LogData, PciTable,
    RaiseSignalData, RegisterIrqHandlerData, RegisterSignalHandlerData, Resumption,
    SetVideoLogData, SpawnData, SpawnPhase, SysEventType, SyscallData, SyscallOutcome,
    TaskRegistry, TestData, TransactionId, TrapFrame,
};

// ============================================================================
// Mock HAL for Testing
// ============================================================================

pub struct MockHal {
    pub tasks: Arc<TaskRegistry>,
    pub pci: Arc<PciTable>,
    log_lines: spin::Mutex<Vec<String>>,
    video_log: AtomicBool,
    free_pages: AtomicUsize,
    time: AtomicU64,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(TaskRegistry::new()),
            pci: Arc::new(PciTable::new()),
            log_lines: spin::Mutex::new(Vec::new()),
            video_log: AtomicBool::new(false),
            free_pages: AtomicUsize::new(0),
            time: AtomicU64::new(0),
        }
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log_lines.lock().clone()
    }
}

impl HAL for MockHal {
    type Pci = PciTable;
    type Tasks = TaskRegistry;

    fn pci(&self) -> &PciTable {
        &self.pci
    }

    fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    fn log_write(&self, line: &str) {
        self.log_lines.lock().push(line.to_string());
    }

    fn set_video_log(&self, enabled: bool) {
        self.video_log.store(enabled, Ordering::SeqCst);
    }

    fn free_page_count(&self) -> usize {
        self.free_pages.load(Ordering::SeqCst)
    }

    fn now_nanos(&self) -> u64 {
        self.time.fetch_add(1_000, Ordering::SeqCst)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn kernel() -> Kernel<MockHal> {
    Kernel::new(MockHal::new())
}

fn process(kernel: &Kernel<MockHal>, level: SecurityLevel) -> ThreadId {
    kernel
        .hal()
        .tasks
        .create_process(level, None)
        .main_thread()
}

/// A registered spawner thread
fn spawner(kernel: &mut Kernel<MockHal>) -> ThreadId {
    let thread = process(kernel, SecurityLevel::Kernel);
    kernel.register_identity(thread, "spawner").unwrap();
    thread
}

fn syscall(kernel: &mut Kernel<MockHal>, thread: ThreadId, data: SyscallData) -> TrapFrame {
    match kernel.handle_syscall(TrapFrame::new(thread, data)).unwrap() {
        Resumption::Resume(frame) => frame,
        other => panic!("caller did not resume: {:?}", other),
    }
}

fn kernquery(
    kernel: &mut Kernel<MockHal>,
    thread: ThreadId,
    command: u16,
    query: &[u8],
    capacity: usize,
) -> KernqueryData {
    let data = SyscallData::Kernquery(KernqueryData::new(command, query, capacity));
    match syscall(kernel, thread, data).data {
        SyscallData::Kernquery(data) => data,
        other => panic!("unexpected data {:?}", other),
    }
}

fn spawn_data(frame: &TrapFrame) -> &SpawnData {
    frame.data.as_spawn().expect("spawn data")
}

fn shell_request(stdio: [Fd; 3]) -> SyscallData {
    SyscallData::Spawn(SpawnData::new(
        SecurityLevel::Application,
        "/bin/sh",
        "-c echo hi",
        "/",
        stdio,
    ))
}

fn start_spawn(kernel: &mut Kernel<MockHal>, caller: ThreadId) -> TransactionId {
    match kernel
        .handle_syscall(TrapFrame::new(caller, shell_request([Fd::NONE; 3])))
        .unwrap()
    {
        Resumption::Suspended {
            thread,
            transaction,
        } => {
            assert_eq!(thread, caller);
            transaction
        }
        other => panic!("spawn did not suspend: {:?}", other),
    }
}

fn pci_device(slot: u8) -> PciDevice {
    PciDevice {
        bus: 0,
        slot,
        function: 0,
        vendor_id: 0x8086,
        device_id: 0x1000 + slot as u16,
        class_code: 0x02,
        subclass_code: 0x00,
        prog_if: 0x00,
    }
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_unknown_thread_is_rejected() {
    let mut kernel = kernel();
    let result = kernel.handle_syscall(TrapFrame::new(
        ThreadId(99),
        SyscallData::Test(TestData::default()),
    ));
    assert_eq!(result, Err(KernelError::UnknownThread(ThreadId(99))));
    assert!(kernel.syslog().is_empty());
}

#[test]
fn test_trap_decode_guards_dispatch() {
    let data = SyscallData::Log(LogData {
        message: b"x".to_vec(),
    });
    assert_eq!(
        TrapFrame::decode(ThreadId(1), 0x99, data.clone()),
        Err(KernelError::UnknownSyscall(0x99))
    );
    assert!(TrapFrame::decode(ThreadId(1), SYS_SPAWN, data.clone()).is_err());
    assert!(TrapFrame::decode(ThreadId(1), SYS_LOG, data).is_ok());
}

#[test]
fn test_syscalls_are_audited() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);

    syscall(
        &mut kernel,
        caller,
        SyscallData::SetVideoLog(SetVideoLogData { enabled: true }),
    );

    let events = kernel.syslog().events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sender, caller);
    assert_eq!(
        events[0].event_type,
        SysEventType::Request { syscall_num: 0x02 }
    );
    assert_eq!(
        events[1].event_type,
        SysEventType::Response {
            request_id: events[0].id,
            outcome: SyscallOutcome::Completed
        }
    );

    let json = serde_json::to_string(events).unwrap();
    assert!(json.contains("Request"));
    assert!(json.contains("Completed"));
}

// ============================================================================
// Misc syscalls
// ============================================================================

#[test]
fn test_log_sanitizes_and_formats() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    kernel.hal().tasks.set_identifier(caller, "shell").unwrap();

    let frame = syscall(
        &mut kernel,
        caller,
        SyscallData::Log(LogData {
            message: b"100% done %s".to_vec(),
        }),
    );

    match frame.data {
        SyscallData::Log(data) => assert_eq!(data.message, b"100! done !s"),
        other => panic!("unexpected data {:?}", other),
    }
    let expected = format!("-shell ({}:{}) 100! done !s", caller.0, caller.0);
    assert_eq!(kernel.hal().log_lines(), vec![expected]);
}

#[test]
fn test_log_prefix_falls_back_to_process_identifier() {
    let mut kernel = kernel();
    let main = process(&kernel, SecurityLevel::Application);
    let pid = ProcessId::from(main);
    let sub = kernel.hal().tasks.create_thread(pid, ThreadType::Sub).unwrap();
    kernel.hal().tasks.set_identifier(main, "init").unwrap();

    syscall(
        &mut kernel,
        sub,
        SyscallData::Log(LogData {
            message: b"hi\0garbage".to_vec(),
        }),
    );

    let anonymous = process(&kernel, SecurityLevel::Application);
    syscall(
        &mut kernel,
        anonymous,
        SyscallData::Log(LogData {
            message: b"hi".to_vec(),
        }),
    );

    assert_eq!(
        kernel.hal().log_lines(),
        vec![
            format!("-init ({}:{}) hi", pid.0, sub.0),
            format!("- ({}:{}) hi", anonymous.0, anonymous.0),
        ]
    );
}

#[test]
fn test_log_line_truncated_to_configured_length() {
    let config = KernelConfig {
        max_log_message: 4,
        ..KernelConfig::default()
    };
    let mut kernel = Kernel::with_config(MockHal::new(), config);
    let caller = process(&kernel, SecurityLevel::Application);

    let frame = syscall(
        &mut kernel,
        caller,
        SyscallData::Log(LogData {
            message: b"abcdefg%".to_vec(),
        }),
    );

    match frame.data {
        SyscallData::Log(data) => assert_eq!(data.message, b"abcdefg!"),
        other => panic!("unexpected data {:?}", other),
    }
    let lines = kernel.hal().log_lines();
    assert!(lines[0].ends_with(") abcd"), "{}", lines[0]);
}

#[test]
fn test_set_video_log_toggles_display() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);

    syscall(
        &mut kernel,
        caller,
        SyscallData::SetVideoLog(SetVideoLogData { enabled: true }),
    );
    assert!(kernel.hal().video_log.load(Ordering::SeqCst));

    syscall(
        &mut kernel,
        caller,
        SyscallData::SetVideoLog(SetVideoLogData { enabled: false }),
    );
    assert!(!kernel.hal().video_log.load(Ordering::SeqCst));
}

#[test]
fn test_test_reports_free_pages() {
    let mut kernel = kernel();
    kernel.hal().free_pages.store(321, Ordering::SeqCst);
    let caller = process(&kernel, SecurityLevel::Application);

    let frame = syscall(
        &mut kernel,
        caller,
        SyscallData::Test(TestData { test: 1, result: 0 }),
    );
    assert_eq!(frame.data, SyscallData::Test(TestData { test: 1, result: 321 }));

    let frame = syscall(
        &mut kernel,
        caller,
        SyscallData::Test(TestData { test: 2, result: 7 }),
    );
    assert_eq!(frame.data, SyscallData::Test(TestData { test: 2, result: 0 }));
}

// ============================================================================
// Kernquery
// ============================================================================

#[test]
fn test_kernquery_pci_enumeration() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    kernel.hal().pci.add(pci_device(1));
    kernel.hal().pci.add(pci_device(2));

    let count = kernquery(&mut kernel, caller, 0x500, &[], 4);
    assert_eq!(count.status, KernqueryStatus::Successful);
    let count = decode_count(&count.outbuffer).unwrap();
    assert_eq!(count, 2);

    for position in 0..count {
        let got = kernquery(&mut kernel, caller, 0x501, &encode_position(position), 11);
        assert_eq!(got.status, KernqueryStatus::Successful);
        assert_eq!(
            decode_pci_get(&got.outbuffer).unwrap(),
            Some(pci_device(position as u8 + 1))
        );
    }

    let past_end = kernquery(&mut kernel, caller, 0x501, &encode_position(count), 11);
    assert_eq!(past_end.status, KernqueryStatus::Successful);
    assert_eq!(decode_pci_get(&past_end.outbuffer).unwrap(), None);
}

#[test]
fn test_kernquery_unknown_command_leaves_buffer() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);

    let mut data = KernqueryData::new(0xFFFF, &[], 32);
    data.outbuffer.fill(0xAB);
    let frame = syscall(&mut kernel, caller, SyscallData::Kernquery(data));

    match frame.data {
        SyscallData::Kernquery(data) => {
            assert_eq!(data.status, KernqueryStatus::UnknownId);
            assert!(data.outbuffer.iter().all(|&b| b == 0xAB));
        }
        other => panic!("unexpected data {:?}", other),
    }
}

#[test]
fn test_kernquery_malformed_buffers() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    kernel.hal().pci.add(pci_device(1));

    let small = kernquery(&mut kernel, caller, 0x601, &encode_position(0), 16);
    assert_eq!(small.status, KernqueryStatus::MalformedBuffer);
    assert!(small.outbuffer.iter().all(|&b| b == 0));

    let short_query = kernquery(&mut kernel, caller, 0x501, &[0, 0], 11);
    assert_eq!(short_query.status, KernqueryStatus::MalformedBuffer);

    let small_count = kernquery(&mut kernel, caller, 0x600, &[], 3);
    assert_eq!(small_count.status, KernqueryStatus::MalformedBuffer);
}

#[test]
fn test_kernquery_task_snapshots() {
    let mut kernel = kernel();
    let pid = kernel
        .hal()
        .tasks
        .create_process(SecurityLevel::Application, Some("/apps/terminal.bin"));
    let main = pid.main_thread();
    kernel.hal().tasks.set_identifier(main, "terminal").unwrap();
    kernel.hal().tasks.set_memory_used(main, 65536).unwrap();
    let sub = kernel.hal().tasks.create_thread(pid, ThreadType::Sub).unwrap();

    let count = kernquery(&mut kernel, main, 0x600, &[], 4);
    assert_eq!(decode_count(&count.outbuffer).unwrap(), 2);

    let first = kernquery(&mut kernel, main, 0x601, &encode_position(0), TASK_GET_OUT_SIZE);
    assert_eq!(first.status, KernqueryStatus::Successful);
    let first = TaskSnapshot::decode(&first.outbuffer).unwrap().unwrap();
    assert_eq!(first.id, main);
    assert_eq!(first.parent, pid);
    assert_eq!(first.task_type, ThreadType::Main);
    assert_eq!(first.memory_used, 65536);
    assert_eq!(first.identifier, "terminal");
    assert_eq!(first.source_path, "/apps/terminal.bin");

    let second = kernquery(&mut kernel, main, 0x601, &encode_position(1), TASK_GET_OUT_SIZE);
    let second = TaskSnapshot::decode(&second.outbuffer).unwrap().unwrap();
    assert_eq!(second.id, sub);
    assert_eq!(second.task_type, ThreadType::Sub);
    assert_eq!(second.identifier, "");

    let missing = kernquery(&mut kernel, main, 0x601, &encode_position(2), TASK_GET_OUT_SIZE);
    assert_eq!(missing.status, KernqueryStatus::Successful);
    assert_eq!(TaskSnapshot::decode(&missing.outbuffer).unwrap(), None);
}

#[test]
fn test_kernquery_positions_under_concurrent_shrink() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    for slot in 0..64 {
        kernel.hal().pci.add(pci_device(slot));
    }
    let owner = kernel
        .hal()
        .tasks
        .create_process(SecurityLevel::Application, None);
    for _ in 0..64 {
        kernel
            .hal()
            .tasks
            .create_thread(owner, ThreadType::Sub)
            .unwrap();
    }

    let pci = Arc::clone(&kernel.hal().pci);
    let tasks = Arc::clone(&kernel.hal().tasks);
    let shrinker = thread::spawn(move || {
        while pci.remove(0).is_some() {}
        while tasks.thread_count() > 2 {
            let last = tasks.with_thread_at(tasks.thread_count() - 1, |v| v.id);
            if let Some(id) = last {
                tasks.remove_thread(id);
            }
        }
    });

    for _ in 0..200 {
        let count = kernquery(&mut kernel, caller, 0x500, &[], 4);
        let count = decode_count(&count.outbuffer).unwrap();
        if count > 0 {
            let got = kernquery(&mut kernel, caller, 0x501, &encode_position(count - 1), 11);
            assert_eq!(got.status, KernqueryStatus::Successful);
            decode_pci_get(&got.outbuffer).unwrap();
        }

        let count = kernquery(&mut kernel, caller, 0x600, &[], 4);
        let count = decode_count(&count.outbuffer).unwrap();
        let got = kernquery(
            &mut kernel,
            caller,
            0x601,
            &encode_position(count.saturating_sub(1)),
            TASK_GET_OUT_SIZE,
        );
        assert_eq!(got.status, KernqueryStatus::Successful);
        TaskSnapshot::decode(&got.outbuffer).unwrap();
    }

    shrinker.join().unwrap();
    let count = kernquery(&mut kernel, caller, 0x500, &[], 4);
    assert_eq!(decode_count(&count.outbuffer).unwrap(), 0);
}

// ============================================================================
// Spawn
// ============================================================================

#[test]
fn test_spawn_shell_end_to_end() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);
    let caller_pid = ProcessId::from(caller);
    let pipes = [(); 3].map(|_| kernel.hal().tasks.open_descriptor(caller_pid).unwrap());

    let transaction = match kernel
        .handle_syscall(TrapFrame::new(caller, shell_request(pipes)))
        .unwrap()
    {
        Resumption::Suspended { transaction, .. } => transaction,
        other => panic!("spawn did not suspend: {:?}", other),
    };
    assert_eq!(
        kernel.spawn_phase(caller),
        Some(SpawnPhase::AwaitingReply {
            transaction,
            spawner
        })
    );

    // Spawner side: decode the request and create the process
    let message = kernel.receive_message(spawner).expect("request delivered");
    assert_eq!(message.from, caller);
    assert_eq!(message.tag, SPAWN_COMMAND_SPAWN_REQUEST);
    assert_eq!(message.transaction, Some(transaction));

    let request = SpawnRequest::decode(&message.data).unwrap();
    assert_eq!(request.security_level, SecurityLevel::Application);
    assert_eq!(request.path, b"/bin/sh");
    assert_eq!(request.args, b"-c echo hi");
    assert_eq!(request.workdir, b"/");
    assert_eq!([request.stdin, request.stdout, request.stderr], pipes);

    let child = kernel
        .hal()
        .tasks
        .create_process(request.security_level, request.path_str());
    let response = SpawnResponse {
        status: SpawnStatus::Successful,
        spawned_process_id: child,
        stdin_write: Fd(3),
        stdout_read: Fd(4),
        stderr_read: Fd(5),
    };

    let frame = kernel
        .reply(
            spawner,
            transaction,
            SPAWN_COMMAND_SPAWN_RESPONSE,
            &response.encode(),
        )
        .unwrap();
    assert_eq!(frame.thread, caller);

    let out = spawn_data(&frame);
    assert_eq!(out.status, SpawnStatus::Successful);
    assert_ne!(out.spawned_process_id, ProcessId::NONE);
    assert_eq!(out.spawned_process_id, child);
    let fds = [out.stdin_write, out.stdout_read, out.stderr_read];
    assert_eq!(fds, [Fd(3), Fd(4), Fd(5)]);
    assert!(fds.iter().all(|fd| !pipes.contains(fd)));
    assert_eq!(
        kernel.hal().tasks.descriptors(caller_pid),
        [pipes[0], pipes[1], pipes[2], Fd(3), Fd(4), Fd(5)]
    );

    assert_eq!(kernel.spawn_phase(caller), None);
    let last = kernel.syslog().get_recent(1)[0];
    assert_eq!(
        last.event_type,
        SysEventType::Response {
            request_id: kernel.syslog().events()[0].id,
            outcome: SyscallOutcome::SpawnCompleted { status: 0 }
        }
    );
}

#[test]
fn test_spawn_suspension_is_audited() {
    let mut kernel = kernel();
    spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);

    let transaction = start_spawn(&mut kernel, caller);
    let events = kernel.syslog().events();
    assert_eq!(
        events[1].event_type,
        SysEventType::Response {
            request_id: events[0].id,
            outcome: SyscallOutcome::Suspended {
                transaction: transaction.0
            }
        }
    );
}

#[test]
fn test_spawn_inconsistent_lengths_send_nothing() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);

    let mut data = SpawnData::new(SecurityLevel::Application, "/bin/sh", "", "/", [Fd::NONE; 3]);
    data.path_bytes += 100;
    let frame = syscall(&mut kernel, caller, SyscallData::Spawn(data));

    let out = spawn_data(&frame);
    assert_eq!(out.status, SpawnStatus::FormatError);
    assert_eq!(out.spawned_process_id, ProcessId::NONE);
    assert_eq!(kernel.pending_messages(spawner), 0);
    assert_eq!(kernel.spawn_phase(caller), None);
}

#[test]
fn test_spawn_bad_security_level_is_format_error() {
    let mut kernel = kernel();
    spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);

    let mut data = SpawnData::new(SecurityLevel::Application, "/bin/sh", "", "/", [Fd::NONE; 3]);
    data.security_level = 9;
    let frame = syscall(&mut kernel, caller, SyscallData::Spawn(data));
    assert_eq!(spawn_data(&frame).status, SpawnStatus::FormatError);
}

#[test]
fn test_spawn_failure_claims_nothing() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);

    let transaction = start_spawn(&mut kernel, caller);
    kernel.receive_message(spawner).unwrap();

    let response = SpawnResponse {
        status: SpawnStatus::IoError,
        spawned_process_id: ProcessId(40),
        stdin_write: Fd(3),
        stdout_read: Fd(4),
        stderr_read: Fd(5),
    };
    let frame = kernel
        .reply(spawner, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &response.encode())
        .unwrap();

    let out = spawn_data(&frame);
    assert_eq!(out.status, SpawnStatus::IoError);
    assert_eq!(out.spawned_process_id, ProcessId::NONE);
    assert_eq!(out.stdin_write, Fd::NONE);
    assert!(kernel
        .hal()
        .tasks
        .descriptors(ProcessId::from(caller))
        .is_empty());
}

#[test]
fn test_spawn_malformed_replies_resolve_unknown() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);

    let good = SpawnResponse {
        status: SpawnStatus::Successful,
        spawned_process_id: ProcessId(40),
        stdin_write: Fd(3),
        stdout_read: Fd(4),
        stderr_read: Fd(5),
    };
    let mut no_pid = good;
    no_pid.spawned_process_id = ProcessId::NONE;

    let replies: [(u32, Vec<u8>); 3] = [
        (SPAWN_COMMAND_SPAWN_REQUEST, good.encode().to_vec()),
        (SPAWN_COMMAND_SPAWN_RESPONSE, good.encode()[..10].to_vec()),
        (SPAWN_COMMAND_SPAWN_RESPONSE, no_pid.encode().to_vec()),
    ];

    for (tag, body) in replies {
        let caller = process(&kernel, SecurityLevel::Application);
        let transaction = start_spawn(&mut kernel, caller);
        let frame = kernel.reply(spawner, transaction, tag, &body).unwrap();

        let out = spawn_data(&frame);
        assert_eq!(out.status, SpawnStatus::Unknown);
        assert_eq!(out.spawned_process_id, ProcessId::NONE);
        assert!(kernel
            .hal()
            .tasks
            .descriptors(ProcessId::from(caller))
            .is_empty());
    }
}

#[test]
fn test_spawn_unadoptable_descriptors_resolve_unknown() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);
    let caller_pid = ProcessId::from(caller);
    let open = kernel.hal().tasks.open_descriptor(caller_pid).unwrap();

    let transaction = start_spawn(&mut kernel, caller);
    let response = SpawnResponse {
        status: SpawnStatus::Successful,
        spawned_process_id: ProcessId(40),
        stdin_write: open,
        stdout_read: Fd(8),
        stderr_read: Fd(9),
    };
    let frame = kernel
        .reply(spawner, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &response.encode())
        .unwrap();

    assert_eq!(spawn_data(&frame).status, SpawnStatus::Unknown);
    assert_eq!(kernel.hal().tasks.descriptors(caller_pid), [open]);
}

#[test]
fn test_reply_from_wrong_thread_keeps_caller_parked() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);
    let intruder = process(&kernel, SecurityLevel::Application);

    let transaction = start_spawn(&mut kernel, caller);
    let body = SpawnResponse::failed(SpawnStatus::IoError).encode();

    assert_eq!(
        kernel.reply(intruder, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &body),
        Err(KernelError::UnexpectedReplier {
            transaction,
            expected: Some(spawner),
            got: intruder
        })
    );
    assert!(kernel.spawn_phase(caller).is_some());

    kernel
        .reply(spawner, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &body)
        .unwrap();
    assert_eq!(
        kernel.reply(spawner, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &body),
        Err(KernelError::UnknownTransaction(transaction))
    );
}

#[test]
fn test_spawn_waits_for_spawner_registration() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);

    let transaction = start_spawn(&mut kernel, caller);
    assert_eq!(
        kernel.spawn_phase(caller),
        Some(SpawnPhase::AwaitingSpawner { transaction })
    );

    let spawner = spawner(&mut kernel);
    assert_eq!(
        kernel.spawn_phase(caller),
        Some(SpawnPhase::AwaitingReply {
            transaction,
            spawner
        })
    );
    let message = kernel.receive_message(spawner).unwrap();
    assert_eq!(message.transaction, Some(transaction));
    assert!(SpawnRequest::decode(&message.data).is_ok());
}

#[test]
fn test_spawn_send_failure_is_io_error() {
    let config = KernelConfig {
        mailbox_depth: 1,
        ..KernelConfig::default()
    };
    let mut kernel = Kernel::with_config(MockHal::new(), config);
    let spawner = spawner(&mut kernel);
    let first = process(&kernel, SecurityLevel::Application);
    let second = process(&kernel, SecurityLevel::Application);

    start_spawn(&mut kernel, first);
    let frame = syscall(&mut kernel, second, shell_request([Fd::NONE; 3]));

    assert_eq!(spawn_data(&frame).status, SpawnStatus::IoError);
    assert_eq!(kernel.spawn_phase(second), None);
    assert_eq!(kernel.pending_messages(spawner), 1);
}

#[test]
fn test_oversized_spawn_fails_without_stalling_parked_queue() {
    let config = KernelConfig {
        max_message_size: 64,
        ..KernelConfig::default()
    };
    let mut kernel = Kernel::with_config(MockHal::new(), config);
    let big = process(&kernel, SecurityLevel::Application);
    let small = process(&kernel, SecurityLevel::Application);

    let long_path = format!("/{}", "x".repeat(99));
    let data = SpawnData::new(SecurityLevel::Application, &long_path, "", "/", [Fd::NONE; 3]);
    let frame = syscall(&mut kernel, big, SyscallData::Spawn(data));
    assert_eq!(spawn_data(&frame).status, SpawnStatus::IoError);
    assert_eq!(kernel.spawn_phase(big), None);

    let transaction = start_spawn(&mut kernel, small);
    assert_eq!(
        kernel.spawn_phase(small),
        Some(SpawnPhase::AwaitingSpawner { transaction })
    );

    let spawner = spawner(&mut kernel);
    assert_eq!(
        kernel.spawn_phase(small),
        Some(SpawnPhase::AwaitingReply {
            transaction,
            spawner
        })
    );
    assert_eq!(kernel.pending_messages(spawner), 1);
}

#[test]
fn test_parked_spawns_delivered_as_spawner_drains_mailbox() {
    let config = KernelConfig {
        mailbox_depth: 1,
        ..KernelConfig::default()
    };
    let mut kernel = Kernel::with_config(MockHal::new(), config);
    let first = process(&kernel, SecurityLevel::Application);
    let second = process(&kernel, SecurityLevel::Application);

    let first_tx = start_spawn(&mut kernel, first);
    let second_tx = start_spawn(&mut kernel, second);

    let spawner = spawner(&mut kernel);
    assert!(matches!(
        kernel.spawn_phase(first),
        Some(SpawnPhase::AwaitingReply { .. })
    ));
    assert_eq!(
        kernel.spawn_phase(second),
        Some(SpawnPhase::AwaitingSpawner {
            transaction: second_tx
        })
    );

    let message = kernel.receive_message(spawner).unwrap();
    assert_eq!(message.transaction, Some(first_tx));
    assert_eq!(
        kernel.spawn_phase(second),
        Some(SpawnPhase::AwaitingReply {
            transaction: second_tx,
            spawner
        })
    );

    let body = SpawnResponse::failed(SpawnStatus::IoError).encode();
    kernel
        .reply(spawner, first_tx, SPAWN_COMMAND_SPAWN_RESPONSE, &body)
        .unwrap();

    let message = kernel.receive_message(spawner).unwrap();
    assert_eq!(message.from, second);
    assert_eq!(message.transaction, Some(second_tx));
    let frame = kernel
        .reply(spawner, second_tx, SPAWN_COMMAND_SPAWN_RESPONSE, &body)
        .unwrap();
    assert_eq!(frame.thread, second);
    assert_eq!(spawn_data(&frame).status, SpawnStatus::IoError);
}

#[test]
fn test_caller_exit_abandons_spawn() {
    let mut kernel = kernel();
    let spawner = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);

    let transaction = start_spawn(&mut kernel, caller);
    kernel.hal().tasks.remove_thread(caller);
    kernel.thread_exited(caller);

    let body = SpawnResponse::failed(SpawnStatus::IoError).encode();
    assert_eq!(
        kernel.reply(spawner, transaction, SPAWN_COMMAND_SPAWN_RESPONSE, &body),
        Err(KernelError::UnknownTransaction(transaction))
    );
    assert!(matches!(
        kernel.syslog().get_recent(1)[0].event_type,
        SysEventType::Response {
            outcome: SyscallOutcome::Abandoned,
            ..
        }
    ));
}

#[test]
fn test_spawner_exit_requeues_for_successor() {
    let mut kernel = kernel();
    let first = spawner(&mut kernel);
    let caller = process(&kernel, SecurityLevel::Application);
    let transaction = start_spawn(&mut kernel, caller);

    kernel.hal().tasks.remove_thread(first);
    kernel.thread_exited(first);
    assert_eq!(
        kernel.spawn_phase(caller),
        Some(SpawnPhase::AwaitingSpawner { transaction })
    );

    let second = spawner(&mut kernel);
    assert_eq!(kernel.receive_message(second).unwrap().from, caller);
}

#[test]
fn test_identity_held_by_live_thread_is_taken() {
    let mut kernel = kernel();
    let first = spawner(&mut kernel);
    let other = process(&kernel, SecurityLevel::Kernel);

    assert!(matches!(
        kernel.register_identity(other, "spawner"),
        Err(KernelError::Ipc(IpcError::IdentityTaken { .. }))
    ));

    kernel.hal().tasks.remove_thread(first);
    kernel.register_identity(other, "spawner").unwrap();
    assert_eq!(kernel.resolve_identity("spawner"), Some(other));
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_signal_handler() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    let pid = ProcessId::from(caller);

    let register = |signal, handler| {
        SyscallData::RegisterSignalHandler(RegisterSignalHandlerData {
            signal,
            handler,
            previous: 0,
            status: RegisterSignalHandlerStatus::Successful,
        })
    };

    let frame = syscall(&mut kernel, caller, register(32, 0x4000));
    match frame.data {
        SyscallData::RegisterSignalHandler(data) => {
            assert_eq!(data.status, RegisterSignalHandlerStatus::InvalidSignal)
        }
        other => panic!("unexpected data {:?}", other),
    }
    assert_eq!(kernel.signal_handler(pid, 32), None);

    syscall(&mut kernel, caller, register(2, 0x4000));
    let frame = syscall(&mut kernel, caller, register(2, 0x5000));
    match frame.data {
        SyscallData::RegisterSignalHandler(data) => {
            assert_eq!(data.status, RegisterSignalHandlerStatus::Successful);
            assert_eq!(data.previous, 0x4000);
        }
        other => panic!("unexpected data {:?}", other),
    }
    assert_eq!(kernel.signal_handler(pid, 2), Some(0x5000));
}

#[test]
fn test_raise_signal() {
    let mut kernel = kernel();
    let caller = process(&kernel, SecurityLevel::Application);
    let target = process(&kernel, SecurityLevel::Application);

    let raise = |target, signal| {
        SyscallData::RaiseSignal(RaiseSignalData {
            target,
            signal,
            status: RaiseSignalStatus::Successful,
        })
    };
    let status = |frame: TrapFrame| match frame.data {
        SyscallData::RaiseSignal(data) => data.status,
        other => panic!("unexpected data {:?}", other),
    };

    let frame = syscall(&mut kernel, caller, raise(target, 40));
    assert_eq!(status(frame), RaiseSignalStatus::InvalidSignal);

    let frame = syscall(&mut kernel, caller, raise(ThreadId(500), 3));
    assert_eq!(status(frame), RaiseSignalStatus::InvalidTarget);
    assert_eq!(kernel.pending_signals(ThreadId(500)), 0);

    syscall(&mut kernel, caller, raise(target, 3));
    let frame = syscall(&mut kernel, caller, raise(target, 5));
    assert_eq!(status(frame), RaiseSignalStatus::Successful);

    assert_eq!(kernel.pending_signals(target), (1 << 3) | (1 << 5));
    assert_eq!(kernel.take_pending_signals(target), (1 << 3) | (1 << 5));
    assert_eq!(kernel.pending_signals(target), 0);
}

#[test]
fn test_register_irq_handler_requires_driver() {
    let mut kernel = kernel();
    let app = process(&kernel, SecurityLevel::Application);
    let driver = process(&kernel, SecurityLevel::Driver);

    let register = |irq| {
        SyscallData::RegisterIrqHandler(RegisterIrqHandlerData {
            irq,
            handler: 0x8000,
            status: RegisterIrqHandlerStatus::Successful,
        })
    };

    let frame = syscall(&mut kernel, app, register(1));
    match frame.data {
        SyscallData::RegisterIrqHandler(data) => {
            assert_eq!(data.status, RegisterIrqHandlerStatus::NotPermitted)
        }
        other => panic!("unexpected data {:?}", other),
    }
    assert_eq!(kernel.irq_handler(1), None);

    syscall(&mut kernel, driver, register(1));
    assert_eq!(
        kernel.irq_handler(1),
        Some(IrqHandler {
            process: ProcessId::from(driver),
            handler: 0x8000
        })
    );
}
