//! Log, video log and test syscalls.

use alloc::format;
use alloc::string::String;

use log::info;
use tern_hal::{TaskManager, ThreadView, HAL};
use tern_ipc::wire::terminated;

use super::Caller;
use crate::syscall::{LogData, SetVideoLogData, TestData};
use crate::Kernel;

/// `SYS_TEST` code that reports the free physical page count
pub const TEST_FREE_PAGES: u32 = 1;

impl<H: HAL> Kernel<H> {
    pub(crate) fn handle_log(&self, caller: &Caller, data: &mut LogData) {
        sanitize(&mut data.message);

        let text = terminated(&data.message);
        let text = &text[..text.len().min(self.config.max_log_message)];
        let text = String::from_utf8_lossy(text);

        let line = self
            .hal
            .tasks()
            .with_thread(caller.thread, |view| format_line(view, &text))
            .unwrap_or_else(|| format!("- ({}:{}) {}", caller.process, caller.thread, text));
        self.hal.log_write(&line);
    }

    pub(crate) fn handle_set_video_log(&self, caller: &Caller, data: &SetVideoLogData) {
        info!(
            "thread {} turned video log {}",
            caller.thread,
            if data.enabled { "on" } else { "off" }
        );
        self.hal.set_video_log(data.enabled);
    }

    pub(crate) fn handle_test(&self, data: &mut TestData) {
        data.result = match data.test {
            TEST_FREE_PAGES => {
                let free = self.hal.free_page_count();
                info!("free pages: {}", free);
                u32::try_from(free).unwrap_or(u32::MAX)
            }
            _ => 0,
        };
    }
}

/// Replace every `%` with `!` in place.
fn sanitize(message: &mut [u8]) {
    for byte in message.iter_mut().filter(|byte| **byte == b'%') {
        *byte = b'!';
    }
}

/// `-<identifier> (<main pid>:<tid>) <text>`
fn format_line(view: &ThreadView<'_>, text: &str) -> String {
    format!(
        "-{} ({}:{}) {}",
        view.display_identifier().unwrap_or(""),
        view.process,
        view.id,
        text
    )
}
