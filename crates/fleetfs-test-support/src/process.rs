//! Process-table checks for subprocess cleanup assertions.

use std::fs;
use std::time::{Duration, Instant};

/// Scheduler state letter from `/proc/<pid>/stat`, `None` once the pid is gone.
#[must_use]
pub fn process_state(pid: u32) -> Option<char> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let after_comm = stat.rsplit_once(')')?.1;
    after_comm.trim_start().chars().next()
}

/// Whether `pid` no longer names a live process (absent or dead).
#[must_use]
pub fn is_gone(pid: u32) -> bool {
    matches!(process_state(pid), None | Some('X'))
}

/// Poll until `pid` is gone (or a zombie when `allow_zombie`), up to `timeout`.
pub async fn wait_until_gone(pid: u32, timeout: Duration, allow_zombie: bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let state = process_state(pid);
        if state.is_none() || state == Some('X') || (allow_zombie && state == Some('Z')) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
