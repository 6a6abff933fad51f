//! C8 — Signal & supervisor: ignore `SIGPIPE`, and on `SIGTERM` pick the
//! right exit heart-beat from the host's pending job list (spec.md §4.8).
//!
//! The signal handler itself only sets a flag (spec.md §9: prefer a
//! signal-notified task over true async-signal-unsafe execution); a
//! dedicated thread polls that flag and performs the actual I/O and exit.

use crate::coordinator::Coordinator;
use crate::heartbeat::{FRAME_REBOOT, FRAME_SHUTDOWN, FRAME_SUPPRESS_30MIN};
use nix::sys::signal::{self, SigHandler, Signal};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static TERM_REQUESTED: AtomicBool = AtomicBool::new(false);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

extern "C" fn on_sigterm(_signum: i32) {
    TERM_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install handlers. Must be called once, before any other thread starts.
pub fn install() -> Result<(), nix::Error> {
    unsafe {
        signal::signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(on_sigterm))?;
    }
    Ok(())
}

/// Polls for a pending `SIGTERM` and runs the termination protocol in
/// thread context, never returning once it fires (the process exits).
pub fn supervise(coordinator: &Coordinator) -> ! {
    loop {
        if TERM_REQUESTED.load(Ordering::SeqCst) {
            terminate(coordinator);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(coordinator: &Coordinator) -> ! {
    let frame = if job_pending("reboot.target") {
        FRAME_REBOOT
    } else if job_pending("poweroff.target") {
        FRAME_SHUTDOWN
    } else {
        FRAME_SUPPRESS_30MIN
    };
    if let Err(e) = coordinator.device.write(&frame) {
        log::warn!("exit heartbeat write failed: {e}");
    }
    std::process::exit(0);
}

/// Mirrors `systemctl list-jobs <target> | grep <target>` without a shell.
fn job_pending(target: &str) -> bool {
    let output = match Command::new("systemctl").arg("list-jobs").output() {
        Ok(output) => output,
        Err(e) => {
            log::warn!("systemctl list-jobs failed: {e}");
            return false;
        }
    };
    String::from_utf8_lossy(&output.stdout).contains(target)
}
