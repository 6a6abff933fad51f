//! C1 — Device I/O: open/close the CBC lifecycle character device, with
//! bounded reads/writes that retry on `EINTR`/quota-exceeded the way the
//! collaborating CBC kernel driver expects.

use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEVICE_WAIT_TIMEOUT: Duration = Duration::from_secs(180);
const EDQUOT_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("timed out waiting for {path} to appear")]
    NotPresent { path: String },

    #[error("failed to open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("write to device failed: {source}")]
    Write { source: io::Error },
}

/// A CBC character device opened read/write, no controlling TTY.
pub struct CbcDevice {
    file: File,
}

impl CbcDevice {
    /// Poll for `path` to exist (up to 180s) then open it RW/no-ctty.
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        wait_for_device(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(CbcDevice { file })
    }

    /// Read into `buf`, retrying on `EINTR`. Returns the number of bytes
    /// read, which may be fewer than `buf.len()` — callers must validate.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;
        loop {
            let mut file = &self.file;
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("cbc device read failed: {e}");
                    thread::sleep(Duration::from_millis(5));
                    return Ok(0);
                }
            }
        }
    }

    /// Write `payload` fully, retrying on `EINTR` and treating `EDQUOT` as
    /// success-after-brief-sleep (the CBC driver uses it to signal
    /// "try again shortly", not a real quota failure).
    pub fn write(&self, payload: &[u8]) -> Result<(), DeviceError> {
        use std::io::Write;
        loop {
            let mut file = &self.file;
            match file.write(payload) {
                Ok(_) => return Ok(()),
                Err(e) => match Errno::from_i32(e.raw_os_error().unwrap_or(0)) {
                    Errno::EINTR => continue,
                    Errno::EDQUOT => {
                        thread::sleep(EDQUOT_BACKOFF);
                        return Ok(());
                    }
                    _ => return Err(DeviceError::Write { source: e }),
                },
            }
        }
    }

    pub fn as_raw_fd(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

fn wait_for_device(path: &Path) -> Result<(), DeviceError> {
    let deadline = Instant::now() + DEVICE_WAIT_TIMEOUT;
    while !path.exists() {
        if Instant::now() >= deadline {
            return Err(DeviceError::NotPresent {
                path: path.display().to_string(),
            });
        }
        log::warn!("waiting for {}", path.display());
        thread::sleep(DEVICE_POLL_INTERVAL);
    }
    Ok(())
}

// `CbcDevice` is dropped (closing the fd) idempotently via `File`'s own
// `Drop` impl; there is no separate close path to get wrong.
