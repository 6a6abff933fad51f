//! C9 — AIOC diagnostic tool: query firmware/bootloader/mainboard versions
//! and boot timestamps over two CBC device endpoints (spec.md §4.9).

use crate::device::{CbcDevice, DeviceError};
use nix::poll::{poll, PollFd, PollFlags};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DIAG_DEVICE: &str = "/dev/cbc-diagnosis";
pub const DEFAULT_DLT_DEVICE: &str = "/dev/cbc-dlt";

const VERSION_REQUEST: u8 = 0x04;
const TIMESTAMP_REQUEST: u8 = 0xFF;
const POLL_TIMEOUT_MS: i32 = 200;
const SETTLING_DELAY: Duration = Duration::from_millis(100);
const MAX_FRAME: usize = 96;
const TIMESTAMP_ABL_START_REASON: u8 = 2;

pub const OUTPUT_NONE: u8 = 0;
pub const OUTPUT_BOOTLOADER: u8 = 1 << 0;
pub const OUTPUT_FIRMWARE: u8 = 1 << 1;
pub const OUTPUT_MAINBOARD: u8 = 1 << 2;
pub const OUTPUT_ALL: u8 = OUTPUT_BOOTLOADER | OUTPUT_FIRMWARE | OUTPUT_MAINBOARD;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("poll failed: {0}")]
    Poll(#[from] nix::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("request write was short: wrote {wrote}, expected {expected}")]
    ShortWrite { wrote: usize, expected: usize },
}

/// Replaces the original's overloaded `boot_timestamps_flag` (0/1/2) with a
/// tagged variant (spec.md §9).
pub enum BootTimestampSink {
    None,
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionTriple {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionReport {
    pub bootloader: VersionTriple,
    pub firmware: VersionTriple,
    pub mainboard: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTimestamp {
    pub reason_code: u8,
    pub raw: u64,
    /// Relative to the most recent reason-code-2 ("ABL start") timestamp.
    pub relative: u64,
}

pub struct DiagDevices {
    diag: CbcDevice,
    dlt: CbcDevice,
}

impl DiagDevices {
    pub fn open(diag_path: &Path, dlt_path: &Path) -> Result<Self, DiagError> {
        let diag = CbcDevice::open(diag_path)?;
        let dlt = CbcDevice::open(dlt_path)?;
        Ok(DiagDevices { diag, dlt })
    }

    /// Send the version request (if `output_selection` is non-empty) then,
    /// after a 100ms settling delay, the timestamp request (if wanted).
    pub fn send_requests(
        &self,
        output_selection: u8,
        timestamps_wanted: bool,
    ) -> Result<(), DiagError> {
        if output_selection != OUTPUT_NONE {
            write_one(&self.diag, VERSION_REQUEST)?;
        }
        if timestamps_wanted {
            if output_selection != OUTPUT_NONE {
                thread::sleep(SETTLING_DELAY);
            }
            write_one(&self.dlt, TIMESTAMP_REQUEST)?;
        }
        Ok(())
    }

    /// Poll both endpoints once (200ms timeout) and decode whichever
    /// responded. Timestamps are drained until no more frames are readable.
    pub fn receive(
        &self,
        output_selection: u8,
        timestamps_wanted: bool,
        abl_start: &mut Option<u64>,
    ) -> Result<(Option<VersionReport>, Vec<BootTimestamp>), DiagError> {
        let mut fds = [
            PollFd::new(self.diag.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(self.dlt.as_raw_fd(), PollFlags::POLLIN),
        ];
        let ready = poll(&mut fds, POLL_TIMEOUT_MS)?;

        let mut version = None;
        let mut stamps = Vec::new();
        if ready > 0 {
            let diag_readable = fds[0]
                .revents()
                .map(|r| r.contains(PollFlags::POLLIN))
                .unwrap_or(false);
            let dlt_readable = fds[1]
                .revents()
                .map(|r| r.contains(PollFlags::POLLIN))
                .unwrap_or(false);

            if output_selection != OUTPUT_NONE && diag_readable {
                let mut buf = [0u8; MAX_FRAME];
                let n = self.diag.read(&mut buf)?;
                version = decode_version(&buf[..n], output_selection);
                thread::sleep(SETTLING_DELAY);
            }

            if timestamps_wanted && dlt_readable {
                loop {
                    let mut buf = [0u8; MAX_FRAME];
                    let n = self.dlt.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    if let Some(stamp) = decode_timestamp(&buf[..n], abl_start) {
                        stamps.push(stamp);
                    }
                    thread::sleep(SETTLING_DELAY);
                }
            }
        }
        Ok((version, stamps))
    }
}

fn write_one(device: &CbcDevice, byte: u8) -> Result<(), DiagError> {
    device.write(&[byte])?;
    Ok(())
}

/// `buffer` is the raw frame with its leading tag byte already stripped by
/// the caller convention mirrored from the original (`++bptr`).
fn decode_version(frame: &[u8], output_selection: u8) -> Option<VersionReport> {
    let buffer = frame.get(1..)?;
    if buffer.len() < 25 {
        return None;
    }
    let word = |i: usize| u32::from_le_bytes(buffer[i * 4..i * 4 + 4].try_into().unwrap());
    let bootloader = VersionTriple {
        major: word(0),
        minor: word(1),
        revision: word(2),
    };
    let firmware = VersionTriple {
        major: word(3),
        minor: word(4),
        revision: word(5),
    };
    let mainboard = buffer[24];
    let _ = output_selection;
    Some(VersionReport {
        bootloader,
        firmware,
        mainboard,
    })
}

fn decode_timestamp(frame: &[u8], abl_start: &mut Option<u64>) -> Option<BootTimestamp> {
    let buffer = frame.get(1..)?;
    if buffer.is_empty() {
        return None;
    }
    let reason_code = buffer[0];
    let ts_bytes = buffer.get(1..9)?;
    let raw = u64::from_le_bytes(ts_bytes.try_into().ok()?);
    if reason_code == TIMESTAMP_ABL_START_REASON {
        *abl_start = Some(raw);
    }
    let relative = raw.saturating_sub(abl_start.unwrap_or(0));
    Some(BootTimestamp {
        reason_code,
        raw,
        relative,
    })
}

pub fn print_version(report: &VersionReport, output_selection: u8) {
    if output_selection & OUTPUT_BOOTLOADER != 0 {
        println!(
            "Bootloader version: {}.{}.{}",
            report.bootloader.major, report.bootloader.minor, report.bootloader.revision
        );
    }
    if output_selection & OUTPUT_FIRMWARE != 0 {
        println!(
            "Firmware version: {}.{}.{}",
            report.firmware.major, report.firmware.minor, report.firmware.revision
        );
    }
    if output_selection & OUTPUT_MAINBOARD != 0 {
        println!("Mainboard version: {}", report.mainboard);
    }
}

pub fn report_timestamp(stamp: &BootTimestamp, sink: &BootTimestampSink) -> io::Result<()> {
    let line = format!("BTMCBC {} {}", stamp.reason_code, stamp.relative);
    match sink {
        BootTimestampSink::None => {}
        BootTimestampSink::Stdout => println!("{line}"),
        BootTimestampSink::File(path) => {
            use std::io::Write;
            println!("{line}");
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(file, "{line}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_frame() -> Vec<u8> {
        let mut buf = vec![0u8; 26];
        buf[0] = VERSION_REQUEST; // leading tag, stripped by decode_version
        let words: [u32; 6] = [1, 2, 3, 4, 5, 6];
        for (i, w) in words.iter().enumerate() {
            buf[1 + i * 4..1 + i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        buf[25] = 9;
        buf
    }

    #[test]
    fn decodes_version_words_and_mainboard_byte() {
        let report = decode_version(&version_frame(), OUTPUT_ALL).unwrap();
        assert_eq!(
            report.bootloader,
            VersionTriple {
                major: 1,
                minor: 2,
                revision: 3
            }
        );
        assert_eq!(
            report.firmware,
            VersionTriple {
                major: 4,
                minor: 5,
                revision: 6
            }
        );
        assert_eq!(report.mainboard, 9);
    }

    #[test]
    fn short_version_frame_is_rejected() {
        assert!(decode_version(&[0u8; 10], OUTPUT_ALL).is_none());
    }

    #[test]
    fn first_abl_start_timestamp_becomes_origin() {
        let mut origin = None;
        let mut frame = vec![0u8; 10];
        frame[1] = TIMESTAMP_ABL_START_REASON;
        frame[2..10].copy_from_slice(&1_000u64.to_le_bytes());
        let stamp = decode_timestamp(&frame, &mut origin).unwrap();
        assert_eq!(stamp.relative, 0);
        assert_eq!(origin, Some(1_000));
    }

    #[test]
    fn later_timestamp_is_relative_to_latched_origin() {
        let mut origin = Some(1_000u64);
        let mut frame = vec![0u8; 10];
        frame[1] = 3;
        frame[2..10].copy_from_slice(&1_500u64.to_le_bytes());
        let stamp = decode_timestamp(&frame, &mut origin).unwrap();
        assert_eq!(stamp.relative, 500);
    }
}
