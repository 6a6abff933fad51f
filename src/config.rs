//! Startup configuration: the `device | tty | tag` match-file that decides
//! whether a VMM is already known to be present (spec.md §4.6, §6).

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MATCH_FILE: &str = "/usr/share/ioc-cbc-tools/cbc_match.txt";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read match file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

struct MatchEntry {
    device: PathBuf,
    tag: String,
}

fn parse_line(line: &str) -> Option<MatchEntry> {
    let mut fields = line.split('|').map(str::trim);
    let device = fields.next()?;
    let _tty = fields.next()?;
    let tag = fields.next()?;
    if device.is_empty() || tag.is_empty() {
        return None;
    }
    Some(MatchEntry {
        device: PathBuf::from(device),
        tag: tag.to_string(),
    })
}

/// Scan `path` for the first entry whose device exists on disk, and report
/// whether its tag names an `acrn`-prefixed VMM (case-insensitive). A
/// missing or unreadable match file, or no matching entry, means "no VMM
/// known" — this is a best-effort startup hint, not a hard requirement.
pub fn vmm_present(path: &Path) -> bool {
    match read_entries(path) {
        Ok(entries) => entries
            .into_iter()
            .find(|entry| entry.device.exists())
            .map(|entry| entry.tag.to_ascii_lowercase().starts_with("acrn"))
            .unwrap_or(false),
        Err(e) => {
            log::warn!("{e}");
            false
        }
    }
}

fn read_entries(path: &Path) -> Result<Vec<MatchEntry>, ConfigError> {
    let file = std::fs::File::open(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(entry) = parse_line(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}
