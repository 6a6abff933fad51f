//! Crate-wide error type, composed from each component's own error enum.

use thiserror::Error;

/// Top-level error returned by `main` in both binaries.
///
/// Only the startup path ever converts one of these into a nonzero exit
/// code; every other fault is absorbed where it occurs and logged instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("device error: {0}")]
    Device(#[from] crate::device::DeviceError),

    #[error("IPC error: {0}")]
    Ipc(#[from] crate::ipc::IpcError),

    #[error("diagnostic tool error: {0}")]
    Diag(#[from] crate::diag::DiagError),

    #[error("signal installation failed: {0}")]
    Signal(#[from] nix::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
