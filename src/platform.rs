//! Pluggable "platform actuator": the host power-transition effects the
//! heart-beat emitter invokes on entering `IocShutdown` (spec.md §9's
//! replacement for a raw `system(...)` call). Tests substitute a recorder.

use std::process::Command;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: &'static str,
        source: std::io::Error,
    },
    #[error("{command} exited with a failure status")]
    NonZeroExit { command: &'static str },
}

pub trait PlatformActuator: Sync + Send {
    fn poweroff(&self) -> Result<(), PlatformError>;
    fn reboot(&self) -> Result<(), PlatformError>;
    fn suspend(&self) -> Result<(), PlatformError>;
}

fn run(command: &'static str, args: &[&str]) -> Result<(), PlatformError> {
    let status = Command::new(command)
        .args(args)
        .status()
        .map_err(|source| PlatformError::Spawn { command, source })?;
    if status.success() {
        Ok(())
    } else {
        Err(PlatformError::NonZeroExit { command })
    }
}

/// Shells out to `systemctl`, matching how a coordinator that does not run
/// as PID 1 is expected to request power transitions from the host init.
pub struct SystemCtlActuator;

impl PlatformActuator for SystemCtlActuator {
    fn poweroff(&self) -> Result<(), PlatformError> {
        run("systemctl", &["poweroff"])
    }

    fn reboot(&self) -> Result<(), PlatformError> {
        run("systemctl", &["reboot"])
    }

    fn suspend(&self) -> Result<(), PlatformError> {
        run("systemctl", &["suspend"])
    }
}

/// Records invocations instead of touching the host. Used by tests.
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl PlatformActuator for RecordingActuator {
    fn poweroff(&self) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push("poweroff");
        Ok(())
    }

    fn reboot(&self) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push("reboot");
        Ok(())
    }

    fn suspend(&self) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push("suspend");
        Ok(())
    }
}
