//! C3 — Heart-beat emitter: once-per-second cadence, payload selected from
//! current FSM state, negotiation retries interleaved per spec.md §4.3.

use crate::coordinator::Coordinator;
use crate::fsm::State;
use crate::ipc::client;
use crate::platform::PlatformActuator;
use std::path::Path;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);
const RETRY_BUDGET: u8 = 5;

pub const FRAME_INIT: [u8; 4] = [0x02, 0x03, 0x00, 0x00];
pub const FRAME_ACTIVE: [u8; 4] = [0x02, 0x01, 0x00, 0x00];
pub const FRAME_SHUTDOWN_DELAY: [u8; 4] = [0x02, 0x02, 0x00, 0x00];
pub const FRAME_SHUTDOWN: [u8; 4] = [0x02, 0x00, 0x01, 0x00];
pub const FRAME_REBOOT: [u8; 4] = [0x02, 0x00, 0x02, 0x00];
pub const FRAME_S3: [u8; 4] = [0x02, 0x00, 0x07, 0x00];
pub const FRAME_RTC_TAG: u8 = 0x05;

pub const FRAME_SUPPRESS_1MIN: [u8; 4] = [0x04, 0x60, 0xEA, 0x00];
pub const FRAME_SUPPRESS_5MIN: [u8; 4] = [0x04, 0xE0, 0x93, 0x04];
pub const FRAME_SUPPRESS_10MIN: [u8; 4] = [0x04, 0xC0, 0x27, 0x09];
pub const FRAME_SUPPRESS_30MIN: [u8; 4] = [0x04, 0x40, 0x77, 0x1B];

/// Per-tick retry counters. Owned exclusively by the emitter loop
/// (spec.md §3: "no other component reads or writes them").
struct RetryState {
    /// `None` until the first tick has run. Distinguishing "never observed"
    /// from `Some(State::Default)` is what lets the Default handler tell a
    /// fresh process start apart from a real repeated tick in Default.
    last_state: Option<State>,
    default_streak: u32,
    start_retry: u8,
    stop_retry: u8,
}

impl RetryState {
    fn new() -> Self {
        RetryState {
            last_state: None,
            default_streak: 0,
            start_retry: 0,
            stop_retry: 0,
        }
    }
}

/// Runs the emitter loop until the process exits. Never returns in normal
/// operation.
pub fn run(coordinator: &Coordinator, actuator: &dyn PlatformActuator, vmm_socket_path: &Path) {
    let mut retry = RetryState::new();
    let mut deadline = Instant::now() + TICK;
    loop {
        coordinator.events.wait_deadline(deadline);
        deadline = Instant::now() + TICK;

        let state = coordinator.fsm.get();
        let frame = tick(coordinator, actuator, vmm_socket_path, state, &mut retry);
        if let Some(bytes) = frame {
            if let Err(e) = coordinator.device.write(&bytes) {
                log::warn!("heartbeat write failed: {e}");
            }
        }
        retry.last_state = Some(state);
    }
}

fn tick(
    coordinator: &Coordinator,
    actuator: &dyn PlatformActuator,
    vmm_socket_path: &Path,
    state: State,
    retry: &mut RetryState,
) -> Option<[u8; 4]> {
    match state {
        State::Default => {
            if retry.last_state == Some(State::Default) {
                retry.default_streak += 1;
            } else {
                retry.default_streak = 0;
            }
            retry.start_retry = 0;
            // Skip the first tick after entering Default (spec.md §4.3).
            if retry.default_streak >= 1 {
                Some(FRAME_INIT)
            } else {
                None
            }
        }

        State::Alive => {
            if retry.last_state != Some(State::Alive) {
                coordinator.latch_up_wake_reason();
                match client::resume(vmm_socket_path) {
                    Ok(()) => retry.start_retry = 0,
                    Err(e) => {
                        log::warn!("vmm resume failed, will retry: {e}");
                        retry.start_retry = RETRY_BUDGET;
                    }
                }
            } else if retry.start_retry > 0 {
                retry.start_retry -= 1;
                if client::resume(vmm_socket_path).is_ok() {
                    retry.start_retry = 0;
                }
            }
            Some(FRAME_ACTIVE)
        }

        State::Shutdown => {
            let previous = coordinator.fsm.transit(State::ShutdownDelay);
            if previous == State::Shutdown {
                match client::stop(vmm_socket_path) {
                    Ok(()) => retry.stop_retry = 0,
                    Err(e) => {
                        log::warn!("vmm stop failed, will retry: {e}");
                        retry.stop_retry = RETRY_BUDGET;
                    }
                }
            }
            // Same-tick fall-through into ShutdownDelay (spec.md §9): this
            // squashes the race with a slow VMM into a single heartbeat.
            tick(coordinator, actuator, vmm_socket_path, State::ShutdownDelay, retry)
        }

        State::ShutdownDelay => {
            if retry.stop_retry > 0 {
                retry.stop_retry -= 1;
                if client::stop(vmm_socket_path).is_ok() {
                    retry.stop_retry = 0;
                } else if retry.stop_retry == 0 {
                    log::warn!("vmm stop retries exhausted, treating vmm as suspending");
                    coordinator.fsm.transit(State::AcrndSuspend);
                }
            }
            Some(FRAME_SHUTDOWN_DELAY)
        }

        State::AcrndShutdown => Some(FRAME_SHUTDOWN),
        State::AcrndReboot => Some(FRAME_REBOOT),
        State::AcrndSuspend => Some(FRAME_S3),

        State::IocShutdown => {
            match retry.last_state {
                Some(State::AcrndShutdown) => {
                    if let Err(e) = actuator.poweroff() {
                        log::warn!("poweroff failed: {e}");
                    }
                }
                Some(State::AcrndReboot) => {
                    if let Err(e) = actuator.reboot() {
                        log::warn!("reboot failed: {e}");
                    }
                }
                Some(State::AcrndSuspend) => {
                    if let Some(rtc) = coordinator.take_rtc_if_pending() {
                        let frame = [FRAME_RTC_TAG, rtc.low, rtc.high, rtc.granularity];
                        if let Err(e) = coordinator.device.write(&frame) {
                            log::warn!("rtc heartbeat write failed: {e}");
                        }
                    }
                    if let Err(e) = actuator.suspend() {
                        log::warn!("suspend failed: {e}");
                    }
                }
                _ => {}
            }
            coordinator.fsm.transit(State::Default);
            coordinator.clear_up_wake_reason();
            None
        }
    }
}
