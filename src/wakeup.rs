//! C2 — Wake-reason decoder: parses 4-byte AIOC frames and derives FSM
//! transition requests (spec.md §3, §4.2).

use crate::coordinator::Coordinator;
use crate::fsm::State;

const FRAME_LEN: usize = 4;
const HEADER_LOGIC_MODE: u8 = 6;
const HEADER_WAKEUP_REASON: u8 = 1;

/// Derive the FSM transition request for a 24-bit wake reason.
pub fn derive_state(reason: u32) -> (State, bool) {
    if reason == 0 {
        return (State::IocShutdown, false);
    }
    if reason & !(0b11 << 22) == 0 {
        let force_s5 = reason & (1 << 22) != 0;
        return (State::Shutdown, force_s5);
    }
    (State::Alive, false)
}

/// Reads frames from the CBC lifecycle device until the process exits.
/// Never returns in normal operation.
pub fn run(coordinator: &Coordinator) {
    let mut buf = [0u8; FRAME_LEN];
    loop {
        let n = coordinator.device.read(&mut buf);
        let n = match n {
            Ok(n) => n,
            Err(e) => {
                log::warn!("wake-reason device read failed: {e}");
                continue;
            }
        };
        if n < FRAME_LEN {
            continue;
        }
        handle_frame(coordinator, buf);
    }
}

fn handle_frame(coordinator: &Coordinator, frame: [u8; FRAME_LEN]) {
    match frame[0] {
        HEADER_LOGIC_MODE => {}
        HEADER_WAKEUP_REASON => {
            let reason = frame[1] as u32 | (frame[2] as u32) << 8 | (frame[3] as u32) << 16;
            coordinator.set_wake_reason(reason);
            let (target, force_s5) = derive_state(reason);
            if target == State::Shutdown {
                coordinator.set_force_s5(force_s5);
            }
            coordinator.fsm.transit(target);
            coordinator.events.post();
        }
        other => log::warn!("unexpected wake-reason frame header {other:#x}"),
    }
}
