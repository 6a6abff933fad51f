//! Coverage of the named end-to-end scenarios from spec.md §8, built on the
//! public FSM/wake-reason/RTC surface (the heart-beat emitter's own per-tick
//! behavior is covered by `heartbeat`'s inline tests).

use vlc::fsm::State;
use vlc::rtc;
use vlc::wakeup::derive_state;

#[test]
fn scenario_cold_start_then_ignition_on() {
    let (target, force_s5) = derive_state(0x000001);
    assert_eq!(target, State::Alive);
    assert!(!force_s5);
}

#[test]
fn scenario_ignition_off_requests_shutdown() {
    let (target, force_s5) = derive_state(0x400000);
    assert_eq!(target, State::Shutdown);
    assert!(!force_s5);
}

#[test]
fn scenario_s5_preferred_sets_force_s5() {
    let (target, force_s5) = derive_state(0xC00000);
    assert_eq!(target, State::Shutdown);
    assert!(force_s5);
}

#[test]
fn scenario_zero_reason_requests_ioc_shutdown() {
    let (target, _) = derive_state(0x000000);
    assert_eq!(target, State::IocShutdown);
}

#[test]
fn scenario_rtc_set_then_suspend_encodes_3700_seconds() {
    let (value, granularity) = rtc::encode(3700).unwrap();
    let frame = rtc::encode_frame_bytes(value, granularity);
    assert_eq!(frame, [0x3D, 0x00, 1]);
}

#[test]
fn fsm_walks_the_graceful_shutdown_path() {
    let fsm = vlc::fsm::Fsm::new();
    fsm.transit(State::Alive);
    fsm.transit(State::Shutdown);
    fsm.transit(State::ShutdownDelay);
    fsm.transit(State::AcrndShutdown);
    fsm.transit(State::IocShutdown);
    assert_eq!(fsm.get(), State::IocShutdown);
    fsm.transit(State::Default);
    assert_eq!(fsm.get(), State::Default);
}

#[test]
fn fsm_refuses_shutdown_back_to_alive_on_new_wakeup() {
    let fsm = vlc::fsm::Fsm::new();
    fsm.transit(State::Alive);
    fsm.transit(State::Shutdown);
    fsm.transit(State::ShutdownDelay);
    fsm.transit(State::Default);
    assert_eq!(fsm.get(), State::Default);
    let (target, _) = derive_state(0x000001);
    fsm.transit(target);
    assert_eq!(fsm.get(), State::Alive);
}
