//! The `Coordinator`: the explicit, owned replacement for the original's
//! scattered global mutable state (spec.md §9). One instance lives for the
//! life of the process and is shared via `Arc` across the three long-lived
//! threads plus any short-lived VMM-client calls.

use crate::device::CbcDevice;
use crate::fsm::Fsm;
use crate::sync::EventSignal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// The RTC heartbeat frame body latched by `RtcTimer` and consumed once by
/// the heartbeat emitter on entering `IocShutdown` from `AcrndSuspend`.
#[derive(Copy, Clone, Default)]
pub struct RtcFrame {
    pub low: u8,
    pub high: u8,
    pub granularity: u8,
}

pub struct Coordinator {
    pub fsm: Fsm,
    pub events: EventSignal,
    pub device: CbcDevice,

    /// Most recent raw 24-bit wake-up reason observed by the decoder.
    wake_reason: AtomicU32,
    /// The reason reported to IPC clients via `WakeupReason` — latched at
    /// the `->Alive` edge, cleared on return to `Default` via `IocShutdown`.
    up_wake_reason: AtomicU32,
    /// Bit 22 of the most recent shutdown-triggering wake reason.
    force_s5: AtomicBool,
    /// Set when an `RtcTimer` request has armed a pending RTC heartbeat.
    rtc_pending: AtomicBool,
    rtc_frame: Mutex<RtcFrame>,

    pub local_socket_path: PathBuf,
    pub vmm_socket_path: PathBuf,
    /// Whether a VMM is believed present (from the match-file config) — if
    /// not, this process also answers `Stop` on its own VMM-address socket.
    pub vmm_present: bool,
}

impl Coordinator {
    pub fn new(
        device: CbcDevice,
        local_socket_path: PathBuf,
        vmm_socket_path: PathBuf,
        vmm_present: bool,
    ) -> Self {
        Coordinator {
            fsm: Fsm::new(),
            events: EventSignal::new(),
            device,
            wake_reason: AtomicU32::new(0),
            up_wake_reason: AtomicU32::new(0),
            force_s5: AtomicBool::new(false),
            rtc_pending: AtomicBool::new(false),
            rtc_frame: Mutex::new(RtcFrame::default()),
            local_socket_path,
            vmm_socket_path,
            vmm_present,
        }
    }

    pub fn set_wake_reason(&self, reason: u32) {
        self.wake_reason.store(reason, Ordering::Release);
    }

    pub fn wake_reason(&self) -> u32 {
        self.wake_reason.load(Ordering::Acquire)
    }

    pub fn latch_up_wake_reason(&self) {
        self.up_wake_reason
            .store(self.wake_reason(), Ordering::Release);
    }

    pub fn clear_up_wake_reason(&self) {
        self.up_wake_reason.store(0, Ordering::Release);
    }

    pub fn up_wake_reason(&self) -> u32 {
        self.up_wake_reason.load(Ordering::Acquire)
    }

    pub fn set_force_s5(&self, force: bool) {
        self.force_s5.store(force, Ordering::Release);
    }

    pub fn force_s5(&self) -> bool {
        self.force_s5.load(Ordering::Acquire)
    }

    pub fn arm_rtc(&self, frame: RtcFrame) {
        *self.rtc_frame.lock().unwrap() = frame;
        self.rtc_pending.store(true, Ordering::Release);
    }

    pub fn take_rtc_if_pending(&self) -> Option<RtcFrame> {
        if self
            .rtc_pending
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(*self.rtc_frame.lock().unwrap())
        } else {
            None
        }
    }
}
