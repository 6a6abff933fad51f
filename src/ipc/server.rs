//! C5 — IPC server: accepts connections on the local lifecycle socket and
//! dispatches each request to a typed handler per spec.md §4.5.

use super::client;
use super::{
    decode_rtc_timer, decode_status, encode_reason, encode_status, IpcError, Message, MsgId,
    PAYLOAD_LEN,
};
use crate::coordinator::{Coordinator, RtcFrame};
use crate::fsm::State;
use crate::rtc;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;

/// Bind the local socket (removing any stale path left by a previous run)
/// and serve requests until the process exits. Never returns on success.
pub fn serve(coordinator: Arc<Coordinator>, socket_path: &Path) -> Result<(), IpcError> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    log::info!("ipc server listening on {}", socket_path.display());
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let coordinator = Arc::clone(&coordinator);
                std::thread::spawn(move || {
                    if let Err(e) = handle_connection(&coordinator, stream) {
                        log::warn!("ipc connection error: {e}");
                    }
                });
            }
            Err(e) => log::warn!("ipc accept failed: {e}"),
        }
    }
    Ok(())
}

fn handle_connection(coordinator: &Coordinator, mut stream: UnixStream) -> Result<(), IpcError> {
    let mut buf = [0u8; super::MESSAGE_LEN];
    stream.read_exact(&mut buf)?;
    let request = Message::decode(&buf)?;
    let ack = dispatch(coordinator, &request);
    stream.write_all(&ack.encode())?;
    Ok(())
}

fn dispatch(coordinator: &Coordinator, request: &Message) -> Message {
    match request.msgid {
        MsgId::WakeupReason => {
            Message::new(MsgId::WakeupReason, encode_reason(coordinator.up_wake_reason()))
        }
        MsgId::RtcTimer => {
            let req = decode_rtc_timer(&request.payload);
            let delta = req.t - super::now_epoch_secs();
            let status = match rtc::encode(delta) {
                Ok((value, granularity)) => {
                    let bytes = rtc::encode_frame_bytes(value, granularity);
                    coordinator.arm_rtc(RtcFrame {
                        low: bytes[0],
                        high: bytes[1],
                        granularity: bytes[2],
                    });
                    0
                }
                Err(e) => {
                    log::warn!("rtc timer request rejected: {e}");
                    -1
                }
            };
            Message::new(MsgId::RtcTimer, encode_status(status))
        }
        MsgId::Shutdown => handle_negotiated(coordinator, request, MsgId::Shutdown, State::AcrndShutdown),
        MsgId::Suspend => handle_negotiated(coordinator, request, MsgId::Suspend, State::AcrndSuspend),
        MsgId::Reboot => handle_negotiated(coordinator, request, MsgId::Reboot, State::AcrndReboot),
        MsgId::Stop => handle_stop(coordinator, request),
        // Resume is only ever sent by us to the VMM, never received here.
        MsgId::Resume => Message::new(MsgId::Resume, encode_status(-1)),
    }
}

fn handle_negotiated(
    coordinator: &Coordinator,
    request: &Message,
    reply_id: MsgId,
    accepted: State,
) -> Message {
    let err = decode_status(&request.payload);
    if err == 0 {
        coordinator.fsm.transit(accepted);
    } else {
        coordinator.fsm.transit(State::Default);
    }
    coordinator.events.post();
    Message::new(reply_id, encode_status(0))
}

/// `STOP` is only registered when startup decided no VMM is present
/// (spec.md §4.6); it re-dispatches to the local socket as `SHUTDOWN` or
/// `SUSPEND` depending on the latched S5 preference.
fn handle_stop(coordinator: &Coordinator, _request: &Message) -> Message {
    let forced = if coordinator.force_s5() {
        MsgId::Shutdown
    } else {
        MsgId::Suspend
    };
    let payload: [u8; PAYLOAD_LEN] = encode_status(0);
    if let Err(e) = client::send_request(&coordinator.local_socket_path, forced, payload) {
        log::warn!("stop fallback re-dispatch failed: {e}");
    }
    Message::new(MsgId::Stop, encode_status(0))
}
