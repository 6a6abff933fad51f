//! C6 — VMM client: a short-lived unix-domain client used by the heart-beat
//! emitter to negotiate `RESUME`/`STOP`, and by the IPC server's `STOP`
//! fallback (spec.md §4.6) to re-dispatch onto the local socket.

use super::{decode_status, encode_status, IpcError, Message, MsgId, PAYLOAD_LEN};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// `open -> send(req) -> recv(ack, 2s timeout) -> close`. Returns the ACK's
/// status byte, or any error including a missing/unresponsive server.
pub fn send_request(
    socket_path: &Path,
    msgid: MsgId,
    payload: [u8; PAYLOAD_LEN],
) -> Result<i32, IpcError> {
    let mut stream = UnixStream::connect(socket_path)?;
    stream.set_read_timeout(Some(ACK_TIMEOUT))?;
    stream.set_write_timeout(Some(ACK_TIMEOUT))?;

    let request = Message::new(msgid, payload);
    stream.write_all(&request.encode())?;

    let mut buf = [0u8; super::MESSAGE_LEN];
    stream.read_exact(&mut buf).map_err(|e| {
        if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) {
            IpcError::Timeout
        } else {
            IpcError::Io(e)
        }
    })?;
    let ack = Message::decode(&buf)?;
    Ok(decode_status(&ack.payload))
}

/// Send `RESUME` on entering `Alive`. Returns `Err` on any failure,
/// matching the "-1 on any failure" contract of spec.md §4.6.
pub fn resume(vmm_socket_path: &Path) -> Result<(), IpcError> {
    let status = send_request(vmm_socket_path, MsgId::Resume, encode_status(0))?;
    if status == 0 {
        Ok(())
    } else {
        Err(IpcError::Refused(status))
    }
}

/// Send `STOP` with `force=0, timeout=20s` on entering `Shutdown`.
pub fn stop(vmm_socket_path: &Path) -> Result<(), IpcError> {
    let req = super::StopRequest {
        force: 0,
        timeout_secs: 20,
    };
    let status = send_request(vmm_socket_path, MsgId::Stop, super::encode_stop(&req))?;
    if status == 0 {
        Ok(())
    } else {
        Err(IpcError::Refused(status))
    }
}
