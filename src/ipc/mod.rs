//! C5/C6 — IPC: the `{magic, msgid, timestamp, payload}` wire format shared
//! by the local server socket (inbound requests from the VMM) and the VMM
//! client (outbound `Resume`/`Stop`).

pub mod client;
pub mod server;

use num_enum::TryFromPrimitive;
use thiserror::Error;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MSG_MAGIC: u32 = 0x564C_4331; // "VLC1"
pub const PAYLOAD_LEN: usize = 40;
pub const MESSAGE_LEN: usize = 4 + 4 + 8 + PAYLOAD_LEN;

pub const VMNAME_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("bad magic: expected {expected:#x}, got {actual:#x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("unknown msgid {0}")]
    UnknownMsgId(u32),

    #[error("short read: got {0} bytes, expected {MESSAGE_LEN}")]
    ShortRead(usize),

    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("peer refused with status {0}")]
    Refused(i32),
}

/// Discriminants for `msgid`. Inbound to the lifecycle server:
/// `WakeupReason`..`Stop`. Outbound to the VMM: `Resume`, `Stop`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum MsgId {
    WakeupReason = 1,
    RtcTimer = 2,
    Shutdown = 3,
    Suspend = 4,
    Reboot = 5,
    Stop = 6,
    Resume = 7,
}

/// A decoded-but-not-yet-interpreted message: fixed header plus an opaque
/// payload buffer the handler for `msgid` knows how to read.
#[derive(Clone)]
pub struct Message {
    pub msgid: MsgId,
    pub timestamp: i64,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Message {
    pub fn new(msgid: MsgId, payload: [u8; PAYLOAD_LEN]) -> Self {
        Message {
            msgid,
            timestamp: now_epoch_secs(),
            payload,
        }
    }

    pub fn empty(msgid: MsgId) -> Self {
        Self::new(msgid, [0u8; PAYLOAD_LEN])
    }

    pub fn encode(&self) -> [u8; MESSAGE_LEN] {
        let mut buf = [0u8; MESSAGE_LEN];
        buf[0..4].copy_from_slice(&MSG_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&(self.msgid as u32).to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[16..16 + PAYLOAD_LEN].copy_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, IpcError> {
        if buf.len() < MESSAGE_LEN {
            return Err(IpcError::ShortRead(buf.len()));
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != MSG_MAGIC {
            return Err(IpcError::BadMagic {
                expected: MSG_MAGIC,
                actual: magic,
            });
        }
        let msgid_raw = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let msgid = MsgId::try_from_primitive(msgid_raw)
            .map_err(|_| IpcError::UnknownMsgId(msgid_raw))?;
        let timestamp = i64::from_le_bytes(buf[8..16].try_into().unwrap());
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[16..16 + PAYLOAD_LEN]);
        Ok(Message {
            msgid,
            timestamp,
            payload,
        })
    }
}

pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// `err` payload shared by `Shutdown`/`Suspend`/`Reboot` requests and the
/// `status` byte of every ACK (0 = OK, nonzero = refused/failed).
pub fn encode_status(status: i32) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0..4].copy_from_slice(&status.to_le_bytes());
    payload
}

pub fn decode_status(payload: &[u8; PAYLOAD_LEN]) -> i32 {
    i32::from_le_bytes(payload[0..4].try_into().unwrap())
}

/// `WakeupReason` ACK payload.
pub fn encode_reason(reason: u32) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0..4].copy_from_slice(&reason.to_le_bytes());
    payload
}

pub fn decode_reason(payload: &[u8; PAYLOAD_LEN]) -> u32 {
    u32::from_le_bytes(payload[0..4].try_into().unwrap())
}

/// `RtcTimer` request payload: absolute wake time plus VM name.
pub struct RtcTimerRequest {
    pub t: i64,
    pub vmname: [u8; VMNAME_LEN],
}

pub fn encode_rtc_timer(req: &RtcTimerRequest) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0..8].copy_from_slice(&req.t.to_le_bytes());
    payload[8..8 + VMNAME_LEN].copy_from_slice(&req.vmname);
    payload
}

pub fn decode_rtc_timer(payload: &[u8; PAYLOAD_LEN]) -> RtcTimerRequest {
    let t = i64::from_le_bytes(payload[0..8].try_into().unwrap());
    let mut vmname = [0u8; VMNAME_LEN];
    vmname.copy_from_slice(&payload[8..8 + VMNAME_LEN]);
    RtcTimerRequest { t, vmname }
}

/// Outbound `Stop` request payload (force=0, timeout=20s per spec.md §6).
pub struct StopRequest {
    pub force: i32,
    pub timeout_secs: i32,
}

pub fn encode_stop(req: &StopRequest) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0..4].copy_from_slice(&req.force.to_le_bytes());
    payload[4..8].copy_from_slice(&req.timeout_secs.to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let msg = Message::new(MsgId::Shutdown, encode_status(1));
        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.msgid, MsgId::Shutdown);
        assert_eq!(decoded.timestamp, msg.timestamp);
        assert_eq!(decode_status(&decoded.payload), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Message::empty(MsgId::Stop).encode();
        bytes[0] = 0xFF;
        assert!(matches!(
            Message::decode(&bytes),
            Err(IpcError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_unknown_msgid() {
        let mut bytes = Message::empty(MsgId::Stop).encode();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            Message::decode(&bytes),
            Err(IpcError::UnknownMsgId(99))
        ));
    }

    #[test]
    fn rtc_timer_payload_round_trips() {
        let mut vmname = [0u8; VMNAME_LEN];
        vmname[..3].copy_from_slice(b"uos");
        let req = RtcTimerRequest { t: 1_700_000_000, vmname };
        let payload = encode_rtc_timer(&req);
        let decoded = decode_rtc_timer(&payload);
        assert_eq!(decoded.t, 1_700_000_000);
        assert_eq!(&decoded.vmname[..3], b"uos");
    }
}
