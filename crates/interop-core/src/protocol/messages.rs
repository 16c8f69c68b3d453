//! Frame types exchanged over an IPC channel.
//!
//! Every frame is a fixed header followed by an opaque payload. The header
//! says what the payload is; the payload itself is a bincode-encoded
//! contract request/response, a contract name, or a fault description.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current frame format version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload a peer may declare. Anything larger is treated as a
/// corrupt or hostile frame.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

// ── Frame kinds ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameKind {
    /// Client → server: payload is the contract name the client expects.
    Hello = 0x01,
    /// Server → client: the contract name matched.
    HelloAck = 0x02,
    /// Client → server: payload is an encoded request.
    Call = 0x10,
    /// Server → client: payload is an encoded response.
    Reply = 0x11,
    /// Either direction: payload is a UTF-8 description of what went wrong.
    Fault = 0x1F,
}

impl TryFrom<u8> for FrameKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(FrameKind::Hello),
            0x02 => Ok(FrameKind::HelloAck),
            0x10 => Ok(FrameKind::Call),
            0x11 => Ok(FrameKind::Reply),
            0x1F => Ok(FrameKind::Fault),
            _ => Err(()),
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One unit on the wire.
///
/// `call_id` pairs a `Reply`/`Fault` with the `Call` that caused it. The
/// handshake frames use `call_id = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub call_id: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, call_id: u64, payload: Vec<u8>) -> Self {
        Self { kind, call_id, payload }
    }

    pub fn hello(contract_name: &str) -> Self {
        Self::new(FrameKind::Hello, 0, contract_name.as_bytes().to_vec())
    }

    pub fn hello_ack() -> Self {
        Self::new(FrameKind::HelloAck, 0, Vec::new())
    }

    pub fn fault(call_id: u64, description: impl Into<String>) -> Self {
        Self::new(FrameKind::Fault, call_id, description.into().into_bytes())
    }

    /// Interprets the payload as text, replacing invalid UTF-8.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
