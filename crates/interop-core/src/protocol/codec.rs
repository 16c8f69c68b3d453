//! Binary codec for IPC frames and their payloads.
//!
//! Wire format:
//! ```text
//! [version:1][kind:1][reserved:2][payload_len:4][call_id:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are big-endian.
//!
//! Payloads of `Call` and `Reply` frames are produced by [`encode_payload`],
//! which serializes any `serde` type with `bincode`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::protocol::messages::{Frame, FrameKind, HEADER_SIZE, MAX_PAYLOAD_LEN, PROTOCOL_VERSION};

/// Errors that can occur during frame or payload encoding and decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The kind byte in the header is not a recognized value.
    #[error("unknown frame kind: 0x{0:02X}")]
    UnknownFrameKind(u8),

    /// The version byte in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The header declares a payload larger than [`MAX_PAYLOAD_LEN`].
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),

    /// The payload could not be serialized or deserialized.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A well-formed frame arrived where the exchange does not allow it.
    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(FrameKind),

    /// A reply answered a different call than the one outstanding.
    #[error("reply for call {got} while waiting for call {expected}")]
    CallIdMismatch { expected: u64, got: u64 },
}

/// Decoded fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub payload_len: usize,
    pub call_id: u64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Frame`] into a byte vector including the 16-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds the
/// frame limit.
///
/// # Examples
///
/// ```rust
/// use interop_core::protocol::{decode_frame, encode_frame, Frame, FrameKind};
///
/// let frame = Frame::new(FrameKind::Call, 7, vec![1, 2, 3]);
/// let bytes = encode_frame(&frame).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    if frame.payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(frame.payload.len()));
    }
    let payload_len = frame.payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + frame.payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(frame.kind as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&frame.call_id.to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}

/// Decodes the fixed-size header at the start of `bytes`.
///
/// Stream readers call this on exactly [`HEADER_SIZE`] bytes, then read
/// `payload_len` more bytes for the payload.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the header is short, has the wrong version,
/// names an unknown kind, or declares an oversized payload.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let kind =
        FrameKind::try_from(bytes[1]).map_err(|_| ProtocolError::UnknownFrameKind(bytes[1]))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len));
    }

    let call_id = u64::from_be_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]);

    Ok(FrameHeader { kind, payload_len, call_id })
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header +
/// payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed or incomplete.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let total_needed = HEADER_SIZE + header.payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let payload = bytes[HEADER_SIZE..total_needed].to_vec();
    Ok((Frame::new(header.kind, header.call_id, payload), total_needed))
}

/// Serializes a contract request or response with bincode.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the value cannot be
/// serialized (for example a map with non-serializable keys).
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Deserializes a contract request or response with bincode.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the bytes do not decode
/// as `T`.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(bytes).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}
