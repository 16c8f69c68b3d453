//! Channel naming, frame types and the binary codec used on IPC channels.

pub mod channel_name;
pub mod codec;
pub mod messages;

pub use channel_name::generate_channel_name;
pub use codec::{decode_frame, decode_payload, encode_frame, encode_payload, ProtocolError};
pub use messages::*;
