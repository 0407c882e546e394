//! Wire framing for datagram transports.
//!
//! Frame layout: a 4-byte big-endian magic marker followed by the bincode
//! encoding of a [`Payload`]. The payload's enum tags carry the membership/kv
//! discriminant and the message type; the fields carry sequence number, sender,
//! key, optional value and replica flag (kv) or heartbeat, timestamp and member
//! list (membership). Any frame that fails to decode completely is rejected.

use super::types::Payload;
use crate::error::{ClusterError, Result};
use bincode::Options;

pub const MAGIC: u32 = 0x0A0A_0A0A;
pub const MAX_FRAME_LEN: usize = 65_507;

const HEADER_LEN: usize = 4;

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit((MAX_FRAME_LEN - HEADER_LEN) as u64)
        .reject_trailing_bytes()
}

pub fn encode(payload: &Payload) -> Result<Vec<u8>> {
    let body = wire()
        .serialize(payload)
        .map_err(|e| ClusterError::MalformedInput(format!("cannot encode payload: {}", e)))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&MAGIC.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode(frame: &[u8]) -> Result<Payload> {
    if frame.len() <= HEADER_LEN {
        return Err(ClusterError::MalformedInput(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    let (header, body) = frame.split_at(HEADER_LEN);
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != MAGIC {
        return Err(ClusterError::MalformedInput(format!(
            "invalid magic {:#010x}",
            magic
        )));
    }

    wire()
        .deserialize(body)
        .map_err(|e| ClusterError::MalformedInput(format!("cannot decode payload: {}", e)))
}
