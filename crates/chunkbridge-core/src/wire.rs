//! chunkbridge ingestion wire format.
//!
//! Every frame on an ingestion stream is laid out as:
//!
//! ```text
//! ┌────────────────┬────────────────────────────────────────────────────────────────────────┬─────────────┐
//! │ Transport (2B) │ Session header (23B)                                                   │ Payload     │
//! │ u16 LE total   │ state u8 │ session u32 LE │ sequence u32 LE │ rsv 4 │ rsv 6 │ size u32 │ total - 25B │
//! └────────────────┴────────────────────────────────────────────────────────────────────────┴─────────────┘
//! ```
//!
//! The transport length counts the whole frame, both headers included.
//! Frames are concatenated back to back with no padding. The chunk type,
//! source identifier and transmission size fields of the session header are
//! reserved: they keep their width on the wire but nothing reads them.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Headers ──────────────────────────────────────────────────────────────────

/// Length prefix of a frame.
///
/// Wire size: 2 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct TransportHeader {
    /// Total frame length in bytes: transport header + session header + payload.
    pub frame_length: U16<LittleEndian>,
}

assert_eq_size!(TransportHeader, [u8; 2]);

/// Session layer header carried by every frame.
///
/// Wire size: 23 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct SessionHeader {
    /// 0 = more frames follow, 1 = last frame of the session.
    pub transmission_state: u8,
    pub session_number: U32<LittleEndian>,
    pub sequence_number: U32<LittleEndian>,
    /// Reserved. Not interpreted.
    pub chunk_type: [u8; 4],
    /// Reserved. Not interpreted.
    pub source_id: [u8; 6],
    /// Bytes in the whole session transmission. Not interpreted.
    pub transmission_size: U32<LittleEndian>,
}

assert_eq_size!(SessionHeader, [u8; 23]);

impl SessionHeader {
    pub fn new(states: &SessionStates) -> Self {
        Self {
            transmission_state: states.transmission_state,
            session_number: U32::new(states.session_number),
            sequence_number: U32::new(states.sequence_number),
            chunk_type: [0u8; 4],
            source_id: [0u8; 6],
            transmission_size: U32::new(0),
        }
    }
}

// ── Constants ────────────────────────────────────────────────────────────────

pub const TRANSPORT_HEADER_SIZE: usize = std::mem::size_of::<TransportHeader>();
pub const SESSION_HEADER_SIZE: usize = std::mem::size_of::<SessionHeader>();

/// Smallest legal frame: both headers, empty payload.
pub const FRAME_HEADER_SIZE: usize = TRANSPORT_HEADER_SIZE + SESSION_HEADER_SIZE;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - FRAME_HEADER_SIZE;

pub const TRANSMISSION_CONTINUING: u8 = 0;
pub const TRANSMISSION_LAST: u8 = 1;

// ── Decoded frames ───────────────────────────────────────────────────────────

/// The session fields the reassembler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStates {
    pub transmission_state: u8,
    pub session_number: u32,
    pub sequence_number: u32,
}

impl SessionStates {
    pub fn new(transmission_state: u8, session_number: u32, sequence_number: u32) -> Self {
        Self {
            transmission_state,
            session_number,
            sequence_number,
        }
    }

    pub fn is_last(&self) -> bool {
        self.transmission_state == TRANSMISSION_LAST
    }
}

/// One frame lifted off the stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub states: SessionStates,
    pub payload: Bytes,
}

/// Extract `(transmission_state, session_number, sequence_number)` from a
/// session header.
///
/// Only the first 23 bytes are read; anything after them is ignored.
pub fn decode_session_header(bytes: &[u8]) -> Result<SessionStates, WireError> {
    let header = SessionHeader::read_from_prefix(bytes).ok_or(WireError::Truncated {
        needed: SESSION_HEADER_SIZE,
        got: bytes.len(),
    })?;
    Ok(SessionStates {
        transmission_state: header.transmission_state,
        session_number: header.session_number.get(),
        sequence_number: header.sequence_number.get(),
    })
}

/// Lift the next complete frame off the front of `src`.
///
/// Returns `Ok(None)` while `src` holds less than the declared frame; the
/// buffer is left untouched so the caller can read more and retry. On success
/// exactly the declared frame length is consumed.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>, WireError> {
    let transport = match TransportHeader::read_from_prefix(&src[..]) {
        Some(t) => t,
        None => return Ok(None),
    };

    let total = transport.frame_length.get() as usize;
    if total < FRAME_HEADER_SIZE {
        return Err(WireError::FrameTooShort(total));
    }
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let states = decode_session_header(&src[TRANSPORT_HEADER_SIZE..FRAME_HEADER_SIZE])?;
    let mut frame = src.split_to(total);
    frame.advance(FRAME_HEADER_SIZE);

    Ok(Some(Frame {
        states,
        payload: frame.freeze(),
    }))
}

/// Append one frame carrying `payload` to `dst`. Reserved header fields are zeroed.
pub fn encode_frame(
    states: &SessionStates,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    let total = (FRAME_HEADER_SIZE + payload.len()) as u16;
    dst.reserve(total as usize);
    dst.put_u16_le(total);
    dst.put_slice(SessionHeader::new(states).as_bytes());
    dst.put_slice(payload);
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
///
/// All of them mean the stream can no longer be framed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("session header truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("declared frame length {0} is shorter than the {} byte headers", FRAME_HEADER_SIZE)]
    FrameTooShort(usize),

    #[error("payload length {0} exceeds maximum {}", MAX_PAYLOAD)]
    PayloadTooLarge(usize),
}

// ── Tests ────────────────────────────────────────────────────────────────────
