//! Session reassembly: turns a run of frames into complete session payloads.
//!
//! A session is an ordered run of frames sharing a session number, with
//! sequence numbers counting up from 0. The last frame carries transmission
//! state 1. Continuity is judged against the previous frame seen on the same
//! connection only; there is no reordering window.

use bytes::{Bytes, BytesMut};

use crate::wire::{Frame, SessionStates};

/// Outcome of the continuity check for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuity {
    /// The frame belongs to an unbroken run.
    pub continuous: bool,
    /// The frame opens a fresh reassembly buffer.
    pub new_sequence: bool,
    /// The frame is marked last-in-sequence.
    pub last: bool,
}

/// Previous-frame record for one ingestion connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub previous_session: u32,
    pub previous_sequence: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `states` against the previous frame, then record it.
    ///
    /// Rules apply in order:
    ///   1. sequence 0                                  → continuous, new sequence
    ///   2. same session, not last, sequence +1         → continuous
    ///   3. last, same session, sequence +1             → continuous
    ///   4. anything else                               → broken, new sequence
    ///
    /// Session number 0 counts as "same session" as any previous one.
    pub fn check(&mut self, states: &SessionStates) -> Continuity {
        let start_sequence = states.sequence_number == 0;
        let sequence_continuous =
            states.sequence_number == self.previous_sequence.wrapping_add(1);
        let last = states.is_last();
        let same_session =
            states.session_number == self.previous_session || states.session_number == 0;

        let (continuous, new_sequence) = if start_sequence {
            (true, true)
        } else if same_session && !last && sequence_continuous {
            (true, false)
        } else if last && same_session && sequence_continuous {
            (true, false)
        } else {
            (false, true)
        };

        self.previous_session = states.session_number;
        self.previous_sequence = states.sequence_number;

        Continuity {
            continuous,
            new_sequence,
            last,
        }
    }
}

/// Largest session payload held by default: 1 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Per-connection reassembly buffer plus its continuity state.
#[derive(Debug)]
pub struct Reassembler {
    state: SessionState,
    buffer: BytesMut,
    max_document_bytes: usize,
    /// The session in progress outgrew the limit; its frames are skipped
    /// until a new sequence or its last frame.
    overflowed: bool,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_DOCUMENT_BYTES)
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reassembler that gives up on sessions larger than `max_document_bytes`.
    pub fn with_limit(max_document_bytes: usize) -> Self {
        Self {
            state: SessionState::new(),
            buffer: BytesMut::new(),
            max_document_bytes,
            overflowed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes held for the session in progress.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }

    /// Feed one frame. Returns the complete session payload when `frame`
    /// closes an unbroken session.
    ///
    /// A frame that opens a sequence and is also marked last is a complete
    /// single-frame session. A frame that breaks continuity restarts the
    /// buffer with its own payload and never completes anything itself.
    /// A session that grows past the size limit is treated as broken.
    pub fn push(&mut self, frame: Frame) -> Option<Bytes> {
        let continuity = self.state.check(&frame.states);

        tracing::trace!(
            session = frame.states.session_number,
            sequence = frame.states.sequence_number,
            continuous = continuity.continuous,
            new_sequence = continuity.new_sequence,
            last = continuity.last,
            "session states"
        );

        if continuity.new_sequence {
            self.buffer.clear();
            self.overflowed = false;
            if !continuity.continuous {
                tracing::debug!(
                    session = frame.states.session_number,
                    sequence = frame.states.sequence_number,
                    "session continuity broken, partial data discarded"
                );
            }
        } else if self.overflowed {
            if continuity.last {
                self.overflowed = false;
            }
            return None;
        }

        if self.buffer.len() + frame.payload.len() > self.max_document_bytes {
            tracing::warn!(
                session = frame.states.session_number,
                sequence = frame.states.sequence_number,
                limit = self.max_document_bytes,
                "session exceeds maximum document size, discarded"
            );
            self.buffer.clear();
            self.overflowed = !continuity.last;
            return None;
        }
        self.buffer.extend_from_slice(&frame.payload);

        // Only continuous frames complete a session.
        if continuity.continuous && continuity.last {
            Some(self.buffer.split().freeze())
        } else {
            None
        }
    }
}
