//! Byte-wise receive state machine of the serial control channel.
//!
//! Binary frames start with [`START`](crate::protocol::START), console lines with `!`
//! and end with a newline. Anything else received while idle is dropped.

use crate::{
    log::{debug, warn},
    protocol::{self, FrameError, MAX_MSG_LENGTH, START, STOP, USER_START, USER_STOP},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecvState {
    Idle,
    FoundStart,
    FoundUserStart,
    RecvPayload,
    FindStop,
}

/// A complete message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received<'a> {
    /// A binary frame from `START` through the checksum, already validated
    Frame(&'a [u8]),
    /// A console line without the leading `!` and the newline
    Line(&'a [u8]),
}

pub struct Receiver {
    buffer: [u8; MAX_MSG_LENGTH],
    pos: usize,
    expected: usize,
    state: RecvState,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub const fn new() -> Self {
        Receiver {
            buffer: [0; MAX_MSG_LENGTH],
            pos: 0,
            expected: 0,
            state: RecvState::Idle,
        }
    }

    pub fn state(&self) -> RecvState {
        self.state
    }

    /// Drops whatever was received so far.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.expected = 0;
        self.state = RecvState::Idle;
    }

    /// Feeds one byte. Returns a message once it is complete, or the reason a frame
    /// was dropped; in both cases the receiver is idle again.
    pub fn push(&mut self, byte: u8) -> Result<Option<Received<'_>>, FrameError> {
        match self.state {
            RecvState::Idle => match byte {
                START => {
                    self.buffer[0] = byte;
                    self.pos = 1;
                    self.state = RecvState::FoundStart;
                }
                USER_START => {
                    self.pos = 0;
                    self.state = RecvState::FoundUserStart;
                }
                _ => {}
            },
            RecvState::FoundStart => {
                let expected = byte as usize + 4;
                if expected >= MAX_MSG_LENGTH {
                    warn!("recv: frame of {} bytes overflows buffer", expected);
                    self.reset();
                    return Err(FrameError::Overflow);
                }

                self.expected = expected;
                self.buffer[1] = byte;
                self.pos = 2;
                self.state = RecvState::RecvPayload;
            }
            RecvState::RecvPayload => {
                self.buffer[self.pos] = byte;
                self.pos += 1;
                // everything but STOP is in
                if self.pos == self.expected - 1 {
                    self.state = RecvState::FindStop;
                }
            }
            RecvState::FindStop => {
                let len = self.pos;
                self.reset();

                if byte != STOP {
                    warn!("recv: expected stop, got {:x}", byte);
                    return Err(FrameError::MissingStop);
                }

                let frame = &self.buffer[..len];
                if let Err(e) = protocol::check_frame(frame) {
                    warn!("recv: invalid frame");
                    return Err(e);
                }
                return Ok(Some(Received::Frame(frame)));
            }
            RecvState::FoundUserStart => {
                if byte == USER_STOP {
                    let len = self.pos;
                    self.reset();
                    debug!("recv: console line of {} bytes", len);
                    return Ok(Some(Received::Line(&self.buffer[..len])));
                }

                if self.pos + 1 >= MAX_MSG_LENGTH {
                    warn!("recv: console line overflows buffer");
                    self.reset();
                    return Err(FrameError::Overflow);
                }

                self.buffer[self.pos] = byte;
                self.pos += 1;
            }
        }

        Ok(None)
    }
}
