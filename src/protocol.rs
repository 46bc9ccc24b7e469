//! Binary frames of the serial control channel.
//!
//! ```text
//! [START][LEN][CMD][payload...][CRC8][STOP]
//! ```
//!
//! `LEN` counts `CMD` and the payload, so a frame is `LEN + 4` bytes long. The CRC covers
//! everything from `START` up to the last payload byte.

use arrayvec::ArrayVec;
use crc::{Algorithm, Crc};

use crate::{led_map::Device, CS, SW};

pub const START: u8 = 0x02;
pub const STOP: u8 = 0x03;
pub const USER_START: u8 = b'!';
pub const USER_STOP: u8 = b'\n';

/// Capacity of the receive buffer.
pub const MAX_MSG_LENGTH: usize = 32;

pub const CMD_SET_PWM_MODE: u8 = 0x51;
pub const CMD_SET_PWM_ROW: u8 = 0x52;
pub const CMD_UPDATE_PWM: u8 = 0x53;
pub const CMD_SAVE_PWM: u8 = 0x54;
pub const CMD_GET_PWM_MODE: u8 = 0x55;
pub const CMD_GET_PWM_ROW: u8 = 0x56;

/// CRC-8 with polynomial 0x07 seeded with 0x2D.
pub const CRC_8_ANORAK: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x07,
    init: 0x2d,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xa2,
    residue: 0x00,
};

pub const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_ANORAK);

pub fn crc8(bytes: &[u8]) -> u8 {
    CRC.checksum(bytes)
}

/// Reasons for dropping a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// The frame does not fit the receive buffer
    Overflow,
    /// Something other than `STOP` followed the checksum
    MissingStop,
    /// `LEN` does not match the frame or the command
    Length,
    /// Checksum mismatch
    Crc,
    UnknownCommand(u8),
    /// A field is out of range
    InvalidArgument,
}

/// Checks length and checksum of `frame`, which runs from `START` through the CRC byte.
pub fn check_frame(frame: &[u8]) -> Result<(), FrameError> {
    let [START, len, .., crc] = frame else {
        return Err(FrameError::Length);
    };

    if *len as usize + 3 != frame.len() {
        return Err(FrameError::Length);
    }

    if crc8(&frame[..frame.len() - 1]) != *crc {
        return Err(FrameError::Crc);
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Select the PWM source, `0` for sectors
    SetPwmMode { map: u8 },
    /// Write one SW line of a chip's PWM buffer. Nothing is pushed.
    SetPwmRow {
        device: Device,
        row: u8,
        pwm: [u8; CS],
    },
    /// Push the PWM buffer of a chip
    UpdatePwm { device: Device },
    /// Persist both PWM buffers as the custom map
    SavePwm,
    GetPwmMode,
    GetPwmRow { device: Device, row: u8 },
}

impl Command {
    /// Decodes a frame accepted by [`check_frame`].
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let [_, len, command, body @ ..] = frame else {
            return Err(FrameError::Length);
        };
        let (len, command) = (*len, *command);
        let Some((_crc, payload)) = body.split_last() else {
            return Err(FrameError::Length);
        };
        if len as usize != payload.len() + 1 {
            return Err(FrameError::Length);
        }

        let expect_len = |expected: u8| {
            if len == expected {
                Ok(())
            } else {
                Err(FrameError::Length)
            }
        };
        let check_row = |row: u8| {
            if (row as usize) < SW {
                Ok(row)
            } else {
                Err(FrameError::InvalidArgument)
            }
        };

        match command {
            CMD_SET_PWM_MODE => {
                expect_len(2)?;
                Ok(Command::SetPwmMode { map: payload[0] })
            }
            CMD_SET_PWM_ROW => {
                expect_len(CS as u8 + 3)?;
                let mut pwm = [0; CS];
                pwm.copy_from_slice(&payload[2..]);
                Ok(Command::SetPwmRow {
                    device: Device::from_wire(payload[0]),
                    row: check_row(payload[1])?,
                    pwm,
                })
            }
            CMD_UPDATE_PWM => {
                expect_len(2)?;
                Ok(Command::UpdatePwm {
                    device: Device::from_wire(payload[0]),
                })
            }
            CMD_SAVE_PWM => {
                expect_len(1)?;
                Ok(Command::SavePwm)
            }
            CMD_GET_PWM_MODE => {
                expect_len(1)?;
                Ok(Command::GetPwmMode)
            }
            CMD_GET_PWM_ROW => {
                expect_len(3)?;
                Ok(Command::GetPwmRow {
                    device: Device::from_wire(payload[0]),
                    row: check_row(payload[1])?,
                })
            }
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

pub type FrameBuffer = ArrayVec<u8, MAX_MSG_LENGTH>;

/// Builds a complete frame around `payload`.
pub fn encode_frame(command: u8, payload: &[u8]) -> Result<FrameBuffer, FrameError> {
    if payload.len() + 5 > MAX_MSG_LENGTH {
        return Err(FrameError::Overflow);
    }

    let mut frame = FrameBuffer::new();
    frame.push(START);
    frame.push(payload.len() as u8 + 1);
    frame.push(command);
    frame
        .try_extend_from_slice(payload)
        .map_err(|_| FrameError::Overflow)?;
    frame.push(crc8(&frame));
    frame.push(STOP);

    Ok(frame)
}

/// Replies sent for the `GET_*` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    PwmMode { map: u8 },
    PwmRow {
        device: Device,
        row: u8,
        pwm: [u8; CS],
    },
}

impl Response {
    pub fn encode(&self) -> Result<FrameBuffer, FrameError> {
        match self {
            Response::PwmMode { map } => encode_frame(CMD_GET_PWM_MODE, &[*map]),
            Response::PwmRow { device, row, pwm } => {
                let mut payload = ArrayVec::<u8, { CS + 2 }>::new();
                payload.push(device.to_wire());
                payload.push(*row);
                payload
                    .try_extend_from_slice(pwm)
                    .map_err(|_| FrameError::Overflow)?;
                encode_frame(CMD_GET_PWM_ROW, &payload)
            }
        }
    }
}
