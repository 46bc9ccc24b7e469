//! Application state of the backlight: chips, sectors, animations, persistence and
//! the serial control channel.

use arrayvec::ArrayVec;
use embedded_io::{Write, WriteFmtError};
use embedded_storage::Storage;
use heapless::spsc::Consumer;

use crate::{
    animation::{Animator, Instant, LoadError},
    interface::RegisterAccess,
    led_map::Device,
    log::{debug, info, warn},
    matrix::DualMatrix,
    protocol::{Command, FrameError, Response, MAX_MSG_LENGTH},
    receiver::{Received, Receiver},
    sector::SectorControl,
    store::BacklightStore,
    Error, CS,
};

/// Failure of a serial command.
#[derive(Debug)]
pub enum CommandError<IE, SE> {
    /// Missing, malformed or out of range arguments
    Arguments,
    Device(Error<IE>),
    Storage(SE),
    Frame(FrameError),
    /// Writing the reply failed
    Output,
}

impl<IE, SE> From<Error<IE>> for CommandError<IE, SE> {
    fn from(e: Error<IE>) -> Self {
        CommandError::Device(e)
    }
}

impl<IE, SE> From<FrameError> for CommandError<IE, SE> {
    fn from(e: FrameError) -> Self {
        CommandError::Frame(e)
    }
}

impl<IE, SE, E> From<WriteFmtError<E>> for CommandError<IE, SE> {
    fn from(_: WriteFmtError<E>) -> Self {
        CommandError::Output
    }
}

pub struct Backlight<I, S> {
    pub(crate) matrix: DualMatrix<I>,
    pub(crate) sectors: SectorControl,
    pub(crate) animator: Animator,
    pub(crate) store: BacklightStore<S>,
    receiver: Receiver,
    pub(crate) now: Instant,
}

impl<I, S> Backlight<I, S> {
    pub fn new(matrix: DualMatrix<I>, store: BacklightStore<S>) -> Self {
        Backlight {
            matrix,
            sectors: SectorControl::new(),
            animator: Animator::new(),
            store,
            receiver: Receiver::new(),
            now: Instant::from_ticks(0),
        }
    }

    pub fn matrix(&self) -> &DualMatrix<I> {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut DualMatrix<I> {
        &mut self.matrix
    }

    pub fn sectors(&self) -> &SectorControl {
        &self.sectors
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn store_mut(&mut self) -> &mut BacklightStore<S> {
        &mut self.store
    }

    pub fn release(self) -> (DualMatrix<I>, BacklightStore<S>) {
        (self.matrix, self.store)
    }
}

impl<I, IE, S> Backlight<I, S>
where
    I: RegisterAccess<Error = Error<IE>>,
    S: Storage,
{
    /// Initializes both chips and shows the persisted sectors or custom PWM map.
    /// Unreadable persisted state falls back to defaults.
    pub fn init(&mut self) -> Result<(), Error<IE>> {
        self.matrix.init()?;

        if self.sectors.load_state(&mut self.store).is_err() {
            warn!("backlight: sector state unreadable, using defaults");
        }

        self.show_sectors();
        self.matrix.update()?;

        match self.animator.load_state(&mut self.matrix, &mut self.store) {
            Ok(_) => {}
            Err(LoadError::Device(e)) => return Err(e),
            Err(LoadError::Storage(_)) => warn!("backlight: animation state unreadable"),
        }

        info!("backlight: ready");
        Ok(())
    }

    /// Fills the buffers from the sectors or the selected custom PWM map. Buffer only.
    pub(crate) fn show_sectors(&mut self) {
        let map = self.sectors.custom_map();
        if self
            .sectors
            .set_custom_map(map, &mut self.matrix, &mut self.store)
            .is_err()
        {
            warn!("backlight: custom map {} unreadable", map);
            self.sectors.apply_all(&mut self.matrix);
        }
    }

    /// Advances the running animation. Call this from the main loop.
    pub fn tick(&mut self, now: Instant) -> Result<bool, Error<IE>> {
        self.now = now;
        self.animator.tick(&mut self.matrix, now)
    }

    /// Key scan result for matrix `row`, bit `n` set for a pressed key in column `n`.
    pub fn typematrix_row(&mut self, row: u8, bits: u32) {
        self.animator.typematrix_row(row, bits);
    }

    /// Drains the receive queue filled by the serial interrupt. Returns the number of
    /// bytes processed.
    pub fn poll_serial<W: Write, const N: usize>(
        &mut self,
        rx: &mut Consumer<'_, u8, N>,
        tx: &mut W,
    ) -> usize {
        let mut count = 0;
        while let Some(byte) = rx.dequeue() {
            self.process_byte(byte, tx);
            count += 1;
        }

        count
    }

    /// Feeds one received byte and runs a completed command. Replies go to `tx`.
    pub fn process_byte<W: Write>(&mut self, byte: u8, tx: &mut W) {
        let line = match self.receiver.push(byte) {
            Ok(None) => return,
            Ok(Some(Received::Frame(frame))) => {
                let command = Command::parse(frame);
                match command.map_err(CommandError::from).and_then(|c| self.execute(c, tx)) {
                    Ok(()) => {}
                    Err(CommandError::Frame(e)) => warn!("serial: frame dropped: {:?}", e),
                    Err(CommandError::Output) => warn!("serial: reply not sent"),
                    Err(_) => warn!("serial: command failed"),
                }
                return;
            }
            Ok(Some(Received::Line(line))) => ArrayVec::<u8, MAX_MSG_LENGTH>::try_from(line),
            Err(e) => {
                warn!("serial: frame dropped: {:?}", e);
                return;
            }
        };

        match line {
            Ok(line) => {
                if self.run_console_line(&line, tx).is_err() {
                    warn!("serial: console reply not sent");
                }
            }
            Err(_) => warn!("serial: console line too long"),
        }
    }

    /// Runs a binary command.
    pub fn execute<W: Write>(
        &mut self,
        command: Command,
        tx: &mut W,
    ) -> Result<(), CommandError<IE, S::Error>> {
        debug!("serial: {:?}", command);

        match command {
            Command::SetPwmMode { map } => {
                info!("serial: custom map {}", map);
                self.sectors
                    .set_custom_map(map, &mut self.matrix, &mut self.store)
                    .map_err(CommandError::Storage)?;
                self.matrix.update()?;
            }
            Command::SetPwmRow { device, row, pwm } => {
                let buffer = self.matrix.device_mut(device).device_mut().buffer_mut();
                if !buffer.set_pwm_row(row, &pwm) {
                    return Err(CommandError::Arguments);
                }
            }
            Command::UpdatePwm { device } => {
                self.matrix.device_mut(device).device_mut().update_pwm()?;
            }
            Command::SavePwm => {
                self.sectors
                    .save_custom_pwm_map(&self.matrix, &mut self.store)
                    .map_err(CommandError::Storage)?;
            }
            Command::GetPwmMode => {
                let map = self.sectors.custom_map();
                Self::send(&Response::PwmMode { map }, tx)?;
            }
            Command::GetPwmRow { device, row } => {
                let buffer = self.matrix.device(device).device().buffer();
                let mut pwm = [0; CS];
                pwm.copy_from_slice(buffer.pwm_row(row).ok_or(CommandError::Arguments)?);
                Self::send(&Response::PwmRow { device, row, pwm }, tx)?;
            }
        }

        Ok(())
    }

    fn send<W: Write>(
        response: &Response,
        tx: &mut W,
    ) -> Result<(), CommandError<IE, S::Error>> {
        let frame = response.encode()?;
        tx.write_all(&frame).map_err(|_| CommandError::Output)
    }

    /// Pushes the PWM buffer of one chip.
    pub fn update_pwm(&mut self, device: Device) -> Result<(), Error<IE>> {
        self.matrix.device_mut(device).device_mut().update_pwm()
    }
}
