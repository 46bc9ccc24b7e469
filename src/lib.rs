//! Per-key RGB backlight core for keyboards driven by a pair of ISSI IS31FL3733
//! LED matrix controllers.
//!
//! The crate is layered bottom-up:
//!
//! * [`Is31fl3733`]: register/paging driver for a single chip, owning its [`LedBuffer`]
//! * [`color::Is31fl3733Rgb`]: interleaved RGB channels and HSV fills on top of one chip
//! * [`matrix::DualMatrix`]: the upper/lower chip pair addressed by key matrix coordinates
//! * [`sector::SectorControl`]: zones with enable masks and persisted colours
//! * [`animation::Animator`]: frame loop taking over the LEDs while it runs
//! * [`receiver::Receiver`], [`protocol`] and [`console`]: the serial control channel
//! * [`backlight::Backlight`]: the application state tying everything together
//!
//! Datasheet: <https://www.lumissil.com/assets/pdf/core/IS31FL3733_DS.pdf>

#![cfg_attr(not(test), no_std)]

pub mod animation;
pub mod backlight;
pub mod buffer;
pub mod color;
mod configuration;
pub mod console;
pub mod interface;
pub mod led_map;
pub mod matrix;
pub mod protocol;
pub mod receiver;
mod register;
pub mod sector;
pub mod store;

#[cfg(not(feature = "defmt"))]
mod log {
    pub use log::{debug, info, warn};
}

#[cfg(feature = "defmt")]
mod log {
    pub use defmt::{debug, info, warn};
}

use bitflags::bitflags;

pub use buffer::{LedBuffer, Mask, CS, ENABLE_SIZE, PWM_SIZE, SW};
pub use configuration::ConfigBuilder;
use interface::RegisterAccess;
use register::{BitFlags, Register};

/// Error enum for the backlight driver
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<IE> {
    /// An interface related error has occured
    Interface(IE),

    /// Driving the SDB line failed
    HardwareEnable,

    /// A chip pair needs exactly one sync master
    SyncConflict,

    /// The requested operation is not available on this hardware
    Unsupported,
}

/// Global current control value used by the 91TKL board.
pub const DEFAULT_GCC: u8 = 128;

/// Global current control value required for open/short detection.
pub const GCC_OPEN_SHORT_DETECT: u8 = 0x01;

pub trait ToRegisterValue<T> {
    fn register_value(&self) -> T;
}

/// Connection of one of the ADDR1/ADDR2 strap pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrPin {
    Gnd,
    Scl,
    Sda,
    Vcc,
}

impl ToRegisterValue<u8> for AddrPin {
    fn register_value(&self) -> u8 {
        match self {
            AddrPin::Gnd => 0,
            AddrPin::Scl => 1,
            AddrPin::Sda => 2,
            AddrPin::Vcc => 3,
        }
    }
}

/// 7bit i2c address of a chip with the given strap pins.
///
/// The datasheet lists 8bit addresses (`0xA0 | ADDR2 << 3 | ADDR1 << 1`), this is the
/// same address without the R/W bit.
pub fn i2c_address(addr2: AddrPin, addr1: AddrPin) -> u8 {
    (0xA0 | addr2.register_value() << 3 | addr1.register_value() << 1) >> 1
}

/// Clock synchronisation role of a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncMode {
    Master,
    Slave,
}

impl ToRegisterValue<u8> for SyncMode {
    fn register_value(&self) -> u8 {
        match self {
            SyncMode::Master => BitFlags::CR_SYNC_MASTER,
            SyncMode::Slave => BitFlags::CR_SYNC_SLAVE,
        }
    }
}

/// SWy pull-up resistor selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullUpResistor {
    #[default]
    None,
    R0_5k,
    R1k,
    R2k,
    R4k,
    R8k,
    R16k,
    R32k,
}

impl ToRegisterValue<u8> for PullUpResistor {
    fn register_value(&self) -> u8 {
        match self {
            PullUpResistor::None => 0,
            PullUpResistor::R0_5k => 1,
            PullUpResistor::R1k => 2,
            PullUpResistor::R2k => 3,
            PullUpResistor::R4k => 4,
            PullUpResistor::R8k => 5,
            PullUpResistor::R16k => 6,
            PullUpResistor::R32k => 7,
        }
    }
}

/// CSx pull-down resistor selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullDownResistor {
    #[default]
    None,
    R0_5k,
    R1k,
    R2k,
    R4k,
    R8k,
    R16k,
    R32k,
}

impl ToRegisterValue<u8> for PullDownResistor {
    fn register_value(&self) -> u8 {
        match self {
            PullDownResistor::None => 0,
            PullDownResistor::R0_5k => 1,
            PullDownResistor::R1k => 2,
            PullDownResistor::R2k => 3,
            PullDownResistor::R4k => 4,
            PullDownResistor::R8k => 5,
            PullDownResistor::R16k => 6,
            PullDownResistor::R32k => 7,
        }
    }
}

/// Operating mode of a single LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    /// Brightness follows the PWM register
    Pwm,
    Abm1,
    Abm2,
    Abm3,
}

impl ToRegisterValue<u8> for LedMode {
    fn register_value(&self) -> u8 {
        match self {
            LedMode::Pwm => 0,
            LedMode::Abm1 => 1,
            LedMode::Abm2 => 2,
            LedMode::Abm3 => 3,
        }
    }
}

/// One of the three auto breath mode generators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abm {
    Abm1,
    Abm2,
    Abm3,
}

impl Abm {
    pub fn base_register(&self) -> u16 {
        match self {
            Abm::Abm1 => Register::ABM1,
            Abm::Abm2 => Register::ABM2,
            Abm::Abm3 => Register::ABM3,
        }
    }
}

/// Phase the breathing loop begins at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopBegin {
    #[default]
    T1,
    T2,
    T3,
    T4,
}

impl ToRegisterValue<u8> for LoopBegin {
    fn register_value(&self) -> u8 {
        match self {
            LoopBegin::T1 => 0,
            LoopBegin::T2 => 1,
            LoopBegin::T3 => 2,
            LoopBegin::T4 => 3,
        }
    }
}

/// Phase the breathing loop ends at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopEnd {
    /// Stop at the end of T3 (LED off)
    #[default]
    Off,
    /// Stop at the end of T1 (LED on)
    On,
}

impl ToRegisterValue<u8> for LoopEnd {
    fn register_value(&self) -> u8 {
        match self {
            LoopEnd::Off => 0,
            LoopEnd::On => 1,
        }
    }
}

/// Timing of one auto breath mode generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbmConfig {
    /// Rise time, 3 bits
    pub t1: u8,
    /// Hold time, 4 bits
    pub t2: u8,
    /// Fall time, 3 bits
    pub t3: u8,
    /// Off time, 4 bits
    pub t4: u8,
    pub loop_begin: LoopBegin,
    pub loop_end: LoopEnd,
    /// Number of loops, 10 bits. 0 loops forever.
    pub loops: u16,
}

impl AbmConfig {
    fn register_values(&self) -> [u8; 4] {
        [
            (self.t1 & 0b111) << BitFlags::ABM_CR1_T1_SHIFT
                | (self.t2 & 0b1111) << BitFlags::ABM_CR1_T2_SHIFT,
            (self.t3 & 0b111) << BitFlags::ABM_CR2_T3_SHIFT
                | (self.t4 & 0b1111) << BitFlags::ABM_CR2_T4_SHIFT,
            self.loop_end.register_value() << BitFlags::ABM_CR3_LE_SHIFT
                | self.loop_begin.register_value() << BitFlags::ABM_CR3_LB_SHIFT
                | ((self.loops >> 8) as u8 & BitFlags::ABM_CR3_LTA_MASK),
            self.loops as u8,
        ]
    }
}

bitflags! {
    /// Interrupt mask register (IMR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptMask: u8 {
        /// Auto clear interrupt
        const AUTO_CLEAR = 1 << 3;
        /// Auto breath interrupt
        const AUTO_BREATH = 1 << 2;
        /// Dot short interrupt
        const SHORT = 1 << 1;
        /// Dot open interrupt
        const OPEN = 1 << 0;
    }
}

bitflags! {
    /// Interrupt status register (ISR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptStatus: u8 {
        const ABM3_FINISHED = 1 << 4;
        const ABM2_FINISHED = 1 << 3;
        const ABM1_FINISHED = 1 << 2;
        const SHORT = 1 << 1;
        const OPEN = 1 << 0;
    }
}

/// Result of an open or short scan, one bit per LED in enable buffer layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedStates(pub Mask);

impl LedStates {
    pub fn is_set(&self, cs: u8, sw: u8) -> bool {
        let offset = buffer::led_offset(cs, sw);
        self.0
            .get(offset / 8)
            .is_some_and(|byte| byte & (1 << (offset % 8)) != 0)
    }

    /// Number of LEDs flagged in this scan.
    pub fn count(&self) -> u32 {
        self.0.iter().map(|byte| byte.count_ones()).sum()
    }
}

/// Driver for a single IS31FL3733.
pub struct Is31fl3733<I> {
    interface: I,
    buffer: LedBuffer,
    /// Cached configuration register, never read back from the chip.
    cr: u8,
    gcc: u8,
    sync_mode: SyncMode,
    swpur: PullUpResistor,
    cspdr: PullDownResistor,
}

impl<IE, I2C, SDB> Is31fl3733<interface::I2cInterface<I2C, SDB>>
where
    I2C: embedded_hal::i2c::I2c<Error = IE>,
    SDB: embedded_hal::digital::OutputPin,
{
    /// Create a driver talking to the address selected by the configured strap pins.
    pub fn new_with_i2c(config: &ConfigBuilder, i2c: I2C, sdb: SDB) -> Self {
        Self::new(
            config,
            interface::I2cInterface::new(i2c, config.address(), sdb),
        )
    }

    /// Destroys the driver and releases the owned `I2c`-interface and SDB pin.
    pub fn release(self) -> (I2C, SDB) {
        self.interface.release()
    }
}

impl<I> Is31fl3733<I> {
    /// Create a new driver instance. No bus traffic happens until [`Is31fl3733::init`].
    pub fn new(config: &ConfigBuilder, interface: I) -> Self {
        Is31fl3733 {
            interface,
            buffer: LedBuffer::new(),
            cr: 0,
            gcc: config.configuration.gcc,
            sync_mode: config.configuration.sync_mode,
            swpur: config.configuration.swpur,
            cspdr: config.configuration.cspdr,
        }
    }

    pub fn buffer(&self) -> &LedBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut LedBuffer {
        &mut self.buffer
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    pub fn is_master(&self) -> bool {
        self.sync_mode == SyncMode::Master
    }

    pub fn gcc(&self) -> u8 {
        self.gcc
    }

    /// Cached value of the configuration register.
    pub fn config_register(&self) -> u8 {
        self.cr
    }
}

impl<I, IE> Is31fl3733<I>
where
    I: RegisterAccess<Error = Error<IE>>,
{
    /// Unlocks the page select register and selects `page`.
    pub fn select_page(&mut self, page: u8) -> Result<(), Error<IE>> {
        self.write_common_register(Register::PSWL, BitFlags::PSWL_ENABLE)?;
        self.write_common_register(Register::PSR, page)
    }

    pub fn write_common_register(&mut self, register: u8, value: u8) -> Result<(), Error<IE>> {
        self.interface.write_register(register, value)
    }

    pub fn read_common_register(&mut self, register: u8) -> Result<u8, Error<IE>> {
        self.interface.read_register(register)
    }

    /// Selects the page of `register` and writes `value` to it.
    pub fn write_paged_register(&mut self, register: u16, value: u8) -> Result<(), Error<IE>> {
        self.select_page(Register::page(register))?;
        self.interface
            .write_register(Register::address(register), value)
    }

    /// Clears all buffers and brings the chip out of shutdown with the configured
    /// sync role, global current and resistors.
    pub fn init(&mut self) -> Result<(), Error<IE>> {
        self.buffer.clear();

        self.cr = BitFlags::CR_SSD | self.sync_mode.register_value();

        self.software_shutdown(true)?;
        self.hardware_shutdown(false)?;

        // clear software shutdown, then set the sync role
        self.write_paged_register(Register::CR, BitFlags::CR_SSD)?;
        self.write_paged_register(Register::CR, self.cr)?;
        self.write_paged_register(Register::GCC, self.gcc)?;
        self.update_resistors()?;

        self.software_shutdown(false)
    }

    /// Puts the chip into (`true`) or out of (`false`) software shutdown.
    pub fn software_shutdown(&mut self, enable: bool) -> Result<(), Error<IE>> {
        if enable {
            self.cr &= !BitFlags::CR_SSD;
        } else {
            self.cr |= BitFlags::CR_SSD;
        }

        self.write_paged_register(Register::CR, self.cr)
    }

    /// Pulls the SDB line low (`true`) or releases the chip (`false`).
    pub fn hardware_shutdown(&mut self, enable: bool) -> Result<(), Error<IE>> {
        self.interface.set_hardware_enable(!enable)
    }

    pub fn set_auto_breath_mode(&mut self, enable: bool) -> Result<(), Error<IE>> {
        if enable {
            self.cr |= BitFlags::CR_BEN;
        } else {
            self.cr &= !BitFlags::CR_BEN;
        }

        self.write_paged_register(Register::CR, self.cr)
    }

    /// Sets and writes the global current control value.
    pub fn set_global_current(&mut self, gcc: u8) -> Result<(), Error<IE>> {
        self.gcc = gcc;
        self.update_global_current()
    }

    /// Writes the cached global current control value.
    pub fn update_global_current(&mut self) -> Result<(), Error<IE>> {
        self.write_paged_register(Register::GCC, self.gcc)
    }

    /// Sets and writes the SWy pull-up and CSx pull-down resistors.
    pub fn set_resistors(
        &mut self,
        swpur: PullUpResistor,
        cspdr: PullDownResistor,
    ) -> Result<(), Error<IE>> {
        self.swpur = swpur;
        self.cspdr = cspdr;
        self.update_resistors()
    }

    fn update_resistors(&mut self) -> Result<(), Error<IE>> {
        self.write_paged_register(Register::SWPUR, self.swpur.register_value())?;
        self.write_paged_register(Register::CSPDR, self.cspdr.register_value())
    }

    pub fn set_interrupt_mask(&mut self, mask: InterruptMask) -> Result<(), Error<IE>> {
        self.write_common_register(Register::IMR, mask.bits())
    }

    /// Reads the interrupt status register. Reading clears it on the chip.
    pub fn interrupt_status(&mut self) -> Result<InterruptStatus, Error<IE>> {
        let isr = self.read_common_register(Register::ISR)?;
        Ok(InterruptStatus::from_bits_truncate(isr))
    }

    /// Writes the timing of `abm` and latches it with the time update register.
    pub fn configure_abm(&mut self, abm: Abm, config: &AbmConfig) -> Result<(), Error<IE>> {
        let base = abm.base_register();

        for (register, value) in (base..).zip(config.register_values()) {
            self.write_paged_register(register, value)?;
        }

        self.write_paged_register(Register::TUR, 0x00)
    }

    /// Selects PWM or one of the auto breath generators for a single LED.
    pub fn set_led_mode(&mut self, cs: u8, sw: u8, mode: LedMode) -> Result<(), Error<IE>> {
        let offset = buffer::led_offset(cs, sw) as u16;
        self.write_paged_register(Register::LEDABM + offset, mode.register_value())
    }

    /// Starts an open/short scan. Overwrites the enable and PWM buffers and leaves the
    /// chip at calibration current; results can be read after two scan cycles (3.3ms).
    pub fn detect_open_short(&mut self) -> Result<(), Error<IE>> {
        self.write_paged_register(Register::GCC, GCC_OPEN_SHORT_DETECT)?;

        self.buffer.enable_all();
        self.buffer.fill(0x01);
        self.update()?;

        // detection is latched by a 0 -> 1 transition of OSD
        self.write_paged_register(Register::CR, self.cr & !BitFlags::CR_OSD)?;
        self.write_paged_register(Register::CR, self.cr | BitFlags::CR_OSD)
    }

    fn read_led_states(&mut self, register: u16) -> Result<LedStates, Error<IE>> {
        let mut states = [0u8; ENABLE_SIZE];

        self.select_page(Register::page(register))?;
        for (offset, chunk) in (0u8..)
            .step_by(ENABLE_SIZE / 2)
            .zip(states.chunks_mut(ENABLE_SIZE / 2))
        {
            self.interface
                .read_registers(Register::address(register) + offset, chunk)?;
        }

        Ok(LedStates(states))
    }

    pub fn read_open_states(&mut self) -> Result<LedStates, Error<IE>> {
        self.read_led_states(Register::LEDOPEN)
    }

    pub fn read_short_states(&mut self) -> Result<LedStates, Error<IE>> {
        self.read_led_states(Register::LEDSHORT)
    }

    /// Pushes the enable buffer in two halves.
    pub fn update_enable(&mut self) -> Result<(), Error<IE>> {
        self.select_page(Register::page(Register::LEDONOFF))?;

        for (offset, chunk) in (0u8..)
            .step_by(ENABLE_SIZE / 2)
            .zip(self.buffer.led_buffer().chunks(ENABLE_SIZE / 2))
        {
            self.interface
                .write_registers(Register::address(Register::LEDONOFF) + offset, chunk)?;
        }

        Ok(())
    }

    /// Pushes the PWM buffer, one transfer per switch line.
    pub fn update_pwm(&mut self) -> Result<(), Error<IE>> {
        self.select_page(Register::page(Register::LEDPWM))?;

        for (offset, chunk) in (0u8..)
            .step_by(CS)
            .zip(self.buffer.pwm_buffer().chunks(CS))
        {
            self.interface
                .write_registers(Register::address(Register::LEDPWM) + offset, chunk)?;
        }

        Ok(())
    }

    pub fn update(&mut self) -> Result<(), Error<IE>> {
        self.update_enable()?;
        self.update_pwm()
    }
}

#[cfg(test)]
impl Is31fl3733<interface::mock::MockInterface> {
    /// Destroys the drivers and returns the owned [`interface::mock::MockInterface`].
    pub fn release(self) -> interface::mock::MockInterface {
        self.interface
    }
}
